pub mod diff;
pub mod html;
pub mod postprocess;
pub mod prompt;
pub mod review_table;
pub mod threads;
pub mod work_item;

pub use diff::DiffBlock;
pub use work_item::WorkItemSummary;
