pub mod azure;
pub mod llm;
pub mod openai;

pub use azure::AzureClient;
pub use openai::OpenAIAdapter;
