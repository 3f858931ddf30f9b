use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One row extracted from the review table the model was asked to emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: String,
    pub category: String,
    pub file_name: String,
    pub line: u64,
    pub issue: String,
    pub fix: String,
}

// Rows must have exactly six cells, a known severity token, a file name
// with a recognized source extension, and an integer line. Everything
// else in the text is noise and gets skipped.
static ROW_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*\|\s*([^|\n]*?(?:CRITICAL|IMPORTANT|MINOR))\s*\|\s*([^|\n]+?)\s*\|\s*([^|\n]+?\.(?:cs|ts|tsx|js|jsx|sql|json|razor|cshtml|html|css|scss))\s*\|\s*(\d+)\s*\|\s*([^|\n]*?)\s*\|\s*([^|\n]*?)\s*\|\s*$",
    )
    .unwrap()
});

/// Best-effort extraction of issue rows from free-form LLM output. This is
/// not a markdown parser: it tolerates prose before, after, and between
/// rows, and silently drops anything that does not match the exact shape.
pub fn parse_review_table(text: &str) -> Vec<ReviewIssue> {
    let mut issues = Vec::new();

    for caps in ROW_PATTERN.captures_iter(text) {
        let line: u64 = match caps[4].parse() {
            Ok(value) => value,
            Err(_) => continue,
        };
        if line == 0 {
            continue;
        }

        issues.push(ReviewIssue {
            severity: caps[1].trim().to_string(),
            category: caps[2].trim().to_string(),
            file_name: caps[3].trim().to_string(),
            line,
            issue: caps[5].trim().to_string(),
            fix: caps[6].trim().to_string(),
        });
    }

    issues
}
