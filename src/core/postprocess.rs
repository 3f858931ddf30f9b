use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(here is|here's|here are|sure[,!]|certainly|below is)").unwrap()
});
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```[a-zA-Z0-9_-]*\s*$").unwrap());
static UNCLOSED_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^()]*\z").unwrap());

/// Why a generated artifact failed validation. A closed set so retry
/// logic keys on kind, never on display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingSection(String),
    Truncated,
    IncompleteConstruct,
}

impl ValidationIssue {
    /// Only truncation-class failures are worth one more model call; a
    /// missing section means the model ignored the template.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Truncated | Self::IncompleteConstruct)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSection(marker) => write!(f, "missing required section {:?}", marker),
            Self::Truncated => write!(f, "output looks truncated (ends mid-sentence)"),
            Self::IncompleteConstruct => write!(f, "output has an unclosed parenthesis group"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl Validation {
    pub fn retryable(&self) -> bool {
        !self.passed && self.issues.iter().all(ValidationIssue::retryable)
    }
}

/// Drop a single leading model preamble line ("Here is the spec...") and
/// markdown fence markers. Fence bodies are kept; only the markers go, so
/// an empty fence pair disappears entirely.
pub fn clean_llm_output(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();

    if let Some(first) = lines.first() {
        if PREAMBLE.is_match(first) {
            lines.remove(0);
        }
    }

    let kept: Vec<&str> = lines.into_iter().filter(|line| !FENCE.is_match(line)).collect();
    kept.join("\n").trim().to_string()
}

/// Drop every line mentioning one of the excluded terms, matched
/// case-insensitively at word boundaries. Whole-word on purpose: the
/// original substring filter dropped lines where a term hid inside an
/// unrelated word.
pub fn filter_excluded_terms(text: &str, terms: &[&str]) -> String {
    if terms.is_empty() {
        return text.to_string();
    }

    let pattern = format!(
        r"(?i)\b(?:{})\b",
        terms
            .iter()
            .map(|term| regex::escape(term))
            .collect::<Vec<_>>()
            .join("|")
    );
    // Term lists are fixed per prompt kind; a bad list is a programming error.
    let matcher = Regex::new(&pattern).expect("invalid exclusion term list");

    text.lines()
        .filter(|line| !matcher.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check that every required section marker is present, plus two generic
/// truncation heuristics. Never fails; the caller decides whether to
/// retry, patch, or just warn.
pub fn validate_sections(text: &str, required: &[&str], check_parens: bool) -> Validation {
    let mut issues = Vec::new();

    for marker in required {
        if !text.contains(marker) {
            issues.push(ValidationIssue::MissingSection((*marker).to_string()));
        }
    }

    if let Some(last) = text.trim_end().chars().last() {
        if matches!(last, '-' | ':' | ',') {
            issues.push(ValidationIssue::Truncated);
        }
    }

    if check_parens && UNCLOSED_PAREN.is_match(text.trim_end()) {
        issues.push(ValidationIssue::IncompleteConstruct);
    }

    Validation {
        passed: issues.is_empty(),
        issues,
    }
}
