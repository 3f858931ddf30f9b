use crate::core::diff::DiffBlock;
use crate::core::threads::PendingComment;
use crate::core::work_item::WorkItemSummary;

/// The artifacts this tool knows how to ask a model for. A closed enum:
/// adding a kind means adding a match arm, not a string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Backend,
    FrontendReactTailwind,
    Completeness,
    CodeReview,
}

impl PromptKind {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Backend => {
                "You are a senior backend engineer. You write terse, implementation-ready \
                 backend specifications from product work items. Cover API endpoints, data \
                 model changes, validation and error cases. Never describe user interface \
                 concerns."
            }
            Self::FrontendReactTailwind => {
                "You are a senior frontend engineer working with React and Tailwind CSS. \
                 You write terse, implementation-ready frontend specifications from product \
                 work items. Cover components, state, user flows and edge cases. Never \
                 describe persistence or database concerns."
            }
            Self::Completeness => {
                "You are a requirements analyst. You judge whether a work item contains \
                 enough detail for a developer to implement it without follow-up questions, \
                 and you list exactly what is missing."
            }
            Self::CodeReview => {
                "You are a meticulous code reviewer. You receive numbered diff excerpts and \
                 respond with a single markdown table of concrete findings. You never invent \
                 line numbers that are not present in the excerpts."
            }
        }
    }

    /// Section markers the generated artifact must contain, verbatim.
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            Self::Backend => &["## Overview", "## API", "## Data Model", "## Acceptance Criteria"],
            Self::FrontendReactTailwind => {
                &["## Overview", "## Components", "## State", "## Acceptance Criteria"]
            }
            Self::Completeness => &["## Completeness Score", "## Missing Details", "## Questions"],
            Self::CodeReview => &[],
        }
    }

    /// Audience-inappropriate terms: lines mentioning these are dropped
    /// from the generated artifact.
    pub fn excluded_terms(&self) -> &'static [&'static str] {
        match self {
            Self::Backend => &["button", "screen", "layout", "css", "tailwind", "react", "ux"],
            Self::FrontendReactTailwind => &[
                "database",
                "sql",
                "migration",
                "schema",
                "stored procedure",
                "persistence",
            ],
            Self::Completeness | Self::CodeReview => &[],
        }
    }

    /// Only the completeness report gets the unclosed-parenthesis check;
    /// its template leans on parenthesized qualifiers.
    pub fn check_parens(&self) -> bool {
        matches!(self, Self::Completeness)
    }

    /// Marker whose absence gets patched with a stand-in instead of a retry.
    pub fn patchable_section(&self) -> Option<&'static str> {
        match self {
            Self::Backend | Self::FrontendReactTailwind => Some("## Acceptance Criteria"),
            _ => None,
        }
    }
}

const SPEC_TEMPLATE: &str = r#"Work item #{id}: {title}

Description:
{description}

Acceptance criteria:
{acceptance_criteria}
{parent_context}
Produce the specification now. Use exactly these section headings: {sections}.
Keep it under 400 lines. Do not add any introduction or closing remarks."#;

const COMPLETENESS_TEMPLATE: &str = r#"Work item #{id}: {title}

Description (structure preserved):
{description}

Acceptance criteria:
{acceptance_criteria}

Assess whether this item is implementable as written. Respond with exactly
these sections: ## Completeness Score (0-10 with a one-line reason),
## Missing Details (bullet list), ## Questions (numbered, for the author).
No introduction, no closing remarks."#;

const REVIEW_TEMPLATE: &str = r#"Review the following pull-request changes.
{work_item_context}
Changed files ("+N|" marks a changed line N, " N|" is unchanged context, "..." separates runs):

{diff_blocks}

Respond with ONLY a markdown table, one row per finding:
| Severity | Category | File | Line | Issue | Fix |
Severity must be one of: 🔴 CRITICAL, 🟡 IMPORTANT, 🟢 MINOR.
File must be the bare file name. Line must be a line number visible above.
If there are no findings, respond with the table header and no rows."#;

/// System and user prompt for a work-item-driven artifact (spec or
/// completeness report). Parent items, when present, are summarized as
/// extra context so the model sees the feature the task hangs off.
pub fn build_work_item_prompt(
    kind: PromptKind,
    item: &WorkItemSummary,
    parents: &[WorkItemSummary],
) -> (String, String) {
    let user = match kind {
        PromptKind::Completeness => COMPLETENESS_TEMPLATE
            .replace("{id}", &item.id.to_string())
            .replace("{title}", &item.title)
            .replace("{description}", or_placeholder(&item.description))
            .replace(
                "{acceptance_criteria}",
                or_placeholder(&item.acceptance_criteria),
            ),
        _ => SPEC_TEMPLATE
            .replace("{id}", &item.id.to_string())
            .replace("{title}", &item.title)
            .replace("{description}", or_placeholder(&item.description))
            .replace(
                "{acceptance_criteria}",
                or_placeholder(&item.acceptance_criteria),
            )
            .replace("{parent_context}", &parent_context(parents))
            .replace("{sections}", &kind.required_sections().join(", ")),
    };

    (kind.system_prompt().to_string(), user)
}

/// System and user prompt for a code review over rendered diff blocks.
pub fn build_review_prompt(
    blocks: &[DiffBlock],
    work_items: &[WorkItemSummary],
) -> (String, String) {
    let mut rendered = String::new();
    for block in blocks {
        if block.rendered_text.is_empty() {
            continue;
        }
        rendered.push_str(&format!("### {}\n{}\n\n", block.file_path, block.rendered_text));
    }

    let work_item_context = if work_items.is_empty() {
        String::new()
    } else {
        let mut context = String::from("\nLinked work items:\n");
        for item in work_items {
            context.push_str(&format!("- #{} {}\n", item.id, item.title));
        }
        context
    };

    let user = REVIEW_TEMPLATE
        .replace("{work_item_context}", &work_item_context)
        .replace("{diff_blocks}", rendered.trim_end());

    (PromptKind::CodeReview.system_prompt().to_string(), user)
}

/// Prompt handed straight to the user's coding assistant; no LLM call is
/// made for this one.
pub fn build_comment_fixes_prompt(pr_id: u64, comments: &[PendingComment]) -> String {
    let mut prompt = format!(
        "Address the following unresolved review comments on pull request !{}.\n\
         Make the smallest change that resolves each comment.\n\n",
        pr_id
    );

    for (index, comment) in comments.iter().enumerate() {
        let location = match (&comment.file, comment.line) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.clone(),
            _ => "general".to_string(),
        };
        prompt.push_str(&format!("{}. [{}] {}\n", index + 1, location, comment.comment));
    }

    prompt
}

fn parent_context(parents: &[WorkItemSummary]) -> String {
    if parents.is_empty() {
        return String::new();
    }
    let mut context = String::from("\nParent items for context:\n");
    for parent in parents {
        context.push_str(&format!("- #{} {}\n", parent.id, parent.title));
        if !parent.description.is_empty() {
            context.push_str(&format!("  {}\n", parent.description));
        }
    }
    context
}

fn or_placeholder(text: &str) -> &str {
    if text.is_empty() {
        "(none provided)"
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItemSummary {
        WorkItemSummary {
            id: 101,
            title: "Add order export".to_string(),
            description: "Export orders as CSV".to_string(),
            acceptance_criteria: "Given orders exist\nThen a file downloads".to_string(),
        }
    }

    #[test]
    fn backend_prompt_carries_fields_and_sections() {
        let (system, user) = build_work_item_prompt(PromptKind::Backend, &item(), &[]);
        assert!(system.contains("backend engineer"));
        assert!(user.contains("Work item #101: Add order export"));
        assert!(user.contains("Export orders as CSV"));
        assert!(user.contains("## Data Model"));
        assert!(!user.contains("{parent_context}"));
        assert!(!user.contains("{sections}"));
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let bare = WorkItemSummary {
            id: 5,
            ..WorkItemSummary::default()
        };
        let (_, user) = build_work_item_prompt(PromptKind::Backend, &bare, &[]);
        assert!(user.contains("(none provided)"));
    }

    #[test]
    fn parent_items_appear_as_context() {
        let parent = WorkItemSummary {
            id: 50,
            title: "Reporting epic".to_string(),
            ..WorkItemSummary::default()
        };
        let (_, user) = build_work_item_prompt(PromptKind::Backend, &item(), &[parent]);
        assert!(user.contains("Parent items for context:"));
        assert!(user.contains("#50 Reporting epic"));
    }

    #[test]
    fn review_prompt_skips_empty_blocks() {
        let blocks = vec![
            DiffBlock {
                file_path: "a.cs".to_string(),
                rendered_text: "+1|new".to_string(),
                added_line_count: 1,
            },
            DiffBlock {
                file_path: "empty.cs".to_string(),
                rendered_text: String::new(),
                added_line_count: 0,
            },
        ];
        let (_, user) = build_review_prompt(&blocks, &[]);
        assert!(user.contains("### a.cs"));
        assert!(!user.contains("empty.cs"));
        assert!(user.contains("🔴 CRITICAL"));
    }

    #[test]
    fn comment_fixes_prompt_renders_locations() {
        let comments = vec![
            PendingComment {
                file: Some("/src/File.cs".to_string()),
                line: Some(10),
                comment: "Please fix this".to_string(),
            },
            PendingComment {
                file: None,
                line: None,
                comment: "General note".to_string(),
            },
        ];
        let prompt = build_comment_fixes_prompt(77, &comments);
        assert!(prompt.contains("pull request !77"));
        assert!(prompt.contains("1. [/src/File.cs:10] Please fix this"));
        assert!(prompt.contains("2. [general] General note"));
    }
}
