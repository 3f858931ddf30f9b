use serde::Deserialize;

/// A PR discussion thread as Azure DevOps returns it. Only the fields the
/// extractor needs are modeled; everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub is_deleted: bool,
    pub status: Option<ThreadStatus>,
    pub thread_context: Option<ThreadContext>,
    #[serde(default)]
    pub comments: Vec<ThreadComment>,
}

/// The API is inconsistent about thread status: newer responses carry a
/// string label, older ones a numeric code. Both must be accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThreadStatus {
    Code(i64),
    Label(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThreadContext {
    pub file_path: Option<String>,
    pub right_file_start: Option<FilePosition>,
    pub left_file_start: Option<FilePosition>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FilePosition {
    pub line: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThreadComment {
    pub content: Option<String>,
    pub comment_type: Option<String>,
}

/// An unresolved, human-authored review comment with enough context to put
/// in front of a coding assistant.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingComment {
    pub file: Option<String>,
    pub line: Option<u64>,
    pub comment: String,
}

/// Reduce raw discussion threads to actionable comments.
///
/// Resolution policy: a thread is pending only when its status is a
/// recognized active marker (`"active"` in any case, or code 1) or absent,
/// since the API omits status entirely on plain discussion threads. Every
/// other status, including ones we have never seen, counts as resolved.
pub fn extract_pending_comments(threads: &[Thread]) -> Vec<PendingComment> {
    let mut pending = Vec::new();

    for thread in threads {
        if thread.is_deleted || !is_active(thread.status.as_ref()) {
            continue;
        }

        let file = thread
            .thread_context
            .as_ref()
            .and_then(|ctx| ctx.file_path.clone());
        let line = thread.thread_context.as_ref().and_then(line_number);

        for comment in &thread.comments {
            if comment.comment_type.as_deref() == Some("system") {
                continue;
            }
            let Some(content) = comment.content.as_deref() else {
                continue;
            };
            let text = collapse_newlines(content);
            if text.is_empty() {
                continue;
            }

            pending.push(PendingComment {
                file: file.clone(),
                line,
                comment: text,
            });
        }
    }

    pending
}

fn is_active(status: Option<&ThreadStatus>) -> bool {
    match status {
        None => true,
        Some(ThreadStatus::Code(code)) => *code == 1,
        Some(ThreadStatus::Label(label)) => label.eq_ignore_ascii_case("active"),
    }
}

/// Right-side position wins when both sides carry one; comments usually
/// anchor to the new revision of the file.
fn line_number(context: &ThreadContext) -> Option<u64> {
    context
        .right_file_start
        .as_ref()
        .and_then(|pos| pos.line)
        .or_else(|| context.left_file_start.as_ref().and_then(|pos| pos.line))
}

fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_from_json(json: &str) -> Thread {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn active_thread_with_file_context_is_extracted() {
        let thread = thread_from_json(
            r#"{
                "status": "active",
                "threadContext": {
                    "filePath": "/src/File.cs",
                    "rightFileStart": {"line": 10}
                },
                "comments": [{"content": "Please fix this", "commentType": "text"}]
            }"#,
        );

        let pending = extract_pending_comments(&[thread]);
        assert_eq!(
            pending,
            vec![PendingComment {
                file: Some("/src/File.cs".to_string()),
                line: Some(10),
                comment: "Please fix this".to_string(),
            }]
        );
    }

    #[test]
    fn deleted_threads_never_contribute() {
        let thread = thread_from_json(
            r#"{"isDeleted": true, "status": "active",
                "comments": [{"content": "gone", "commentType": "text"}]}"#,
        );
        assert!(extract_pending_comments(&[thread]).is_empty());
    }

    #[test]
    fn resolved_and_unknown_statuses_are_skipped() {
        for status in ["\"fixed\"", "\"closed\"", "\"wontFix\"", "\"pending\"", "2", "4"] {
            let json = format!(
                r#"{{"status": {}, "comments": [{{"content": "hi", "commentType": "text"}}]}}"#,
                status
            );
            let thread = thread_from_json(&json);
            assert!(
                extract_pending_comments(&[thread]).is_empty(),
                "status {} should be resolved",
                status
            );
        }
    }

    #[test]
    fn numeric_one_and_absent_status_are_active() {
        let numeric = thread_from_json(
            r#"{"status": 1, "comments": [{"content": "a", "commentType": "text"}]}"#,
        );
        let absent =
            thread_from_json(r#"{"comments": [{"content": "b", "commentType": "text"}]}"#);
        let pending = extract_pending_comments(&[numeric, absent]);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].comment, "a");
        assert_eq!(pending[1].comment, "b");
    }

    #[test]
    fn system_comments_and_empty_content_are_skipped() {
        let thread = thread_from_json(
            r#"{
                "status": "active",
                "comments": [
                    {"content": "Policy updated", "commentType": "system"},
                    {"content": "   ", "commentType": "text"},
                    {"commentType": "text"},
                    {"content": "keep me", "commentType": "text"}
                ]
            }"#,
        );
        let pending = extract_pending_comments(&[thread]);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].comment, "keep me");
    }

    #[test]
    fn right_side_line_wins_over_left() {
        let thread = thread_from_json(
            r#"{
                "status": "active",
                "threadContext": {
                    "filePath": "/a.ts",
                    "leftFileStart": {"line": 4},
                    "rightFileStart": {"line": 9}
                },
                "comments": [{"content": "x", "commentType": "text"}]
            }"#,
        );
        assert_eq!(extract_pending_comments(&[thread])[0].line, Some(9));

        let left_only = thread_from_json(
            r#"{
                "status": "active",
                "threadContext": {"filePath": "/a.ts", "leftFileStart": {"line": 4}},
                "comments": [{"content": "x", "commentType": "text"}]
            }"#,
        );
        assert_eq!(extract_pending_comments(&[left_only])[0].line, Some(4));
    }

    #[test]
    fn newlines_collapse_to_single_spaces() {
        let thread = thread_from_json(
            r#"{
                "status": "active",
                "comments": [{"content": "  line one\r\n\r\n  line two\nline three  ", "commentType": "text"}]
            }"#,
        );
        let pending = extract_pending_comments(&[thread]);
        assert_eq!(pending[0].comment, "line one line two line three");
        assert!(!pending[0].comment.contains('\n'));
    }

    #[test]
    fn thread_then_comment_order_is_preserved() {
        let first = thread_from_json(
            r#"{"status": "active", "comments": [
                {"content": "1a", "commentType": "text"},
                {"content": "1b", "commentType": "text"}]}"#,
        );
        let second = thread_from_json(
            r#"{"status": "active", "comments": [{"content": "2a", "commentType": "text"}]}"#,
        );
        let order: Vec<String> = extract_pending_comments(&[first, second])
            .into_iter()
            .map(|c| c.comment)
            .collect();
        assert_eq!(order, vec!["1a", "1b", "2a"]);
    }
}
