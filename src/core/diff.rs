use serde::{Deserialize, Serialize};

/// New files are rendered whole, up to this many lines.
pub const NEW_FILE_CAP: usize = 150;

/// Unchanged lines carried around each change, both directions.
pub const CONTEXT_LINES: usize = 3;

/// Hard bound on rendered output, separators included. This keeps the
/// prompt payload inside the model context window; lines past the cap
/// are dropped in order, not sampled.
pub const MAX_RENDERED_LINES: usize = 100;

/// One file's worth of rendered diff, ready for prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffBlock {
    pub file_path: String,
    pub rendered_text: String,
    pub added_line_count: usize,
}

impl DiffBlock {
    pub fn render(file_path: impl Into<String>, old: Option<&str>, new: &str) -> Self {
        let render = render_diff(old, new);
        Self {
            file_path: file_path.into(),
            rendered_text: render.text,
            added_line_count: render.added_lines,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiffRender {
    pub text: String,
    pub added_lines: usize,
}

/// Render the difference between two revisions of a text file as numbered
/// lines: `+<n>|<content>` for changed lines, ` <n>|<content>` for context.
/// `old == None` means a brand-new file. Never fails; empty inputs yield
/// an empty string.
pub fn render_diff(old: Option<&str>, new: &str) -> DiffRender {
    match old {
        None => render_new_file(new),
        Some(old) => render_changed_file(old, new),
    }
}

fn render_new_file(new: &str) -> DiffRender {
    if new.is_empty() {
        return DiffRender::default();
    }

    let rendered: Vec<String> = new
        .split('\n')
        .take(NEW_FILE_CAP)
        .enumerate()
        .map(|(idx, line)| format!("+{}|{}", idx + 1, line))
        .collect();

    DiffRender {
        added_lines: rendered.len(),
        text: rendered.join("\n"),
    }
}

fn render_changed_file(old: &str, new: &str) -> DiffRender {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let len = old_lines.len().max(new_lines.len());
    if len == 0 {
        return DiffRender::default();
    }

    // Index-by-index comparison: a line that exists on only one side
    // (length overhang) counts as changed too.
    let mut changed = vec![false; len];
    for i in 0..len {
        if old_lines.get(i) != new_lines.get(i) {
            changed[i] = true;
        }
    }

    let mut marked = vec![false; len];
    for i in 0..len {
        if !changed[i] {
            continue;
        }
        let start = i.saturating_sub(CONTEXT_LINES);
        let end = (i + CONTEXT_LINES).min(len - 1);
        for slot in marked.iter_mut().take(end + 1).skip(start) {
            *slot = true;
        }
    }

    let mut rendered = Vec::new();
    let mut added_lines = 0usize;
    let mut previous: Option<usize> = None;

    for i in 0..len {
        if !marked[i] {
            continue;
        }
        if let Some(prev) = previous {
            if i - prev > 1 {
                rendered.push("...".to_string());
            }
        }
        let prefix = if changed[i] {
            added_lines += 1;
            '+'
        } else {
            ' '
        };
        // Deleted overhang lines have no new-side content.
        let content = new_lines.get(i).copied().unwrap_or("");
        rendered.push(format!("{}{}|{}", prefix, i + 1, content));
        previous = Some(i);
    }

    rendered.truncate(MAX_RENDERED_LINES);

    DiffRender {
        text: rendered.join("\n"),
        added_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_renders_numbered_added_lines() {
        let render = render_diff(None, "a\nb\nc");
        assert_eq!(render.text, "+1|a\n+2|b\n+3|c");
        assert_eq!(render.added_lines, 3);
    }

    #[test]
    fn new_file_is_capped() {
        let content: Vec<String> = (0..500).map(|i| format!("line{}", i)).collect();
        let render = render_diff(None, &content.join("\n"));
        assert_eq!(render.added_lines, NEW_FILE_CAP);
        assert_eq!(render.text.lines().count(), NEW_FILE_CAP);
        assert!(render.text.starts_with("+1|line0"));
        assert!(render.text.ends_with(&format!("+{}|line{}", NEW_FILE_CAP, NEW_FILE_CAP - 1)));
    }

    #[test]
    fn empty_inputs_render_nothing() {
        assert_eq!(render_diff(None, "").text, "");
        assert_eq!(render_diff(Some(""), "").text, "");
    }

    #[test]
    fn single_change_carries_context_window() {
        let old = "a\nb\nc\nd\ne";
        let new = "a\nb\nCHANGED\nd\ne";
        let render = render_diff(Some(old), new);
        let lines: Vec<&str> = render.text.lines().collect();
        assert_eq!(lines, vec![" 1|a", " 2|b", "+3|CHANGED", " 4|d", " 5|e"]);
        assert_eq!(render.added_lines, 1);
    }

    #[test]
    fn identical_inputs_produce_no_diff_content() {
        let text = "a\nb\nc\nd";
        let render = render_diff(Some(text), text);
        assert_eq!(render.text, "");
        assert_eq!(render.added_lines, 0);
    }

    #[test]
    fn distant_changes_are_separated() {
        let old: Vec<String> = (1..=30).map(|i| format!("line{}", i)).collect();
        let mut new = old.clone();
        new[1] = "first".to_string();
        new[25] = "second".to_string();
        let render = render_diff(Some(&old.join("\n")), &new.join("\n"));

        let lines: Vec<&str> = render.text.lines().collect();
        assert!(lines.contains(&"..."));
        assert!(lines.contains(&"+2|first"));
        assert!(lines.contains(&"+26|second"));
        // A single separator between the two runs, none before the first.
        assert_eq!(lines.iter().filter(|l| **l == "...").count(), 1);
        assert_ne!(lines.first(), Some(&"..."));
        assert_eq!(render.added_lines, 2);
    }

    #[test]
    fn deleted_tail_renders_empty_new_content() {
        let render = render_diff(Some("a\nb\nc"), "a");
        let lines: Vec<&str> = render.text.lines().collect();
        assert_eq!(lines, vec![" 1|a", "+2|", "+3|"]);
        assert_eq!(render.added_lines, 2);
    }

    #[test]
    fn rendered_output_never_exceeds_total_cap() {
        let old: Vec<String> = (1..=400).map(|i| format!("old{}", i)).collect();
        let new: Vec<String> = (1..=400).map(|i| format!("new{}", i)).collect();
        let render = render_diff(Some(&old.join("\n")), &new.join("\n"));
        assert_eq!(render.text.lines().count(), MAX_RENDERED_LINES);
        assert_eq!(render.added_lines, 400);
    }

    #[test]
    fn line_numbers_are_one_based_positions() {
        let render = render_diff(None, "x\ny");
        for (idx, line) in render.text.lines().enumerate() {
            let expected = format!("+{}|", idx + 1);
            assert!(line.starts_with(&expected), "line {:?}", line);
        }
    }
}
