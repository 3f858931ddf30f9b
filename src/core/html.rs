use once_cell::sync::Lazy;
use regex::Regex;

// Work-item rich-text fields arrive as HTML fragments. These normalizers
// are deliberately crude: the goal is readable prompt text, not a DOM.

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLOCK_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>|</li\s*>|</h[1-6]\s*>|</tr\s*>").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static TRIPLE_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Flatten HTML to a single line: tags removed, all whitespace runs
/// collapsed to one space.
pub fn strip_tags_inline(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    let text = decode_entities(&text);
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Strip tags but keep paragraph and list structure as newlines. Used when
/// the consumer needs structural hints (completeness analysis).
pub fn strip_tags_block(html: &str) -> String {
    let text = BLOCK_BREAK.replace_all(html, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    TRIPLE_NEWLINE
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

/// Every tag becomes a line break, runs of breaks collapse to one. This is
/// the shape acceptance criteria are stored in: one criterion per element.
pub fn tags_to_newlines(html: &str) -> String {
    let text = TAG.replace_all(html, "\n");
    let text = decode_entities(&text);
    NEWLINE_RUN.replace_all(&text, "\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_strip_flattens_to_one_line() {
        let html = "<p>First&nbsp;part</p>\n<p>Second   part</p>";
        assert_eq!(strip_tags_inline(html), "First part Second part");
    }

    #[test]
    fn inline_strip_of_empty_input_is_empty() {
        assert_eq!(strip_tags_inline(""), "");
        assert_eq!(strip_tags_inline("<div></div>"), "");
    }

    #[test]
    fn block_strip_keeps_paragraph_boundaries() {
        let html = "<p>One</p><p>Two</p><ul><li>a</li><li>b</li></ul>";
        assert_eq!(strip_tags_block(html), "One\nTwo\na\nb");
    }

    #[test]
    fn block_strip_collapses_long_newline_runs_to_two() {
        let html = "<p>One</p><br><br><br><p>Two</p>";
        assert_eq!(strip_tags_block(html), "One\n\nTwo");
    }

    #[test]
    fn tags_to_newlines_emits_one_item_per_element() {
        let html = "<div>Given a cart</div><div>When I pay</div><div>Then order is placed</div>";
        assert_eq!(
            tags_to_newlines(html),
            "Given a cart\nWhen I pay\nThen order is placed"
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(strip_tags_inline("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(strip_tags_inline("&quot;x&quot; &#39;y&#39;"), "\"x\" 'y'");
    }
}
