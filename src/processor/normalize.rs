//! Text normalization for raw job fields
//!
//! Job descriptions arrive as a mix of plain text, HTML fragments and
//! copy-pasted rich text. Normalization strips markup, decodes common
//! entities, straightens quotes and collapses whitespace so downstream
//! heuristics see uniform text.

use regex::Regex;
use std::sync::LazyLock;

// Pre-compiled regex patterns for performance
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

static MULTI_NEWLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static BR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p>|</li>|</div>").unwrap());

/// Normalize a free-text field.
///
/// Applies the full cleaning sequence:
/// 1. Replace block-level HTML breaks with newlines
/// 2. Strip remaining tags
/// 3. Decode common HTML entities
/// 4. Remove zero-width and control characters
/// 5. Straighten typographic quotes
/// 6. Collapse whitespace and excess blank lines
pub fn normalize_text(text: &str) -> String {
    let mut result = BR_REGEX.replace_all(text, "\n").into_owned();
    result = TAG_REGEX.replace_all(&result, "").into_owned();
    result = decode_html_entities(&result);
    result = remove_zero_width(&result);
    result = remove_control_chars(&result);
    result = normalize_quotes(&result);
    result = normalize_whitespace(&result);
    result = trim_lines(&result);
    result = collapse_newlines(&result);

    result.trim().to_string()
}

/// Normalize an optional raw field, mapping blank results to `None`
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.map(normalize_text).filter(|s| !s.is_empty())
}

/// Remove zero-width spaces and similar invisible characters
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Decode common HTML entities to plain text
pub fn decode_html_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#xa0;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
}

/// Replace typographic quotes and dashes with their ASCII forms
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect()
}

/// Normalize multiple spaces/tabs to single space
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").into_owned()
}

/// Trim trailing/leading whitespace on each line
fn trim_lines(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

/// Collapse runs of three or more newlines down to two
fn collapse_newlines(text: &str) -> String {
    MULTI_NEWLINE_REGEX.replace_all(text, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_html_tags() {
        let dirty = "<p>We are <b>hiring</b> a Rust engineer.</p>";
        assert_eq!(normalize_text(dirty), "We are hiring a Rust engineer.");
    }

    #[test]
    fn test_block_tags_become_line_breaks() {
        let dirty = "<ul><li>Ship features</li><li>Fix bugs</li></ul>";
        let clean = normalize_text(dirty);
        assert_eq!(clean, "Ship features\nFix bugs");
    }

    #[test]
    fn test_entity_decoding() {
        let dirty = "Pay &amp; benefits&nbsp;&gt; market";
        assert_eq!(normalize_text(dirty), "Pay & benefits > market");
    }

    #[test]
    fn test_quote_normalization() {
        let dirty = "\u{201C}You\u{2019}ll thrive\u{201D} \u{2014} hiring manager";
        assert_eq!(normalize_text(dirty), "\"You'll thrive\" - hiring manager");
    }

    #[test]
    fn test_whitespace_collapse() {
        let dirty = "Senior   Engineer\t\tRemote\n\n\n\n\nApply now";
        assert_eq!(normalize_text(dirty), "Senior Engineer Remote\n\nApply now");
    }

    #[test]
    fn test_zero_width_removal() {
        let dirty = "Eng\u{200B}ineer\u{FEFF}";
        assert_eq!(normalize_text(dirty), "Engineer");
    }

    #[test]
    fn test_normalize_opt_blank_is_none() {
        assert_eq!(normalize_opt(Some("  <p> </p> ")), None);
        assert_eq!(normalize_opt(None), None);
        assert_eq!(normalize_opt(Some("Acme")), Some("Acme".to_string()));
    }
}
