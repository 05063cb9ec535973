//! Text sanitizing for the two output surfaces.
//!
//! Markup output (SVG trends, HTML snapshots) goes through
//! [`escape_markup`]; terminal cells go through [`strip_control`] so a
//! server-supplied string can never move the cursor or repaint the screen.

use std::borrow::Cow;

/// Replaces `&`, `<`, `>` and `"` with their entity forms.
pub fn escape_markup(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Single-line cell text: control characters (newlines included) become
/// spaces.
pub fn strip_control(text: &str) -> Cow<'_, str> {
    if !text.chars().any(char::is_control) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect(),
    )
}

/// Multi-line viewer text: keeps line breaks, expands tabs, drops every
/// other control character (escape sequences included).
pub fn sanitize_block(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("<b>", "&lt;b&gt;")]
    #[case("a & \"b\"", "a &amp; &quot;b&quot;")]
    #[case("&amp;", "&amp;amp;")]
    fn markup_is_escaped(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_markup(input), expected);
    }

    #[test]
    fn control_characters_are_neutralized() {
        assert_eq!(strip_control("ok\x1b[2Jbad\nline"), "ok [2Jbad line");
        assert_eq!(sanitize_block("a\tb\r\n\x07c"), "a    b\nc");
    }
}
