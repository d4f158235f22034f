//! Turning a decoded `<description>` fragment into a [`Book`](crate::models::Book).
//!
//! [`parse_tree`] is tried first and gives the most faithful result. When the
//! fragment is not well-formed XML, [`parse_fallback`] pulls the same fields
//! out with patterns. Both apply the same length limits.

mod fallback;
mod tree;

pub use self::fallback::parse_fallback;
pub use self::tree::parse_tree;
use crate::consts::{
    BLACKLISTED_AUTHORS, DEFAULT_ANNOTATION_LIMIT, DEFAULT_METATEXT_LIMIT, WHITESPACE_REGEX, YEAR_REGEX,
};

/// Upper bounds on the free-text fields, in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub annotation: usize,
    pub metatext: usize,
}
impl Default for Limits {
    fn default() -> Self {
        Self { annotation: DEFAULT_ANNOTATION_LIMIT, metatext: DEFAULT_METATEXT_LIMIT }
    }
}

/// Accumulates space-separated text pieces up to a character limit.
#[derive(Debug)]
pub(crate) struct BoundedText {
    text: String,
    chars: usize,
    limit: usize,
}
impl BoundedText {
    pub(crate) fn new(limit: usize) -> Self {
        Self { text: String::new(), chars: 0, limit }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.chars >= self.limit
    }

    /// Append a piece, separated from the previous one by a space. Blank
    /// pieces are skipped. Anything past the limit is cut off.
    pub(crate) fn push(&mut self, piece: &str) {
        let piece = piece.trim();
        if piece.is_empty() || self.is_full() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
            self.chars += 1;
        }
        for c in piece.chars().take(self.limit.saturating_sub(self.chars)) {
            self.text.push(c);
            self.chars += 1;
        }
    }

    pub(crate) fn finish(self) -> Option<String> {
        non_empty(&self.text)
    }
}

pub(crate) fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// A plain integer if the whole cell is one, otherwise the first run of four
/// digits (`"2004-05-01"`, `"c. 1999"`).
pub(crate) fn parse_year(text: &str) -> Option<i32> {
    let text = text.trim();
    text.parse::<i32>().ok().or_else(|| YEAR_REGEX.find(text).and_then(|found| found.as_str().parse().ok()))
}

pub(crate) fn is_blacklisted(author: &str) -> bool {
    let author = author.to_lowercase();
    BLACKLISTED_AUTHORS.contains(&author.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2004", Some(2004))]
    #[case(" 1999 ", Some(1999))]
    #[case("2004-05-01", Some(2004))]
    #[case("May 2010, reprinted 2012", Some(2010))]
    #[case("-44", Some(-44))]
    #[case("199", Some(199))]
    #[case("c. 199", None)]
    #[case("", None)]
    #[case("unknown", None)]
    fn parses_years(#[case] text: &str, #[case] expected: Option<i32>) {
        assert_eq!(parse_year(text), expected);
    }

    #[rstest]
    #[case("Author Unknown", true)]
    #[case("АВТОР НЕИЗВЕСТЕН", true)]
    #[case("ddd hhh", true)]
    #[case("Дмитрий Петрович Грибов", false)]
    fn blacklist_ignores_case(#[case] author: &str, #[case] expected: bool) {
        assert_eq!(is_blacklisted(author), expected);
    }

    #[test]
    fn bounded_text_joins_and_truncates() {
        let mut text = BoundedText::new(10);
        text.push("  one ");
        text.push("");
        text.push("two");
        assert!(!text.is_full());
        text.push("three");
        assert!(text.is_full());
        text.push("four");
        assert_eq!(text.finish().as_deref(), Some("one two th"));
    }

    #[test]
    fn bounded_text_counts_characters_not_bytes() {
        let mut text = BoundedText::new(3);
        text.push("Грибов");
        assert_eq!(text.finish().as_deref(), Some("Гри"));
    }

    #[test]
    fn empty_bounded_text_is_none() {
        let mut text = BoundedText::new(0);
        text.push("anything");
        assert_eq!(text.finish(), None);
        assert_eq!(BoundedText::new(5).finish(), None);
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }
}
