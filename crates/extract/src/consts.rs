use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

/// Smallest read buffer the extractor accepts. The `<description>` element
/// must fit inside a single buffer to be parsed as a tree.
pub const MINIMUM_BUFFER_SIZE: usize = 1024 * 1024;
/// Default maximum length of an extracted annotation, in characters.
pub const DEFAULT_ANNOTATION_LIMIT: usize = 1024;
/// Default maximum length of the metadata text dump, in characters.
pub const DEFAULT_METATEXT_LIMIT: usize = 4096;
/// How far into the first buffer to look for an XML declaration when the
/// document has no newline at all.
pub(crate) const DECLARATION_WINDOW: usize = 256;

/// Author names that FB2 producers stamp onto books when the real author is
/// unknown, or that belong to mass-generators of junk files. Compared against
/// the lower-cased display name.
pub(crate) const BLACKLISTED_AUTHORS: &[&str] = &[
    "author unknown",
    "unknown author",
    "автор неизвестен",
    "неизвестный автор",
    "неизвестен автор",
    "анонимный автор",
    "без автора",
    "retroshare retroshare",
    "vitmaier",
    "andrey ch",
    "consul",
    "ddd hhh",
];

regex!(DOUBLE_QUOTED_ENCODING_REGEX, r#"encoding\s*=\s*"(.*?)""#);
regex!(SINGLE_QUOTED_ENCODING_REGEX, r"encoding\s*=\s*'(.*?)'");
regex!(WINDOWS_CODEPAGE_REGEX, r"(?i)^windows-(\d+)$");
regex!(MARKUP_REGEX, r"(?s)<[^>]*>");
regex!(WHITESPACE_REGEX, r"\s+");
regex!(YEAR_REGEX, r"[0-9]{4}");
regex!(ENTITY_REGEX, r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);");

// Matches an element by local name, with optional attributes, capturing its
// inner markup up to the nearest closing tag.
const ELEMENT_PATTERN: &str = r"(?s)<{tag}(?:\s[^>/]*)?>(.*?)</{tag}\s*>";

macro_rules! element {
    ($name:ident, $tag:literal) => {
        regex!($name, ELEMENT_PATTERN.replace("{tag}", $tag).as_str());
    };
}

element!(BOOK_NAME_ELEMENT, "book-name");
element!(BOOK_TITLE_ELEMENT, "book-title");
element!(YEAR_ELEMENT, "year");
element!(DATE_ELEMENT, "date");
element!(ISBN_ELEMENT, "isbn");
element!(EDITION_ELEMENT, "edition");
element!(AUTHOR_ELEMENT, "author");
element!(ANNOTATION_ELEMENT, "annotation");
