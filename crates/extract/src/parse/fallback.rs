use super::{BoundedText, Limits, collapse_whitespace, is_blacklisted, non_empty, parse_year};
use crate::consts::{
    ANNOTATION_ELEMENT, AUTHOR_ELEMENT, BOOK_NAME_ELEMENT, BOOK_TITLE_ELEMENT, DATE_ELEMENT, EDITION_ELEMENT,
    ENTITY_REGEX, ISBN_ELEMENT, MARKUP_REGEX, YEAR_ELEMENT,
};
use crate::models::Book;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// Extract book fields from a `<description>` fragment by pattern matching.
///
/// Used when the fragment is not well-formed XML, which is common for files
/// produced by hand or by buggy converters, and for fragments cut short by
/// the end of the read buffer. Never fails: a field that cannot be found is
/// simply absent.
pub fn parse_fallback(xml: &str, limits: &Limits) -> Book {
    let title = first_text(&BOOK_NAME_ELEMENT, xml).or_else(|| first_text(&BOOK_TITLE_ELEMENT, xml));
    let year = [&YEAR_ELEMENT, &DATE_ELEMENT]
        .into_iter()
        .flat_map(|element| texts(element, xml))
        .find_map(|text| parse_year(&text));
    let authors = AUTHOR_ELEMENT
        .captures_iter(xml)
        .filter_map(|captures| captures.get(1))
        .filter_map(|inner| non_empty(&strip_markup(inner.as_str())))
        .filter(|name| !is_blacklisted(name))
        .collect();
    let annotation = first_inner(&ANNOTATION_ELEMENT, xml).and_then(|inner| {
        let mut text = BoundedText::new(limits.annotation);
        text.push(&strip_markup(inner));
        text.finish()
    });
    let mut metatext = BoundedText::new(limits.metatext);
    metatext.push(&strip_markup(xml));

    Book {
        title,
        authors,
        year,
        edition: first_text(&EDITION_ELEMENT, xml),
        isbn: first_text(&ISBN_ELEMENT, xml),
        annotation,
        metatext: metatext.finish(),
        ..Book::default()
    }
}

fn first_inner<'a>(element: &Regex, xml: &'a str) -> Option<&'a str> {
    element.captures(xml).and_then(|captures| captures.get(1)).map(|inner| inner.as_str())
}

/// The text of every match of `element`, skipping blank ones.
fn texts<'a>(element: &'a Regex, xml: &'a str) -> impl Iterator<Item = String> + 'a {
    element
        .captures_iter(xml)
        .filter_map(|captures| captures.get(1))
        .filter_map(|inner| non_empty(&strip_markup(inner.as_str())))
}

fn first_text(element: &Regex, xml: &str) -> Option<String> {
    texts(element, xml).next()
}

/// Replace every tag with a space, resolve character references and collapse
/// whitespace. Tags become spaces so `<first-name>A</first-name><last-name>B`
/// reads as two words.
fn strip_markup(markup: &str) -> String {
    let text = MARKUP_REGEX.replace_all(markup, " ");
    collapse_whitespace(&unescape(&text))
}

fn unescape(text: &str) -> Cow<'_, str> {
    ENTITY_REGEX.replace_all(text, |captures: &Captures<'_>| {
        let entity = &captures[1];
        let resolved = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        resolved.map(String::from).unwrap_or_else(|| captures[0].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn extracts_from_unterminated_markup() {
        let xml = r#"<description><title-info><author><first-name>Дмитрий</first-name>
            <middle-name>Петрович</middle-name><last-name>Грибов</last-name></author>
            <book-title>Broken <emphasis>title</book-title>
            <date>2004</date><annotation><p>Unclosed paragraph</annotation>
            <p>stray"#;
        let book = parse_fallback(xml, &Limits::default());
        assert_eq!(book.title.as_deref(), Some("Broken title"));
        assert_eq!(book.authors, vec!["Дмитрий Петрович Грибов".to_string()]);
        assert_eq!(book.year, Some(2004));
        assert_eq!(book.annotation.as_deref(), Some("Unclosed paragraph"));
        assert!(book.metatext.unwrap().ends_with("Unclosed paragraph stray"));
    }

    #[test]
    fn prefers_publish_info_fields() {
        let xml = "<description><title-info><book-title>Own</book-title><date>1990</date></title-info>\
            <publish-info><book-name>Published</book-name><year>2001</year><isbn>978-5</isbn>\
            <edition>2nd</edition></publish-info>";
        let book = parse_fallback(xml, &Limits::default());
        assert_eq!(book.title.as_deref(), Some("Published"));
        assert_eq!(book.year, Some(2001));
        assert_eq!(book.isbn.as_deref(), Some("978-5"));
        assert_eq!(book.edition.as_deref(), Some("2nd"));
    }

    #[test]
    fn collects_every_author() {
        let xml = "<author><first-name>A</first-name><last-name>One</last-name></author>\
            <author id=\"2\"><last-name>Two</last-name></author>\
            <author><first-name>ddd</first-name> <last-name>hhh</last-name></author>\
            <author>  </author>";
        let book = parse_fallback(xml, &Limits::default());
        assert_eq!(book.authors, vec!["A One".to_string(), "Two".to_string()]);
    }

    #[test]
    fn skips_blank_matches() {
        let xml = "<book-title> </book-title><book-title><emphasis/></book-title><book-title>Second</book-title>\
            <isbn></isbn><isbn>978-5</isbn><year>n/a</year><year>1999</year>";
        let book = parse_fallback(xml, &Limits::default());
        assert_eq!(book.title.as_deref(), Some("Second"));
        assert_eq!(book.isbn.as_deref(), Some("978-5"));
        assert_eq!(book.year, Some(1999));
    }

    #[test]
    fn unparseable_year_moves_on_to_date() {
        let xml = "<year>n/a</year><date value=\"x\">circa 1875</date>";
        assert_eq!(parse_fallback(xml, &Limits::default()).year, Some(1875));
    }

    #[test]
    fn applies_limits() {
        let xml = "<annotation>abcdefghij</annotation>";
        let book = parse_fallback(xml, &Limits { annotation: 4, metatext: 6 });
        assert_eq!(book.annotation.as_deref(), Some("abcd"));
        assert_eq!(book.metatext.as_deref(), Some("abcdef"));
    }

    #[test]
    fn nothing_to_find() {
        assert!(parse_fallback("", &Limits::default()).is_blank());
        assert!(parse_fallback("<<<>>> </ <", &Limits::default()).authors.is_empty());
    }

    #[rstest]
    #[case("Tom &amp; Jerry", "Tom & Jerry")]
    #[case("&lt;b&gt; &quot;x&quot; &apos;y&apos;", "<b> \"x\" 'y'")]
    #[case("&#1044;&#x43C;", "Дм")]
    #[case("&nbsp; &#xZZ; &#99999999;", "&nbsp; &#xZZ; &#99999999;")]
    fn resolves_references(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(unescape(text), expected);
    }
}
