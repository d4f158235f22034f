//! Namespace prefix removal for detached XML fragments.
//!
//! The `<description>` fragment is cut out of a document whose namespace
//! declarations live on the root element, so any `l:href` or `xlink:href`
//! inside it refers to a prefix the fragment never declares. Rather than
//! resolve namespaces, prefixes are dropped from element and attribute names
//! and everything is matched by local name. Attribute values, text, comments
//! and CDATA sections are left untouched.

use std::borrow::Cow;

/// Constructs copied through verbatim: (opening, closing).
const VERBATIM: &[(&str, &str)] = &[("<!--", "-->"), ("<![CDATA[", "]]>"), ("<?", "?>"), ("<!", ">")];

/// Remove namespace prefixes from every element and attribute name.
///
/// ```
/// use bookdesc_extract::strip_namespaces;
///
/// let xml = r#"<l:image xlink:href="http://example.com/a:b"/>"#;
/// assert_eq!(strip_namespaces(xml), r#"<image href="http://example.com/a:b"/>"#);
/// ```
pub fn strip_namespaces(xml: &str) -> Cow<'_, str> {
    if !xml.contains(':') {
        return Cow::Borrowed(xml);
    }
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        rest = &rest[open..];
        if let Some((open_marker, close_marker)) = VERBATIM.iter().find(|(marker, _)| rest.starts_with(marker)) {
            let end = rest[open_marker.len()..]
                .find(close_marker)
                .map(|found| open_marker.len() + found + close_marker.len())
                .unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        let end = tag_end(rest);
        strip_tag(&rest[..end], &mut out);
        rest = &rest[end..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Length of the tag at the start of `markup`, including its closing `>`.
/// Runs to the end of the input for an unterminated tag.
fn tag_end(markup: &str) -> usize {
    let mut quote = None;
    for (index, c) in markup.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, '>') => return index + 1,
            _ => {},
        }
    }
    markup.len()
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '<' | '>' | '/' | '=' | '"' | '\'' | '?' | '!')
}

fn strip_tag(tag: &str, out: &mut String) {
    let mut quote = None;
    let mut name_start = None;
    for (index, c) in tag.char_indices() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        if is_name_char(c) {
            name_start.get_or_insert(index);
            continue;
        }
        if let Some(start) = name_start.take() {
            push_local_name(&tag[start..index], out);
        }
        if matches!(c, '"' | '\'') {
            quote = Some(c);
        }
        out.push(c);
    }
    if let Some(start) = name_start {
        push_local_name(&tag[start..], out);
    }
}

fn push_local_name(name: &str, out: &mut String) {
    match name.rsplit_once(':') {
        Some((_, local)) if !local.is_empty() => out.push_str(local),
        _ => out.push_str(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<l:p>text: more</l:p>", "<p>text: more</p>")]
    #[case(r#"<a b='x:y' c:d="1"/>"#, r#"<a b='x:y' d="1"/>"#)]
    #[case(r##"<image l:href = "#cover:jpg" />"##, r##"<image href = "#cover:jpg" />"##)]
    #[case(r#"<description xmlns:l="http://www.w3.org/1999/xlink">"#, r#"<description l="http://www.w3.org/1999/xlink">"#)]
    #[case("<!-- a:b --><x:y/>", "<!-- a:b --><y/>")]
    #[case("<![CDATA[<a:b>]]><c:d>", "<![CDATA[<a:b>]]><d>")]
    #[case("<a:b attr=\"unterminated:value", "<b attr=\"unterminated:value")]
    #[case("<a: b>", "<a: b>")]
    fn strips_prefixes(#[case] xml: &str, #[case] expected: &str) {
        assert_eq!(strip_namespaces(xml), expected);
    }

    #[test]
    fn untouched_without_colons() {
        let xml = "<description><title-info/></description>";
        assert!(matches!(strip_namespaces(xml), Cow::Borrowed(_)));
    }

    #[test]
    fn handles_multibyte_text() {
        assert_eq!(strip_namespaces("<l:p>Грибов: «тест»</l:p>"), "<p>Грибов: «тест»</p>");
    }
}
