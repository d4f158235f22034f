use super::{BoundedText, Limits, collapse_whitespace, is_blacklisted, non_empty, parse_year};
use crate::models::Book;
use roxmltree::{Document, Node};

const NAME_PARTS: [&str; 3] = ["first-name", "middle-name", "last-name"];

/// Parse a namespace-free `<description>` fragment as XML.
///
/// Returns `None` when the fragment is not well-formed; the caller is
/// expected to fall back to [`parse_fallback`](super::parse_fallback).
///
/// Field preference, first non-empty wins:
/// - title: `publish-info/book-name`, `title-info/book-title`
/// - year: `publish-info/year`, `publish-info/date`, `title-info/date`
/// - authors: `title-info/author`, else `document-info/author`
pub fn parse_tree(xml: &str, limits: &Limits) -> Option<Book> {
    let document = match Document::parse(xml) {
        Ok(document) => document,
        Err(err) => {
            tracing::debug!(%err, "description is not well-formed XML");
            return None;
        },
    };
    let root = document.root_element();
    let description = if is_named(&root, "description") {
        root
    } else {
        root.descendants().find(|node| is_named(node, "description"))?
    };
    let publish = child(description, "publish-info");
    let title_info = child(description, "title-info");
    let document_info = child(description, "document-info");

    let title = [(publish, "book-name"), (title_info, "book-title")]
        .into_iter()
        .find_map(|(section, name)| first_text(section, name));
    let year = [(publish, "year"), (publish, "date"), (title_info, "date")]
        .into_iter()
        .filter_map(|(section, name)| section.map(|section| children(section, name)))
        .flatten()
        .find_map(year_of);

    let mut authors = title_info.map(authors_of).unwrap_or_default();
    if authors.is_empty() {
        authors = document_info.map(authors_of).unwrap_or_default();
    }

    let annotation = title_info.and_then(|section| child(section, "annotation")).and_then(|annotation| {
        let mut text = BoundedText::new(limits.annotation);
        dump_text(annotation, &mut text, |piece| piece.to_string());
        text.finish()
    });
    let mut metatext = BoundedText::new(limits.metatext);
    dump_text(description, &mut metatext, collapse_whitespace);

    Some(Book {
        title,
        authors,
        year,
        edition: first_text(publish, "edition"),
        isbn: first_text(publish, "isbn"),
        annotation,
        metatext: metatext.finish(),
        ..Book::default()
    })
}

fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn children<'a, 'input>(node: Node<'a, 'input>, name: &str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| is_named(child, name))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

/// Text of the first `name` child of `section` that has any.
fn first_text(section: Option<Node<'_, '_>>, name: &str) -> Option<String> {
    section.and_then(|section| children(section, name).find_map(text_of))
}

/// All text beneath `node`, trimmed.
fn text_of(node: Node<'_, '_>) -> Option<String> {
    let text: String = node.descendants().filter(|node| node.is_text()).filter_map(|node| node.text()).collect();
    non_empty(&text)
}

/// `<date value="2004-05-01">` carries a machine-readable year even when its
/// text is free-form or missing.
fn year_of(node: Node<'_, '_>) -> Option<i32> {
    text_of(node).and_then(|text| parse_year(&text)).or_else(|| node.attribute("value").and_then(parse_year))
}

fn authors_of(section: Node<'_, '_>) -> Vec<String> {
    section
        .children()
        .filter(|node| is_named(node, "author"))
        .filter_map(|author| {
            let parts: Vec<String> =
                NAME_PARTS.iter().filter_map(|part| children(author, part).find_map(text_of)).collect();
            non_empty(&parts.join(" "))
        })
        .filter(|name| !is_blacklisted(name))
        .collect()
}

/// Depth-first walk in document order, feeding every text node to `out`
/// until it is full.
fn dump_text(node: Node<'_, '_>, out: &mut BoundedText, normalize: impl Fn(&str) -> String) {
    for text in node.descendants().filter(|node| node.is_text()).filter_map(|node| node.text()) {
        if out.is_full() {
            break;
        }
        out.push(&normalize(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<description>
  <title-info>
    <genre>sf</genre>
    <author>
      <first-name>Дмитрий</first-name>
      <middle-name>Петрович</middle-name>
      <last-name>Грибов</last-name>
    </author>
    <author><first-name>Author</first-name><last-name>Unknown</last-name></author>
    <author><nickname>ghost</nickname></author>
    <book-title>Тестовый документ</book-title>
    <annotation><p>First   paragraph.</p><p>Second <emphasis>with</emphasis> tail.</p></annotation>
    <date value="2003-02-01">early 2003</date>
    <lang>ru</lang>
  </title-info>
  <document-info>
    <author><nickname>producer</nickname><first-name>Fb2</first-name><last-name>Maker</last-name></author>
  </document-info>
  <publish-info>
    <book-name>Published Name</book-name>
    <year>2004</year>
    <isbn>5-00-000000-0</isbn>
  </publish-info>
</description>"#;

    #[test]
    fn resolves_fields_by_preference() {
        let book = parse_tree(DESCRIPTION, &Limits::default()).unwrap();
        assert_eq!(book.title.as_deref(), Some("Published Name"));
        assert_eq!(book.authors, vec!["Дмитрий Петрович Грибов".to_string()]);
        assert_eq!(book.year, Some(2004));
        assert_eq!(book.isbn.as_deref(), Some("5-00-000000-0"));
        assert_eq!(book.edition, None);
        assert_eq!(book.annotation.as_deref(), Some("First   paragraph. Second with tail."));
        let metatext = book.metatext.unwrap();
        assert!(metatext.starts_with("sf Дмитрий Петрович Грибов Author Unknown ghost Тестовый документ"));
        assert!(metatext.contains("First paragraph."));
        assert!(!metatext.contains('\n'));
    }

    #[test]
    fn falls_back_to_title_info() {
        let xml = r#"<description><title-info>
            <book-title>Own Title</book-title>
            <date value="1999-01-01"/>
        </title-info><publish-info><book-name>  </book-name></publish-info></description>"#;
        let book = parse_tree(xml, &Limits::default()).unwrap();
        assert_eq!(book.title.as_deref(), Some("Own Title"));
        assert_eq!(book.year, Some(1999));
        assert!(book.authors.is_empty());
    }

    #[test]
    fn skips_blank_elements() {
        let xml = "<description><title-info><book-title/><book-title>  </book-title>\
            <book-title>Filled</book-title><date/><date>2011</date></title-info>\
            <publish-info><isbn/><isbn>978-5</isbn></publish-info></description>";
        let book = parse_tree(xml, &Limits::default()).unwrap();
        assert_eq!(book.title.as_deref(), Some("Filled"));
        assert_eq!(book.year, Some(2011));
        assert_eq!(book.isbn.as_deref(), Some("978-5"));
    }

    #[test]
    fn falls_back_to_document_info_authors() {
        let xml = "<description><title-info/><document-info><author>\
            <first-name>Fb2</first-name><last-name>Maker</last-name></author></document-info></description>";
        let book = parse_tree(xml, &Limits::default()).unwrap();
        assert_eq!(book.authors, vec!["Fb2 Maker".to_string()]);
    }

    #[test]
    fn applies_limits() {
        let limits = Limits { annotation: 5, metatext: 12 };
        let book = parse_tree(DESCRIPTION, &limits).unwrap();
        assert_eq!(book.annotation.as_deref(), Some("First"));
        assert_eq!(book.metatext.as_deref(), Some("sf Дмитрий П"));
    }

    #[test]
    fn malformed_xml_is_none() {
        assert!(parse_tree("<description><title-info><book-title>x</title-info>", &Limits::default()).is_none());
        assert!(parse_tree("<description><l:p>prefixed</l:p></description>", &Limits::default()).is_none());
    }

    #[test]
    fn empty_description() {
        let book = parse_tree("<description/>", &Limits::default()).unwrap();
        assert!(book.is_blank());
    }
}
