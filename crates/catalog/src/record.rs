//! Conversion between [`Book`]s and CSV records.
//!
//! The header row decides which column holds which field, so files with
//! reordered, missing or unknown columns are all readable. Files are always
//! written with [`CANONICAL_COLUMNS`].

use crate::error::{ErrorKind, Result};
use bookdesc_extract::Book;
use bookdesc_extract::models::{from_hex, to_hex};
use csv::StringRecord;
use exn::{OptionExt, ResultExt};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

/// A recognised CSV column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Sha1,
    Md5,
    Title,
    Authors,
    Year,
    Edition,
    Isbn,
    Path,
    Size,
    ModTime,
    Annotation,
    MetaText,
}

/// Columns written to every catalog file, in order.
pub const CANONICAL_COLUMNS: [Column; 12] = [
    Column::Sha1,
    Column::Md5,
    Column::Title,
    Column::Authors,
    Column::Year,
    Column::Edition,
    Column::Isbn,
    Column::Path,
    Column::Size,
    Column::ModTime,
    Column::Annotation,
    Column::MetaText,
];

/// Separator between authors within the `Authors` column.
const AUTHOR_SEPARATOR: char = ';';

impl Column {
    /// Header name as written.
    pub fn name(self) -> &'static str {
        match self {
            Column::Sha1 => "SHA1",
            Column::Md5 => "MD5",
            Column::Title => "Title",
            Column::Authors => "Authors",
            Column::Year => "Year",
            Column::Edition => "Edition",
            Column::Isbn => "ISBN",
            Column::Path => "Path",
            Column::Size => "Size",
            Column::ModTime => "ModTime",
            Column::Annotation => "Annotation",
            Column::MetaText => "MetaText",
        }
    }

    /// Recognise a header cell, ignoring case and surrounding whitespace.
    /// `Name` is accepted as an older spelling of `Title`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("name") {
            return Some(Column::Title);
        }
        CANONICAL_COLUMNS.into_iter().find(|column| column.name().eq_ignore_ascii_case(name))
    }

    /// The field's value as a cell; absent values are empty.
    fn get(self, book: &Book) -> String {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        match self {
            Column::Sha1 => book.file.sha1_hex().unwrap_or_default(),
            Column::Md5 => book.file.md5_hex().unwrap_or_default(),
            Column::Title => text(&book.title),
            Column::Authors => book.authors.join(&AUTHOR_SEPARATOR.to_string()),
            Column::Year => book.year.map(|year| year.to_string()).unwrap_or_default(),
            Column::Edition => text(&book.edition),
            Column::Isbn => text(&book.isbn),
            Column::Path => text(&book.file.path),
            Column::Size => book.file.size.map(|size| size.to_string()).unwrap_or_default(),
            Column::ModTime => book
                .file
                .modified
                .and_then(|modified| modified.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
                .unwrap_or_default(),
            Column::Annotation => text(&book.annotation),
            Column::MetaText => text(&book.metatext),
        }
    }

    /// Set the field from a non-empty cell.
    fn set(self, book: &mut Book, value: &str) -> Result<()> {
        let invalid = || ErrorKind::InvalidField { column: self.name(), value: value.to_string() };
        match self {
            Column::Sha1 => book.file.sha1 = Some(from_hex(value).ok_or_raise(invalid)?),
            Column::Md5 => book.file.md5 = Some(from_hex(value).ok_or_raise(invalid)?),
            Column::Title => book.title = Some(value.to_string()),
            Column::Authors => {
                book.authors = value
                    .split(AUTHOR_SEPARATOR)
                    .map(str::trim)
                    .filter(|author| !author.is_empty())
                    .map(String::from)
                    .collect();
            },
            Column::Year => book.year = Some(value.parse::<i32>().or_raise(invalid)?),
            Column::Edition => book.edition = Some(value.to_string()),
            Column::Isbn => book.isbn = Some(value.to_string()),
            Column::Path => book.file.path = Some(value.to_string()),
            Column::Size => book.file.size = Some(value.parse::<u64>().or_raise(invalid)?),
            Column::ModTime => {
                let modified = OffsetDateTime::parse(value, &Rfc3339)
                    .or_else(|_| OffsetDateTime::parse(value, &Iso8601::DEFAULT))
                    .or_raise(invalid)?;
                book.file.modified = Some(modified);
            },
            Column::Annotation => book.annotation = Some(value.to_string()),
            Column::MetaText => book.metatext = Some(value.to_string()),
        }
        Ok(())
    }
}

/// The canonical header row.
pub fn header() -> StringRecord {
    CANONICAL_COLUMNS.iter().map(|column| column.name()).collect()
}

/// `book` as a record in [`CANONICAL_COLUMNS`] order.
pub fn to_record(book: &Book) -> StringRecord {
    CANONICAL_COLUMNS.iter().map(|column| column.get(book)).collect()
}

/// Reads records laid out according to a header row.
#[derive(Clone, Debug)]
pub struct RowParser {
    columns: Vec<Option<Column>>,
}

impl Default for RowParser {
    fn default() -> Self {
        Self { columns: CANONICAL_COLUMNS.into_iter().map(Some).collect() }
    }
}

impl RowParser {
    /// Map each cell position of `header` to the column it names. Unknown
    /// names are ignored, and if a name repeats the first one wins.
    pub fn from_header(header: &StringRecord) -> Self {
        let mut columns: Vec<Option<Column>> = Vec::with_capacity(header.len());
        for name in header {
            let column = Column::from_name(name).filter(|column| !columns.contains(&Some(*column)));
            columns.push(column);
        }
        Self { columns }
    }

    /// Recognised columns, in header order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().flatten().copied()
    }

    /// Parse one row. Missing trailing cells and empty cells leave their
    /// fields absent; a malformed value fails the whole row.
    pub fn parse(&self, record: &StringRecord) -> Result<Book> {
        let mut book = Book::default();
        for (column, value) in self.columns.iter().zip(record.iter()) {
            let Some(column) = column else {
                continue;
            };
            let value = value.trim();
            if !value.is_empty() {
                column.set(&mut book, value)?;
            }
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookdesc_extract::FileInfo;
    use rstest::rstest;
    use time::macros::datetime;

    fn full_book() -> Book {
        Book {
            title: Some("Тестовый платный документ, \"quoted\"".to_string()),
            authors: vec!["Дмитрий Петрович Грибов".to_string(), "Second Author".to_string()],
            year: Some(2004),
            edition: Some("2nd".to_string()),
            isbn: Some("5-00-000000-0".to_string()),
            annotation: Some("Line one\nline two".to_string()),
            metatext: Some("sf Дмитрий Петрович Грибов".to_string()),
            file: FileInfo {
                sha1: Some([0xAB; 20]),
                md5: Some([0x01; 16]),
                path: Some("/books/a, b.fb2".to_string()),
                size: Some(12345),
                modified: Some(datetime!(2020-01-02 03:04:05 +03:00)),
            },
        }
    }

    #[test]
    fn header_is_canonical() {
        let header = header();
        assert_eq!(
            header.iter().collect::<Vec<_>>().join(","),
            "SHA1,MD5,Title,Authors,Year,Edition,ISBN,Path,Size,ModTime,Annotation,MetaText"
        );
    }

    #[test]
    fn empty_book_round_trip() {
        let record = to_record(&Book::default());
        assert!(record.iter().all(str::is_empty));
        assert_eq!(RowParser::default().parse(&record).unwrap(), Book::default());
    }

    #[test]
    fn full_book_round_trip() {
        let book = full_book();
        let record = to_record(&book);
        assert_eq!(&record[0], "abababababababababababababababababababab");
        assert_eq!(&record[3], "Дмитрий Петрович Грибов;Second Author");
        assert_eq!(&record[9], "2020-01-02T00:04:05Z");
        assert_eq!(RowParser::default().parse(&record).unwrap(), book);
    }

    #[test]
    fn reads_reordered_subset_with_unknown_columns() {
        let header = StringRecord::from(vec![" name ", "Shelf", "AUTHORS", "sha1", "Year"]);
        let parser = RowParser::from_header(&header);
        assert_eq!(parser.columns().collect::<Vec<_>>(), vec![
            Column::Title,
            Column::Authors,
            Column::Sha1,
            Column::Year
        ]);
        let row = StringRecord::from(vec!["book1", "top", " First Author ; ", "0101010101010101010101010101010101010101"]);
        let book = parser.parse(&row).unwrap();
        assert_eq!(book.title.as_deref(), Some("book1"));
        assert_eq!(book.authors, vec!["First Author".to_string()]);
        assert_eq!(book.file.sha1, Some([1; 20]));
        assert_eq!(book.year, None);
    }

    #[test]
    fn first_duplicate_column_wins() {
        let parser = RowParser::from_header(&StringRecord::from(vec!["Title", "title"]));
        let book = parser.parse(&StringRecord::from(vec!["first", "second"])).unwrap();
        assert_eq!(book.title.as_deref(), Some("first"));
    }

    #[test]
    fn reads_offset_timestamps() {
        let parser = RowParser::from_header(&StringRecord::from(vec!["ModTime"]));
        let book = parser.parse(&StringRecord::from(vec!["2019-03-04T10:20:30.123456+05:00"])).unwrap();
        assert_eq!(book.file.modified, Some(datetime!(2019-03-04 05:20:30.123456 UTC)));
    }

    #[rstest]
    #[case("Year", "20x4")]
    #[case("Size", "-1")]
    #[case("SHA1", "3031")]
    #[case("MD5", "zz")]
    #[case("ModTime", "yesterday")]
    fn malformed_values_fail_the_row(#[case] column: &str, #[case] value: &str) {
        let parser = RowParser::from_header(&StringRecord::from(vec![column]));
        let err = parser.parse(&StringRecord::from(vec![value])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidField { .. }));
    }
}
