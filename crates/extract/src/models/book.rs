use super::FileInfo;

/// Bibliographic metadata for one FB2 file.
///
/// Identity is [`FileInfo::sha1`]; two books with the same digest are the
/// same catalog entry and the most recently stored one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Book {
    pub title: Option<String>,
    /// Display names ("First Middle Last"), in document order
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub edition: Option<String>,
    pub isbn: Option<String>,
    /// Annotation text, bounded in length
    pub annotation: Option<String>,
    /// Whitespace-collapsed text dump of the whole `<description>`, bounded
    /// in length; this is what makes the catalog useful to grep
    pub metatext: Option<String>,
    pub file: FileInfo,
}
impl Book {
    /// Content key of the book, if it has been hashed.
    pub fn key(&self) -> Option<&[u8]> {
        self.file.sha1.as_ref().map(|digest| digest.as_slice())
    }

    /// `true` when no bibliographic field was found at all.
    pub fn is_blank(&self) -> bool {
        self.title.is_none()
            && self.authors.is_empty()
            && self.year.is_none()
            && self.edition.is_none()
            && self.isbn.is_none()
            && self.annotation.is_none()
            && self.metatext.is_none()
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn serde_json_round_trip() {
        let book = Book {
            title: Some("Title".to_string()),
            authors: vec!["Some Author".to_string()],
            year: Some(2004),
            file: FileInfo {
                sha1: Some([7; 20]),
                modified: Some(datetime!(2020-01-02 03:04:05.5 +02:00)),
                ..FileInfo::default()
            },
            ..Book::default()
        };
        let json = serde_json::to_vec(&book).unwrap();
        assert_eq!(serde_json::from_slice::<Book>(&json).unwrap(), book);
    }
}
