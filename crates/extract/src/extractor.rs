//! The read loop tying checksumming, encoding detection, description lookup
//! and parsing together.

use crate::checksum::{ChecksumReader, Digest, HashAlgorithm};
use crate::consts::MINIMUM_BUFFER_SIZE;
use crate::encoding::TextEncoding;
use crate::error::{ErrorKind, Result};
use crate::locate::locate_description;
use crate::models::{Book, FileInfo, Md5Digest, Sha1Digest};
use crate::namespace::strip_namespaces;
use crate::parse::{Limits, parse_fallback, parse_tree};
use std::io::Read;
use tracing::instrument;

/// Everything learnt from one pass over a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Parsed metadata, if a `<description>` was found
    pub book: Option<Book>,
    /// Detected encoding of the stream (UTF-8 for an empty stream)
    pub encoding: TextEncoding,
    pub sha1: Option<Sha1Digest>,
    pub md5: Option<Md5Digest>,
    /// Total bytes read
    pub length: u64,
}

enum State {
    /// No `<description>` seen yet; every refill is searched.
    Seeking,
    /// A `<description>` was found and parsed (successfully or not); the rest
    /// of the stream is only read to finish the checksums.
    Found,
}

/// Extracts a [`Book`] from an FB2 byte stream.
///
/// The stream is read exactly once, through a single reusable buffer, so
/// memory use is bounded by the buffer size no matter how large the book is.
/// The whole stream is always hashed, even after the metadata has been found.
///
/// # Examples
///
/// ```
/// use bookdesc_extract::{Extractor, FileInfo};
///
/// let fb2 = r#"<?xml version="1.0" encoding="utf-8"?>
/// <FictionBook><description><title-info>
///   <author><first-name>Jane</first-name><last-name>Doe</last-name></author>
///   <book-title>Example</book-title>
/// </title-info></description><body/></FictionBook>"#;
/// let book = Extractor::new().extract(fb2.as_bytes(), FileInfo::default()).unwrap().unwrap();
/// assert_eq!(book.title.as_deref(), Some("Example"));
/// assert_eq!(book.authors, ["Jane Doe"]);
/// assert!(book.file.sha1.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Extractor {
    buffer_size: usize,
    md5: bool,
    limits: Limits,
}
impl Default for Extractor {
    fn default() -> Self {
        Self { buffer_size: MINIMUM_BUFFER_SIZE, md5: true, limits: Limits::default() }
    }
}
impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a larger read buffer. The `<description>` element has to fit in
    /// one buffer to be parsed as XML.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::BufferTooSmall`] below [`MINIMUM_BUFFER_SIZE`].
    pub fn with_buffer_size(mut self, size: usize) -> Result<Self> {
        if size < MINIMUM_BUFFER_SIZE {
            exn::bail!(ErrorKind::BufferTooSmall { size, minimum: MINIMUM_BUFFER_SIZE });
        }
        self.buffer_size = size;
        Ok(self)
    }

    /// Whether to compute the secondary MD5 digest.
    pub fn with_md5(mut self, md5: bool) -> Self {
        self.md5 = md5;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Extract a book from `reader`, completing `file` with the content
    /// digests (and the size, if the caller did not know it).
    ///
    /// Returns `Ok(None)` when the stream has no `<description>`. A
    /// description with no usable fields still gives a (blank) book.
    ///
    /// # Errors
    ///
    /// Only fails if reading the stream fails.
    #[instrument(skip(self, reader, file), fields(path = file.path.as_deref().unwrap_or("-")))]
    pub fn extract<R: Read>(&self, reader: R, file: FileInfo) -> Result<Option<Book>> {
        let scan = self.scan(reader)?;
        let Some(mut book) = scan.book else {
            tracing::info!(bytes = scan.length, "no usable description found");
            return Ok(None);
        };
        book.file = FileInfo { sha1: scan.sha1, md5: scan.md5, size: file.size.or(Some(scan.length)), ..file };
        Ok(Some(book))
    }

    /// Read the whole stream, hashing it and parsing the first
    /// `<description>` found along the way.
    pub fn scan<R: Read>(&self, reader: R) -> Result<Scan> {
        let mut algorithms = vec![HashAlgorithm::Sha1];
        if self.md5 {
            algorithms.push(HashAlgorithm::Md5);
        }
        let mut reader = ChecksumReader::new(reader, self.buffer_size, algorithms)?;
        let mut encoding = None;
        let mut state = State::Seeking;
        let mut book = None;

        while reader.read()? > 0 {
            if let State::Found = state {
                continue;
            }
            let chunk = reader.chunk();
            let encoding = *encoding.get_or_insert_with(|| {
                let detected = TextEncoding::sniff(chunk);
                tracing::debug!(encoding = %detected, "detected text encoding");
                detected
            });
            if let Some(span) = locate_description(chunk, encoding) {
                book = Some(self.parse(span.slice(chunk), encoding, span.complete));
                state = State::Found;
            }
        }

        Ok(Scan {
            book,
            encoding: encoding.unwrap_or_default(),
            sha1: match reader.digest(HashAlgorithm::Sha1) {
                Some(Digest::Sha1(digest)) => Some(digest),
                _ => None,
            },
            md5: match reader.digest(HashAlgorithm::Md5) {
                Some(Digest::Md5(digest)) => Some(digest),
                _ => None,
            },
            length: reader.total(),
        })
    }

    fn parse(&self, fragment: &[u8], encoding: TextEncoding, complete: bool) -> Book {
        let text = encoding.decode_lossy(fragment);
        let text = strip_namespaces(&text);
        let parsed = complete.then(|| parse_tree(&text, &self.limits)).flatten();
        let book = parsed.unwrap_or_else(|| {
            tracing::debug!(complete, "parsing description with pattern matching");
            parse_fallback(&text, &self.limits)
        });
        if book.is_blank() {
            tracing::warn!("description contained no usable metadata");
        }
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::to_hex;
    use sha1::{Digest as _, Sha1};
    use std::io::{Cursor, Error as IoError};
    use time::macros::datetime;

    const SAMPLE: &[u8] = include_bytes!("../fixtures/fb2-sample.fb2");
    const SAMPLE_SHA1: &str = include_str!("../fixtures/fb2-sample.fb2.sha1");

    fn sha1_hex(data: &[u8]) -> String {
        to_hex(&Sha1::digest(data))
    }

    fn utf8_book(description: &str, padding: usize) -> Vec<u8> {
        let mut fb2 = b"<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<FictionBook>".to_vec();
        fb2.extend(std::iter::repeat_n(b' ', padding));
        fb2.extend_from_slice(description.as_bytes());
        fb2.extend_from_slice(b"<body><p>text</p></body></FictionBook>");
        fb2
    }

    #[test]
    fn extracts_known_sample() {
        let modified = datetime!(2020-06-01 12:00:00 UTC);
        let file = FileInfo::new("library/sample.fb2", SAMPLE.len() as u64, modified);
        let book = Extractor::new().extract(SAMPLE, file).unwrap().unwrap();

        assert_eq!(book.title.as_deref(), Some("Тестовый платный документ FictionBook 2.1"));
        assert_eq!(book.authors, vec!["Дмитрий Петрович Грибов".to_string()]);
        assert_eq!(book.year, Some(2004));
        assert_eq!(book.file.sha1_hex().as_deref(), Some(SAMPLE_SHA1.trim()));
        assert!(book.file.md5.is_some());
        assert_eq!(book.file.path.as_deref(), Some("library/sample.fb2"));
        assert_eq!(book.file.modified, Some(modified));
        assert_eq!(book.file.size, Some(SAMPLE.len() as u64));
    }

    #[test]
    fn sample_is_windows_1251() {
        let scan = Extractor::new().scan(SAMPLE).unwrap();
        assert_eq!(scan.encoding.label(), "windows-1251");
        assert_eq!(scan.length, SAMPLE.len() as u64);
    }

    #[test]
    fn checksums_stream_without_description() {
        let data: Vec<u8> = b"<FictionBook><body>".iter().copied().cycle().take(3 * MINIMUM_BUFFER_SIZE + 17).collect();
        let scan = Extractor::new().scan(Cursor::new(&data)).unwrap();
        assert!(scan.book.is_none());
        assert_eq!(scan.length, data.len() as u64);
        assert_eq!(to_hex(&scan.sha1.unwrap()), sha1_hex(&data));
        assert_eq!(to_hex(&scan.md5.unwrap()), format!("{:x}", md5::compute(&data)));

        let file = FileInfo::default();
        assert_eq!(Extractor::new().extract(Cursor::new(&data), file).unwrap(), None);
    }

    #[test]
    fn finds_description_in_later_buffer() {
        let description = "<description><title-info><book-title>Late</book-title></title-info></description>";
        let data = utf8_book(description, MINIMUM_BUFFER_SIZE + 10);
        let scan = Extractor::new().scan(data.as_slice()).unwrap();
        assert_eq!(scan.book.unwrap().title.as_deref(), Some("Late"));
        assert_eq!(to_hex(&scan.sha1.unwrap()), sha1_hex(&data));
    }

    #[test]
    fn only_first_description_is_used() {
        let description = "<description><title-info><book-title>First</book-title></title-info></description>\
            <description><title-info><book-title>Second</book-title></title-info></description>";
        let book = Extractor::new().extract(utf8_book(description, 0).as_slice(), FileInfo::default()).unwrap();
        assert_eq!(book.unwrap().title.as_deref(), Some("First"));
    }

    #[test]
    fn malformed_description_uses_fallback() {
        let description = "<description><title-info><author><first-name>Jane</first-name>\
            <last-name>Doe</last-name></author><book-title>Broken</book-title></p><date>2010</date></description>";
        let book = Extractor::new().extract(utf8_book(description, 0).as_slice(), FileInfo::default()).unwrap().unwrap();
        assert_eq!(book.title.as_deref(), Some("Broken"));
        assert_eq!(book.authors, vec!["Jane Doe".to_string()]);
        assert_eq!(book.year, Some(2010));
    }

    #[test]
    fn truncated_description_uses_fallback() {
        let mut data = b"<?xml version=\"1.0\"?>\n<FictionBook>".to_vec();
        data.resize(MINIMUM_BUFFER_SIZE - 100, b' ');
        data.extend_from_slice(b"<description><title-info><book-title>Cut</book-title><annotation>");
        data.extend(std::iter::repeat_n(b'x', 500));
        data.extend_from_slice(b"</annotation></title-info></description>");
        let book = Extractor::new().extract(data.as_slice(), FileInfo::default()).unwrap().unwrap();
        assert_eq!(book.title.as_deref(), Some("Cut"));
        assert_eq!(book.annotation, None);
    }

    #[test]
    fn blank_description_still_gives_book() {
        let data = utf8_book("<description><title-info></title-info></description>", 0);
        let book = Extractor::new().extract(data.as_slice(), FileInfo::default()).unwrap().unwrap();
        assert!(book.title.is_none());
        assert!(book.authors.is_empty());
        assert_eq!(book.file.sha1_hex(), Some(sha1_hex(&data)));
        assert_eq!(book.file.size, Some(data.len() as u64));
    }

    #[test]
    fn namespaced_utf16_document() {
        let fb2 = "<?xml version=\"1.0\" encoding=\"utf-16\"?>\n<FictionBook xmlns:l=\"http://www.w3.org/1999/xlink\">\
            <description><title-info><book-title>Wide</book-title><coverpage><image l:href=\"#cover.jpg\"/></coverpage>\
            </title-info></description></FictionBook>";
        let mut data = vec![0xFF, 0xFE];
        data.extend(fb2.encode_utf16().flat_map(|unit| unit.to_le_bytes()));
        let scan = Extractor::new().with_md5(false).scan(data.as_slice()).unwrap();
        assert_eq!(scan.encoding, TextEncoding::Utf16Le);
        assert_eq!(scan.book.unwrap().title.as_deref(), Some("Wide"));
        assert!(scan.md5.is_none());
    }

    #[test]
    fn read_failure_is_an_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(IoError::other("unplugged"))
            }
        }
        let err = Extractor::new().extract(Broken, FileInfo::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
    }

    #[test]
    fn rejects_small_buffer() {
        let err = Extractor::new().with_buffer_size(MINIMUM_BUFFER_SIZE / 2).unwrap_err();
        assert!(matches!(&*err, ErrorKind::BufferTooSmall { .. }));
        let extractor = Extractor::new().with_buffer_size(2 * MINIMUM_BUFFER_SIZE).unwrap();
        assert_eq!(extractor.buffer_size(), 2 * MINIMUM_BUFFER_SIZE);
    }
}
