//! Metadata and content-hash extraction for FictionBook2 (FB2) ebooks.
//!
//! An FB2 file is an XML document whose `<description>` element carries the
//! bibliographic metadata, usually within the first few kilobytes, followed
//! by a body that can run to many megabytes. [`Extractor`] reads the file
//! once through a fixed-size buffer, hashing every byte, and parses only the
//! `<description>`:
//!
//! 1. [`TextEncoding::sniff`] works out the encoding from the first buffer,
//! 2. [`locate_description`] finds the element's byte span without decoding,
//! 3. [`strip_namespaces`] drops prefixes the detached fragment can't resolve,
//! 4. [`parse_tree`] reads it as XML, falling back to [`parse_fallback`] for
//!    markup too broken to parse.

mod checksum;
mod consts;
mod encoding;
pub mod error;
mod extractor;
mod locate;
pub mod models;
mod namespace;
mod parse;

pub use crate::checksum::{ChecksumReader, Digest, HashAlgorithm};
pub use crate::consts::{DEFAULT_ANNOTATION_LIMIT, DEFAULT_METATEXT_LIMIT, MINIMUM_BUFFER_SIZE};
pub use crate::encoding::{TextEncoding, codepage_alias};
pub use crate::extractor::{Extractor, Scan};
pub use crate::locate::{Span, locate_description};
pub use crate::models::{Book, FileInfo};
pub use crate::namespace::strip_namespaces;
pub use crate::parse::{Limits, parse_fallback, parse_tree};
