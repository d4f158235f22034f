//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Malformed metadata is *not* an error in this crate: an unparseable
//! `<description>` falls back to pattern matching, and a document without
//! one simply yields no book. Errors are reserved for the byte stream itself
//! misbehaving, or for the extractor being configured badly.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading the underlying byte stream failed part way through. The input
    /// should be skipped; other inputs are unaffected.
    #[display("failed to read input stream: {_0}")]
    Io(IoError),
    /// The read buffer is below the supported minimum. This is a
    /// configuration problem and nothing will work until it is fixed.
    #[display("buffer of {size} bytes is smaller than the {minimum} byte minimum")]
    BufferTooSmall {
        /// The requested buffer size.
        size: usize,
        /// The smallest accepted buffer size.
        minimum: usize,
    },
    /// A hash algorithm name was not recognised.
    #[display("unknown hash algorithm: {_0}")]
    UnknownAlgorithm(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::BufferTooSmall { size: 512, minimum: 1024 }.to_string(),
            "buffer of 512 bytes is smaller than the 1024 byte minimum"
        );
        assert_eq!(ErrorKind::UnknownAlgorithm("crc".to_string()).to_string(), "unknown hash algorithm: crc");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Io(IoError::other("disk on fire")).is_retryable());
        assert!(!ErrorKind::BufferTooSmall { size: 0, minimum: 1 }.is_retryable());
    }
}
