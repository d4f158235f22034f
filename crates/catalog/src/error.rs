//! Catalog Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Catalog options are unusable. Fix the configuration before retrying.
    #[display("invalid catalog configuration: {_0}")]
    Config(#[error(not(source))] String),
    /// A book without a SHA-1 digest cannot be keyed in the index. This is
    /// a bug in the caller.
    #[display("book has no SHA-1 digest")]
    MissingHash,
    /// Reading or writing a catalog file failed
    #[display("I/O error on {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The shard index's store failed; the underlying storage error is the
    /// child of this one.
    #[display("index store failed: {}", _0.display())]
    Storage(#[error(not(source))] PathBuf),
    /// A CSV cell holds a value its column cannot take
    #[display("invalid {column} value: {value:?}")]
    InvalidField {
        column: &'static str,
        value: String,
    },
    /// A stored value could not be decoded
    #[display("corrupt index entry: {_0}")]
    Corrupt(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Storage(_))
    }
}
