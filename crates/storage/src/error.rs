//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Store file's parent directory does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Stored data could not be decoded. Delete the store file and let it be
    /// rebuilt.
    #[display("corrupt store {}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        reason: String,
    },
    /// Backend-specific error
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
    /// No backend is registered under the requested name. A configuration
    /// problem; nothing will work until it is fixed.
    #[display("unknown storage backend '{name}', expected one of: {available}")]
    UnknownBackend {
        name: String,
        available: String,
    },
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Backend(_))
    }

    pub(crate) fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        let err = ErrorKind::UnknownBackend { name: "lmdb".to_string(), available: "memory, log".to_string() };
        assert_eq!(err.to_string(), "unknown storage backend 'lmdb', expected one of: memory, log");
        assert_eq!(ErrorKind::NotFound(PathBuf::from("a/b.idx")).to_string(), "file not found: a/b.idx");
    }

    #[test]
    fn error_kind_from_io() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(ErrorKind::from_io(missing, "x"), ErrorKind::NotFound(_)));
        let other = std::io::Error::other("boom");
        let kind = ErrorKind::from_io(other, "x");
        assert!(matches!(kind, ErrorKind::Io(_)));
        assert!(kind.is_retryable());
    }
}
