//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Every configuration error is fatal: fix the configuration and run again.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// A configuration source could not be read or did not match the
    /// expected shape
    #[display("failed to load configuration")]
    Load,
    /// Configuration loaded, but holds values that cannot work together
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}
