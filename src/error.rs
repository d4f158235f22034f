use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that end the run. Problems with individual inputs are logged and
/// counted instead.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("failed to write catalog at {}", _0.display())]
    Catalog(#[error(not(source))] PathBuf),
}
