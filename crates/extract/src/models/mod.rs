mod book;
mod file;

pub use self::book::Book;
pub use self::file::{FileInfo, Md5Digest, Sha1Digest, from_hex, to_hex};
