//! Per-shard index of books keyed by content hash.

use crate::error::{ErrorKind, Result};
use bookdesc_extract::Book;
use bookdesc_storage::{BackendRegistry, Store};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Prefix of every metadata key. Longer than any digest, so a metadata key
/// can never be mistaken for a content key.
const META_PREFIX: &[u8] = b"\x00bookdesc:index-metadata:";

/// Auxiliary value stored alongside the books of an index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    Text(String),
    Bytes(Vec<u8>),
    /// Modification time and size of a file, used to tell whether it changed
    Stamp {
        #[serde(with = "time::serde::timestamp::nanoseconds")]
        modified: OffsetDateTime,
        size: u64,
    },
}

impl MetaValue {
    /// Stamp of the file at `path` as it is now.
    pub fn stamp(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::Stamp { modified: metadata.modified()?.into(), size: metadata.len() })
    }
}

fn meta_key(key: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(META_PREFIX.len() + key.len());
    bytes.extend_from_slice(META_PREFIX);
    bytes.extend_from_slice(key.as_bytes());
    bytes
}

/// Books of one shard, deduplicated by SHA-1, persisted in a [`Store`].
///
/// Saving a book whose digest is already present replaces the stored copy.
/// Arbitrary [`MetaValue`]s can be kept under string keys in a namespace that
/// never overlaps with the books.
pub struct ContentIndex {
    path: PathBuf,
    store: Box<dyn Store>,
}

impl std::fmt::Debug for ContentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentIndex").field("path", &self.path).field("backend", &self.store.name()).finish()
    }
}

impl ContentIndex {
    /// Open (or create) the index at `path` with the named backend.
    pub fn open(registry: &BackendRegistry, backend: &str, path: &Path) -> Result<Self> {
        let store = registry.open(backend, path).or_raise(|| ErrorKind::Storage(path.to_path_buf()))?;
        Ok(Self::with_store(path, store))
    }

    /// Wrap an already opened store.
    pub fn with_store(path: impl Into<PathBuf>, store: Box<dyn Store>) -> Self {
        Self { path: path.into(), store }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self) -> impl FnOnce() -> ErrorKind + '_ {
        || ErrorKind::Storage(self.path.clone())
    }

    /// Store `book` under its SHA-1 digest, replacing any book already there.
    pub fn save(&mut self, book: &Book) -> Result<()> {
        let Some(key) = book.key() else {
            exn::bail!(ErrorKind::MissingHash);
        };
        let value = serde_json::to_vec(book).or_raise(|| ErrorKind::Corrupt("book is not serializable".to_string()))?;
        let path = &self.path;
        self.store.set(key, &value).or_raise(|| ErrorKind::Storage(path.clone()))
    }

    /// Every book in the index, in the store's iteration order. Each call
    /// starts from the beginning.
    pub fn list(&self) -> Result<impl Iterator<Item = Result<Book>> + '_> {
        let items = self.store.items().or_raise(self.storage_error())?;
        Ok(items.filter_map(move |item| match item {
            Ok((key, _)) if key.starts_with(META_PREFIX) => None,
            Ok((key, value)) => Some(decode_book(&key, &value)),
            Err(err) => Some(Err(err).or_raise(|| ErrorKind::Storage(self.path.clone()))),
        }))
    }

    /// The book stored under `sha1`.
    pub fn get_book(&self, sha1: &[u8]) -> Result<Option<Book>> {
        if sha1.starts_with(META_PREFIX) {
            return Ok(None);
        }
        match self.store.get(sha1).or_raise(self.storage_error())? {
            Some(value) => decode_book(sha1, &value).map(Some),
            None => Ok(None),
        }
    }

    /// Every book whose title is exactly `title`.
    pub fn find_by_title(&self, title: &str) -> Result<Vec<Book>> {
        let mut found = Vec::new();
        for book in self.list()? {
            let book = book?;
            if book.title.as_deref() == Some(title) {
                found.push(book);
            }
        }
        Ok(found)
    }

    /// Store a metadata value under `key`.
    pub fn set(&mut self, key: &str, value: &MetaValue) -> Result<()> {
        let value = serde_json::to_vec(value).or_raise(|| ErrorKind::Corrupt(format!("metadata '{key}'")))?;
        let path = &self.path;
        self.store.set(&meta_key(key), &value).or_raise(|| ErrorKind::Storage(path.clone()))
    }

    /// The metadata value under `key`. A value that no longer decodes is
    /// reported as absent.
    pub fn get(&self, key: &str) -> Result<Option<MetaValue>> {
        let Some(value) = self.store.get(&meta_key(key)).or_raise(self.storage_error())? else {
            return Ok(None);
        };
        match serde_json::from_slice(&value) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), key, %err, "ignoring undecodable index metadata");
                Ok(None)
            },
        }
    }

    /// Remove the metadata value under `key`, returning whether it existed.
    pub fn clear(&mut self, key: &str) -> Result<bool> {
        let path = &self.path;
        self.store.remove(&meta_key(key)).or_raise(|| ErrorKind::Storage(path.clone()))
    }

    pub fn flush(&mut self) -> Result<()> {
        let path = &self.path;
        self.store.flush().or_raise(|| ErrorKind::Storage(path.clone()))
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<()> {
        let Self { path, store } = self;
        store.close().or_raise(|| ErrorKind::Storage(path))
    }
}

fn decode_book(key: &[u8], value: &[u8]) -> Result<Book> {
    serde_json::from_slice(value).or_raise(|| {
        ErrorKind::Corrupt(format!("book {}", bookdesc_extract::models::to_hex(key)))
    })
}
