//! Storage backend on top of [`redb`], an embedded B-tree database.

use super::{Entry, Items, Store};
use crate::error::{Error, ErrorKind, Result};
use redb::{Database, Durability, ReadableTable, TableDefinition};
use std::fmt::Display;
use std::path::{Path, PathBuf};

const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

fn backend_error<E: Display>(operation: &'static str) -> impl FnOnce(E) -> Error {
    move |err| Error::from(ErrorKind::Backend(format!("redb {operation} failed: {err}")))
}

/// Transactional store in a single redb file.
///
/// Individual writes commit without syncing to disk; [`Store::flush`] commits
/// a durable transaction which persists everything before it.
pub struct RedbStore {
    path: PathBuf,
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").field("path", &self.path).finish()
    }
}

impl RedbStore {
    /// Open or create the database at `path`. The parent directory must
    /// already exist.
    #[tracing::instrument(level = "debug")]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty())
            && !parent.is_dir()
        {
            exn::bail!(ErrorKind::NotFound(parent.to_path_buf()));
        }
        let db = Database::create(path).map_err(|err| match err {
            redb::DatabaseError::Storage(redb::StorageError::Io(io)) => Error::from(ErrorKind::from_io(io, path)),
            other => Error::from(ErrorKind::Corrupt { path: path.to_path_buf(), reason: other.to_string() }),
        })?;
        // Reads fail on a table that has never been written, so create it up front.
        let txn = db.begin_write().map_err(backend_error("begin_write"))?;
        txn.open_table(ENTRIES).map_err(backend_error("open_table"))?;
        txn.commit().map_err(backend_error("commit"))?;
        Ok(Self { path: path.to_path_buf(), db })
    }

    fn write<T>(&self, apply: impl FnOnce(&mut redb::Table<'_, &'static [u8], &'static [u8]>) -> Result<T>) -> Result<T> {
        let mut txn = self.db.begin_write().map_err(backend_error("begin_write"))?;
        txn.set_durability(Durability::None);
        let result = {
            let mut table = txn.open_table(ENTRIES).map_err(backend_error("open_table"))?;
            apply(&mut table)?
        };
        txn.commit().map_err(backend_error("commit"))?;
        Ok(result)
    }
}

impl Store for RedbStore {
    fn name(&self) -> &str {
        "redb"
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(backend_error("begin_read"))?;
        let table = txn.open_table(ENTRIES).map_err(backend_error("open_table"))?;
        let value = table.get(key).map_err(backend_error("get"))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(|table| {
            table.insert(key, value).map_err(backend_error("insert"))?;
            Ok(())
        })
    }

    fn remove(&mut self, key: &[u8]) -> Result<bool> {
        self.write(|table| Ok(table.remove(key).map_err(backend_error("remove"))?.is_some()))
    }

    fn items(&self) -> Result<Items<'_>> {
        let txn = self.db.begin_read().map_err(backend_error("begin_read"))?;
        let table = txn.open_table(ENTRIES).map_err(backend_error("open_table"))?;
        let entries = table
            .iter()
            .map_err(backend_error("iter"))?
            .map(|entry| {
                let (key, value) = entry.map_err(backend_error("iter"))?;
                Ok((key.value().to_vec(), value.value().to_vec()))
            })
            .collect::<Result<Vec<Entry>>>()?;
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn flush(&mut self) -> Result<()> {
        // A durable commit persists every non-durable commit before it.
        let txn = self.db.begin_write().map_err(backend_error("begin_write"))?;
        txn.commit().map_err(backend_error("commit"))
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn behaves_like_a_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.idx");
        super::super::tests::exercise(Box::new(RedbStore::open(&path).unwrap())).close().unwrap();

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get(b"one").unwrap(), Some(b"uno".to_vec()));
        assert_eq!(store.items().unwrap().count(), 3);
    }

    #[test]
    fn flushed_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.idx");
        {
            let mut store = RedbStore::open(&path).unwrap();
            store.set(b"key", b"value").unwrap();
            store.flush().unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.idx");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();
        let err = RedbStore::open(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt { .. } | ErrorKind::Io(_) | ErrorKind::Backend(_)));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = RedbStore::open(&dir.path().join("missing/test.idx")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
