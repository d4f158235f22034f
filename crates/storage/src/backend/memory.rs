//! In-memory storage backend.

use super::{Items, Store};
use crate::error::Result;
use std::collections::BTreeMap;

/// Store that keeps everything in a [`BTreeMap`] and persists nothing.
///
/// Useful for tests and for dry runs: a catalog opened on it rebuilds every
/// shard from its CSV on every run.
///
/// # Examples
///
/// ```
/// use bookdesc_storage::backend::{MemoryStore, Store};
///
/// let store = MemoryStore::with_entries([("a", "1"), ("b", "2")]);
/// assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create a store pre-populated with entries.
    pub fn with_entries(entries: impl IntoIterator<Item = (impl Into<Vec<u8>>, impl Into<Vec<u8>>)>) -> Self {
        Self { entries: entries.into_iter().map(|(key, value)| (key.into(), value.into())).collect() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn items(&self) -> Result<Items<'_>> {
        Ok(Box::new(self.entries.iter().map(|(key, value)| Ok((key.clone(), value.clone())))))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behaves_like_a_store() {
        super::super::tests::exercise(Box::new(MemoryStore::default())).close().unwrap();
    }

    #[test]
    fn with_entries_is_ordered() {
        let store = MemoryStore::with_entries([("b", "2"), ("a", "1")]);
        assert_eq!(store.len(), 2);
        let keys: Vec<Vec<u8>> = store.items().unwrap().map(|entry| entry.unwrap().0).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
