//! Key-value store trait and implementations.
//!
//! A [`Store`] is a flat, ordered-or-not map from byte keys to byte values,
//! persisted in a single file (or nowhere, for [`MemoryStore`]). Every store
//! is owned by exactly one index for the lifetime of a run; there is no
//! locking and no support for two processes opening the same file.

mod log;
mod memory;
#[cfg(feature = "redb")]
mod redb;

pub use self::log::LogStore;
pub use self::memory::MemoryStore;
#[cfg(feature = "redb")]
pub use self::redb::RedbStore;
use crate::error::Result;

/// A key/value pair read back from a store.
pub type Entry = (Vec<u8>, Vec<u8>);
/// Iterator over every entry in a store. Each call to [`Store::items`]
/// starts a fresh pass.
pub type Items<'a> = Box<dyn Iterator<Item = Result<Entry>> + 'a>;

/// Uniform interface over the storage backends.
///
/// # Examples
///
/// ```
/// use bookdesc_storage::backend::{MemoryStore, Store};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut store = MemoryStore::default();
/// store.set(b"key", b"value")?;
/// assert_eq!(store.get(b"key")?, Some(b"value".to_vec()));
///
/// let keys: Vec<Vec<u8>> = store.items()?.map(|entry| entry.map(|(key, _)| key)).collect::<Result<_, _>>()?;
/// assert_eq!(keys, vec![b"key".to_vec()]);
/// Box::new(store).close()?;
/// # Ok(())
/// # }
/// ```
pub trait Store {
    /// Name of the backend this store was opened with.
    fn name(&self) -> &str;

    /// Look up the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`, returning whether it was present.
    fn remove(&mut self, key: &[u8]) -> Result<bool>;

    /// Every entry currently in the store, in no guaranteed order.
    fn items(&self) -> Result<Items<'_>>;

    /// Make every write so far durable.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the store. Consumes the store so it cannot be used
    /// after its file handle is gone.
    fn close(self: Box<Self>) -> Result<()>;
}
