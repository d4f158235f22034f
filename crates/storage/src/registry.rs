use crate::backend::{LogStore, MemoryStore, Store};
use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Opens a store at the given path.
pub type Opener = fn(&Path) -> Result<Box<dyn Store>>;

/// Named storage backends to choose from at runtime.
///
/// The registry is built explicitly and handed to whatever needs to open
/// stores; there is no global list of backends.
///
/// ```
/// use bookdesc_storage::BackendRegistry;
///
/// let registry = BackendRegistry::with_defaults();
/// assert!(registry.names().any(|name| name == "log"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct BackendRegistry {
    openers: BTreeMap<String, Opener>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every backend this crate was built with: `memory`,
    /// `log` and, with the `redb` feature, `redb`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", |_| Ok(Box::new(MemoryStore::default())));
        registry.register("log", |path| Ok(Box::new(LogStore::open(path)?)));
        #[cfg(feature = "redb")]
        registry.register("redb", |path| Ok(Box::new(crate::backend::RedbStore::open(path)?)));
        registry
    }

    /// Register `opener` under `name`, replacing any backend already
    /// registered under it.
    pub fn register(&mut self, name: impl Into<String>, opener: Opener) -> &mut Self {
        self.openers.insert(name.into(), opener);
        self
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.openers.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.openers.contains_key(name)
    }

    /// Open a store at `path` with the backend registered under `name`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn open(&self, name: &str, path: &Path) -> Result<Box<dyn Store>> {
        let Some(opener) = self.openers.get(name) else {
            exn::bail!(ErrorKind::UnknownBackend {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            });
        };
        opener(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("memory")]
    #[case("log")]
    fn opens_default_backends(#[case] name: &str) {
        check_backend(name);
    }

    #[cfg(feature = "redb")]
    #[test]
    fn opens_redb() {
        check_backend("redb");
    }

    fn check_backend(name: &str) {
        let dir = TempDir::new().unwrap();
        let mut store = BackendRegistry::with_defaults().open(name, &dir.path().join("test.idx")).unwrap();
        assert_eq!(store.name(), name);
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        store.close().unwrap();
    }

    #[test]
    fn unknown_backend_lists_alternatives() {
        let mut registry = BackendRegistry::new();
        registry.register("memory", |_| Ok(Box::new(MemoryStore::default())));
        let err = registry.open("lmdb", Path::new("x.idx")).err().unwrap();
        match &*err {
            ErrorKind::UnknownBackend { name, available } => {
                assert_eq!(name, "lmdb");
                assert_eq!(available, "memory");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_backend_overrides() {
        let mut registry = BackendRegistry::with_defaults();
        registry.register("log", |_| Ok(Box::new(MemoryStore::with_entries([("seed", "1")]))));
        let store = registry.open("log", Path::new("never-created.idx")).unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.get(b"seed").unwrap(), Some(b"1".to_vec()));
    }
}
