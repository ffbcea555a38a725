//! Key-value persistence for snapshots.

use std::collections::HashMap;
use std::sync::RwLock;

use rusty_poa_types::Hash;

use crate::error::{ConsensusError, Result};

/// Namespace prefix of persisted snapshots.
pub const SNAPSHOT_KEY_PREFIX: &[u8] = b"poa-snapshot-";

/// Database key of the snapshot taken at the given block hash.
pub fn snapshot_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(SNAPSHOT_KEY_PREFIX.len() + hash.len());
    key.extend_from_slice(SNAPSHOT_KEY_PREFIX);
    key.extend_from_slice(hash);
    key
}

/// Minimal key-value store. Each call is atomic per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// In-process store, used by tests and light deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| ConsensusError::Persistence(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| ConsensusError::Persistence(e.to_string()))?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

#[cfg(feature = "rocksdb")]
pub use self::rocks::RocksStore;

#[cfg(feature = "rocksdb")]
mod rocks {
    use std::path::Path;

    use rocksdb::{Options, DB};

    use super::KeyValueStore;
    use crate::error::{ConsensusError, Result};

    /// RocksDB backed store.
    pub struct RocksStore {
        db: DB,
    }

    impl RocksStore {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            let db = DB::open(&opts, path)
                .map_err(|e| ConsensusError::Persistence(format!("Failed to open database: {}", e)))?;
            Ok(RocksStore { db })
        }
    }

    impl KeyValueStore for RocksStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.db
                .get(key)
                .map_err(|e| ConsensusError::Persistence(format!("Failed to read from DB: {}", e)))
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.db
                .put(key, value)
                .map_err(|e| ConsensusError::Persistence(format!("Failed to write to DB: {}", e)))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_layout() {
        let key = snapshot_key(&[0xab; 32]);
        assert!(key.starts_with(SNAPSHOT_KEY_PREFIX));
        assert_eq!(&key[SNAPSHOT_KEY_PREFIX.len()..], &[0xab; 32]);
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(b"a").unwrap(), None);

        store.put(b"a", b"1").unwrap();
        store.put(b"a", b"2").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len(), 1);
    }
}
