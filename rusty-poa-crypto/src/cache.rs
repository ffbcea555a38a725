//! Memoization of recovered seal signers.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use log::trace;
use lru::LruCache;
use rusty_poa_types::{Address, BlockHeader, Hash};

use crate::error::CryptoError;
use crate::seal::recover_seal_signer;

/// Number of recent block signatures kept by default.
pub const DEFAULT_SIGNATURE_CACHE_SIZE: usize = 4096;

/// Bounded cache of header hash -> recovered signer.
///
/// Shared between replay streams; every entry can be recomputed from the
/// header, so eviction never changes results.
pub struct SignatureCache {
    entries: Mutex<LruCache<Hash, Address>>,
}

impl SignatureCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        SignatureCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<Address> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(hash).copied()
    }

    pub fn insert(&self, hash: Hash, signer: Address) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(hash, signer);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached signer for the header or recovers and caches it.
    pub fn recover(&self, header: &BlockHeader) -> Result<Address, CryptoError> {
        let hash = header.hash();
        if let Some(signer) = self.get(&hash) {
            return Ok(signer);
        }
        let signer = recover_seal_signer(header)?;
        trace!("Recovered signer {} for block {}", signer, header.number);
        self.insert(hash, signer);
        Ok(signer)
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        // DEFAULT_SIGNATURE_CACHE_SIZE is non-zero
        SignatureCache::new(NonZeroUsize::new(DEFAULT_SIGNATURE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}
