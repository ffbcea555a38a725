//! Tracks the live voting snapshot and checkpoints it to the store.

use std::num::NonZeroUsize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{debug, info};
use lru::LruCache;
use rusty_poa_types::{BlockHeader, Hash};

use crate::config::PoaConfig;
use crate::error::{ConsensusError, Result};
use crate::recovery::SignerRecovery;
use crate::snapshot::Snapshot;
use crate::store::KeyValueStore;

/// Owns the current snapshot of one chain.
///
/// Not internally synchronized; callers sharing a manager across threads must
/// serialize access themselves.
pub struct SnapshotManager {
    config: Arc<PoaConfig>,
    store: Arc<dyn KeyValueStore>,
    recovery: Arc<dyn SignerRecovery>,
    recents: LruCache<Hash, Snapshot>,
    current: Option<Snapshot>,
}

impl SnapshotManager {
    pub fn new(
        config: PoaConfig,
        store: Arc<dyn KeyValueStore>,
        recovery: Arc<dyn SignerRecovery>,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.inmemory_snapshots).ok_or_else(|| {
            ConsensusError::InvalidConfig("inmemory_snapshots must be non-zero".to_string())
        })?;
        Ok(SnapshotManager {
            config: Arc::new(config),
            store,
            recovery,
            recents: LruCache::new(capacity),
            current: None,
        })
    }

    pub fn config(&self) -> &Arc<PoaConfig> {
        &self.config
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Builds and persists the genesis snapshot from the configured signers.
    pub fn genesis(&mut self, hash: Hash) -> Result<&Snapshot> {
        let snap = Snapshot::new(Arc::clone(&self.config), 0, hash, &self.config.signers);
        snap.store(self.store.as_ref())?;
        info!(
            "Stored genesis voting snapshot 0x{} with {} signers",
            hex::encode(hash),
            snap.signer_count()
        );
        self.install(snap);
        self.current.as_ref().ok_or(ConsensusError::NoSnapshot)
    }

    /// Makes the snapshot stored under `hash` current, e.g. after a restart.
    pub fn resume(&mut self, hash: &Hash) -> Result<&Snapshot> {
        let snap = self.snapshot(hash)?;
        info!("Resumed voting snapshot at block {}", snap.number());
        self.install(snap);
        self.current.as_ref().ok_or(ConsensusError::NoSnapshot)
    }

    /// Looks a snapshot up by block hash, memory first, then the store.
    pub fn snapshot(&mut self, hash: &Hash) -> Result<Snapshot> {
        if let Some(snap) = self.recents.get(hash) {
            return Ok(snap.clone());
        }
        let snap = Snapshot::load(Arc::clone(&self.config), self.store.as_ref(), hash)?;
        debug!("Loaded voting snapshot from disk at block {}", snap.number());
        self.recents.put(*hash, snap.clone());
        Ok(snap)
    }

    /// Replays `headers` on the current snapshot and makes the result current.
    ///
    /// On a replay error the current snapshot is left untouched. A snapshot
    /// landing on a checkpoint is persisted after it became current, so a
    /// persistence error leaves the new snapshot live but unsaved.
    pub fn advance(&mut self, headers: &[BlockHeader]) -> Result<&Snapshot> {
        self.advance_inner(headers, None)
    }

    /// Like [`SnapshotManager::advance`], abortable between headers.
    pub fn advance_with_abort(
        &mut self,
        headers: &[BlockHeader],
        abort: &AtomicBool,
    ) -> Result<&Snapshot> {
        self.advance_inner(headers, Some(abort))
    }

    fn advance_inner(
        &mut self,
        headers: &[BlockHeader],
        abort: Option<&AtomicBool>,
    ) -> Result<&Snapshot> {
        let current = self.current.as_ref().ok_or(ConsensusError::NoSnapshot)?;
        let previous = current.number();
        let snap = match abort {
            Some(flag) => current.apply_with_abort(headers, self.recovery.as_ref(), flag)?,
            None => current.apply(headers, self.recovery.as_ref())?,
        };
        let checkpoint =
            snap.number() != previous && snap.number() % self.config.checkpoint_interval == 0;

        self.install(snap);
        let snap = self.current.as_ref().ok_or(ConsensusError::NoSnapshot)?;
        if checkpoint {
            snap.store(self.store.as_ref())?;
            debug!(
                "Stored voting snapshot to disk at block {} (0x{})",
                snap.number(),
                hex::encode(snap.hash())
            );
        }
        Ok(snap)
    }

    fn install(&mut self, snap: Snapshot) {
        self.recents.put(snap.hash(), snap.clone());
        self.current = Some(snap);
    }
}
