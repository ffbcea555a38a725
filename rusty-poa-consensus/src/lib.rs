//! Proof-of-Authority signer voting for Rusty PoA.
//!
//! [`Snapshot`] holds the authorized signer set, recent signers, pending
//! votes and the quorum percentage as of one block. Replaying consecutive
//! headers with [`Snapshot::apply`] derives the next snapshot; the
//! [`SnapshotManager`] keeps the live one and checkpoints it to a
//! [`KeyValueStore`].

pub mod config;
pub mod error;
pub mod manager;
pub mod recovery;
pub mod snapshot;
pub mod store;
pub mod vote;

pub use config::PoaConfig;
pub use error::{ConsensusError, Result};
pub use manager::SnapshotManager;
pub use recovery::{SealRecoverer, SignerRecovery};
pub use snapshot::Snapshot;
pub use store::{snapshot_key, KeyValueStore, MemoryStore};
#[cfg(feature = "rocksdb")]
pub use store::RocksStore;
pub use vote::{QuorumCooldown, QuorumTally, QuorumVote, Tally, Vote};
