use rusty_poa_crypto::CryptoError;
use rusty_poa_types::{Address, Hash};
use thiserror::Error;

fn format_hash(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

fn format_nonce(nonce: &[u8; 8]) -> String {
    format!("0x{}", hex::encode(nonce))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("Invalid voting chain: expected block {expected}, found {found}")]
    InvalidChain { expected: u64, found: u64 },
    #[error("Unauthorized signer: {0}")]
    UnauthorizedSigner(Address),
    #[error("Signer {0} signed recently, must wait for others")]
    RecentlySigned(Address),
    #[error("Invalid vote nonce: {}", format_nonce(.0))]
    InvalidVote([u8; 8]),
    #[error("Signature recovery failed: {0}")]
    SignatureRecovery(#[from] CryptoError),
    #[error("Snapshot {} not found", format_hash(.0))]
    SnapshotNotFound(Hash),
    #[error("Failed to decode snapshot: {0}")]
    Decode(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Replay aborted after {processed} headers")]
    Aborted { processed: usize },
    #[error("No current snapshot, initialize from genesis or a stored checkpoint first")]
    NoSnapshot,
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
