//! Block header as seen by the signer-voting replay.

use serde::{Deserialize, Serialize};

use crate::{Address, Hash};

/// Nonce marking a vote to add the coinbase account to the signer set.
pub const NONCE_AUTH_VOTE: [u8; 8] = [0xff; 8];
/// Nonce marking a vote to remove the coinbase account from the signer set.
pub const NONCE_DROP_VOTE: [u8; 8] = [0x00; 8];
/// Nonce marking a proposal to change the quorum percentage.
pub const NONCE_QUORUM_VOTE: [u8; 8] = [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00];

/// The vote intent a header carries in its nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteKind {
    Authorize,
    Drop,
    QuorumPercent,
}

impl VoteKind {
    /// Decodes the nonce sentinel; any other value is not a valid vote.
    pub fn from_nonce(nonce: &[u8; 8]) -> Option<Self> {
        match *nonce {
            NONCE_AUTH_VOTE => Some(VoteKind::Authorize),
            NONCE_DROP_VOTE => Some(VoteKind::Drop),
            NONCE_QUORUM_VOTE => Some(VoteKind::QuorumPercent),
            _ => None,
        }
    }

    pub fn nonce(&self) -> [u8; 8] {
        match self {
            VoteKind::Authorize => NONCE_AUTH_VOTE,
            VoteKind::Drop => NONCE_DROP_VOTE,
            VoteKind::QuorumPercent => NONCE_QUORUM_VOTE,
        }
    }
}

/// Header fields the authorization snapshot depends on.
///
/// The seal carries the signer's proof over [`BlockHeader::seal_hash`] and is
/// excluded from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block
    pub parent_hash: Hash,
    /// Height of this block
    pub number: u64,
    /// Seconds since the unix epoch
    pub timestamp: u64,
    /// Account the vote in `nonce` is about
    pub coinbase: Address,
    /// Vote marker, see [`VoteKind::from_nonce`]
    pub nonce: [u8; 8],
    /// Free-form vanity data
    pub extra: Vec<u8>,
    /// Signer seal, opaque at this layer
    pub seal: Vec<u8>,
}

#[derive(Serialize)]
struct SealedFields<'a> {
    parent_hash: &'a Hash,
    number: u64,
    timestamp: u64,
    coinbase: &'a Address,
    nonce: &'a [u8; 8],
    extra: &'a [u8],
}

impl BlockHeader {
    pub fn new(parent_hash: Hash, number: u64, coinbase: Address, nonce: [u8; 8]) -> Self {
        BlockHeader {
            parent_hash,
            number,
            timestamp: 0,
            coinbase,
            nonce,
            extra: Vec::new(),
            seal: Vec::new(),
        }
    }

    /// Hash identifying the block, seal included.
    pub fn hash(&self) -> Hash {
        // Encoding an in-memory struct of plain fields cannot fail.
        let encoded = bincode::serialize(self).unwrap_or_default();
        *blake3::hash(&encoded).as_bytes()
    }

    /// Hash the signer commits to when sealing.
    pub fn seal_hash(&self) -> Hash {
        let fields = SealedFields {
            parent_hash: &self.parent_hash,
            number: self.number,
            timestamp: self.timestamp,
            coinbase: &self.coinbase,
            nonce: &self.nonce,
            extra: &self.extra,
        };
        let encoded = bincode::serialize(&fields).unwrap_or_default();
        *blake3::hash(&encoded).as_bytes()
    }

    pub fn vote_kind(&self) -> Option<VoteKind> {
        VoteKind::from_nonce(&self.nonce)
    }

    /// Proposed quorum percentage carried by a quorum vote.
    pub fn quorum_proposal(&self) -> u64 {
        self.coinbase.low_u64()
    }
}
