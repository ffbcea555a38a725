//! Vote records and tallies tracked by a snapshot.

use rusty_poa_types::Address;
use serde::{Deserialize, Serialize};

/// A single vote an authorized signer made to modify the signer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Authorized signer that cast this vote
    pub signer: Address,
    /// Block number the vote was cast in
    pub block: u64,
    /// Account being voted on
    pub address: Address,
    /// Whether to authorize or deauthorize the voted account
    pub authorize: bool,
}

/// A proposal to change the quorum percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumVote {
    pub signer: Address,
    pub block: u64,
    /// Coinbase the proposal travelled in, kept for provenance
    pub address: Address,
    /// Proposed quorum percentage
    pub percent: u64,
    pub authorize: bool,
}

/// Running score of one pending signer-set proposal. Votes against the
/// proposal are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub authorize: bool,
    pub votes: u64,
}

/// Running score of one proposed quorum percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumTally {
    pub authorize: bool,
    pub votes: u64,
    /// Most recent signer that voted for this value
    pub signer: Address,
}

/// Block after which a change affecting a quorum value is permitted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumCooldown {
    pub block: u64,
}
