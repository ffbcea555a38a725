//! Authorization voting state at a given block and the header replay that
//! advances it.
//!
//! A snapshot is an immutable value once produced. [`Snapshot::apply`] works on
//! a private copy and only hands it back when every header replayed cleanly,
//! so a failed replay leaves the caller's snapshot as the only valid state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use rusty_poa_types::{Address, BlockHeader, Hash, VoteKind};
use serde::{Deserialize, Serialize};

use crate::config::{PoaConfig, DEFAULT_QUORUM_PERCENT};
use crate::error::{ConsensusError, Result};
use crate::recovery::SignerRecovery;
use crate::store::{snapshot_key, KeyValueStore};
use crate::vote::{QuorumCooldown, QuorumTally, QuorumVote, Tally, Vote};

/// Minimum time between progress reports of a long replay.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(8);

fn default_quorum_percent() -> u64 {
    DEFAULT_QUORUM_PERCENT
}

/// The state of authorization voting at a given block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Engine parameters, re-attached after load
    #[serde(skip)]
    config: Arc<PoaConfig>,

    /// Block number where the snapshot was created
    number: u64,
    /// Block hash where the snapshot was created
    #[serde(with = "hex::serde")]
    hash: Hash,
    /// Set of authorized signers at this moment
    signers: HashSet<Address>,
    /// Recent signers by block number, for spam protection
    #[serde(default)]
    recents: HashMap<u64, Address>,
    /// Signer-set votes in chronological order
    #[serde(default)]
    votes: Vec<Arc<Vote>>,
    /// Current signer-set vote tally, keyed by target account
    #[serde(default)]
    tally: HashMap<Address, Tally>,

    /// Percentage of signers required to pass a proposal
    #[serde(default = "default_quorum_percent")]
    quorum_percent: u64,
    /// Quorum percentage proposals in chronological order
    #[serde(default)]
    quorum_votes: Vec<Arc<QuorumVote>>,
    /// Current quorum proposal tally, keyed by proposed percentage
    #[serde(default)]
    quorum_tally: HashMap<u64, QuorumTally>,
    /// Cooldowns set by passed quorum proposals, keyed by percentage
    #[serde(default)]
    quorum_cooldowns: HashMap<u64, QuorumCooldown>,
}

impl Snapshot {
    /// Creates a snapshot from a fixed signer set.
    ///
    /// Recent signers are not reconstructed, so only use this for the genesis
    /// block: mid-chain it would reset spam protection.
    pub fn new(config: Arc<PoaConfig>, number: u64, hash: Hash, signers: &[Address]) -> Self {
        Snapshot {
            quorum_percent: config.quorum_percent,
            config,
            number,
            hash,
            signers: signers.iter().copied().collect(),
            recents: HashMap::new(),
            votes: Vec::new(),
            tally: HashMap::new(),
            quorum_votes: Vec::new(),
            quorum_tally: HashMap::new(),
            quorum_cooldowns: HashMap::new(),
        }
    }

    /// Loads the snapshot persisted under `hash` and attaches `config` to it.
    pub fn load(config: Arc<PoaConfig>, store: &dyn KeyValueStore, hash: &Hash) -> Result<Self> {
        let blob = store
            .get(&snapshot_key(hash))?
            .ok_or(ConsensusError::SnapshotNotFound(*hash))?;
        let mut snap: Snapshot =
            serde_json::from_slice(&blob).map_err(|e| ConsensusError::Decode(e.to_string()))?;
        if snap.hash != *hash {
            return Err(ConsensusError::Decode(format!(
                "stored snapshot is for block 0x{}, requested 0x{}",
                hex::encode(snap.hash),
                hex::encode(hash)
            )));
        }
        snap.config = config;
        trace!("Loaded voting snapshot {} at block {}", hex::encode(snap.hash), snap.number);
        Ok(snap)
    }

    /// Persists the snapshot keyed by its block hash.
    pub fn store(&self, store: &dyn KeyValueStore) -> Result<()> {
        let blob = serde_json::to_vec(self).map_err(|e| ConsensusError::Persistence(e.to_string()))?;
        store.put(&snapshot_key(&self.hash), &blob)?;
        trace!("Stored voting snapshot {} at block {}", hex::encode(self.hash), self.number);
        Ok(())
    }

    pub fn config(&self) -> &Arc<PoaConfig> {
        &self.config
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    pub fn recents(&self) -> &HashMap<u64, Address> {
        &self.recents
    }

    pub fn votes(&self) -> &[Arc<Vote>] {
        &self.votes
    }

    pub fn tally(&self) -> &HashMap<Address, Tally> {
        &self.tally
    }

    pub fn quorum_percent(&self) -> u64 {
        self.quorum_percent
    }

    pub fn quorum_votes(&self) -> &[Arc<QuorumVote>] {
        &self.quorum_votes
    }

    pub fn quorum_tally(&self) -> &HashMap<u64, QuorumTally> {
        &self.quorum_tally
    }

    pub fn quorum_cooldowns(&self) -> &HashMap<u64, QuorumCooldown> {
        &self.quorum_cooldowns
    }

    /// Pending signer-set proposals: target -> authorize.
    pub fn proposals(&self) -> HashMap<Address, bool> {
        self.tally
            .iter()
            .map(|(address, tally)| (*address, tally.authorize))
            .collect()
    }

    /// Block number `signer` last sealed inside the spam window, if any.
    pub fn recently_signed(&self, signer: &Address) -> Option<u64> {
        self.recents
            .iter()
            .find(|(_, recent)| *recent == signer)
            .map(|(number, _)| *number)
    }

    /// Votes needed to pass a proposal. Also the width of the spam window.
    ///
    /// Not clamped to the signer count: a large enough quorum percentage makes
    /// every proposal unpassable.
    pub fn required_majority(&self) -> u64 {
        (self.signers.len() as u64).saturating_mul(self.quorum_percent) / 100 + 1
    }

    /// Authorized signers in ascending byte order.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers: Vec<Address> = self.signers.iter().copied().collect();
        signers.sort();
        signers
    }

    /// Whether `signer` holds the round-robin slot for block `number`.
    pub fn is_in_turn(&self, number: u64, signer: &Address) -> bool {
        let signers = self.signers();
        match signers.iter().position(|candidate| candidate == signer) {
            Some(offset) => number % signers.len() as u64 == offset as u64,
            None => false,
        }
    }

    /// Creates a new snapshot by replaying `headers` on top of this one.
    ///
    /// Headers must be consecutive and start right after this snapshot's
    /// block. An empty slice yields an unchanged copy.
    pub fn apply(&self, headers: &[BlockHeader], recovery: &dyn SignerRecovery) -> Result<Snapshot> {
        self.replay(headers, recovery, None)
    }

    /// Like [`Snapshot::apply`], but stops between headers once `abort` is set.
    pub fn apply_with_abort(
        &self,
        headers: &[BlockHeader],
        recovery: &dyn SignerRecovery,
        abort: &AtomicBool,
    ) -> Result<Snapshot> {
        self.replay(headers, recovery, Some(abort))
    }

    fn replay(
        &self,
        headers: &[BlockHeader],
        recovery: &dyn SignerRecovery,
        abort: Option<&AtomicBool>,
    ) -> Result<Snapshot> {
        let last = match headers.last() {
            Some(last) => last,
            None => return Ok(self.clone()),
        };
        self.verify_chain(headers)?;

        let mut snap = self.clone();
        let start = Instant::now();
        let mut logged = start;

        for (processed, header) in headers.iter().enumerate() {
            if abort.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                debug!("Voting replay aborted after {} of {} headers", processed, headers.len());
                return Err(ConsensusError::Aborted { processed });
            }
            snap.apply_header(header, recovery)?;

            if logged.elapsed() > PROGRESS_LOG_INTERVAL {
                info!(
                    "Reconstructing voting history: processed {} of {} headers, elapsed {:?}",
                    processed,
                    headers.len(),
                    start.elapsed()
                );
                logged = Instant::now();
            }
        }
        if start.elapsed() > PROGRESS_LOG_INTERVAL {
            info!(
                "Reconstructed voting history: processed {} headers, elapsed {:?}",
                headers.len(),
                start.elapsed()
            );
        }

        snap.number += headers.len() as u64;
        snap.hash = last.hash();
        Ok(snap)
    }

    fn verify_chain(&self, headers: &[BlockHeader]) -> Result<()> {
        let mut expected = self.number.checked_add(1);
        for header in headers {
            match expected {
                Some(next) if next == header.number => expected = next.checked_add(1),
                // Gap, or a header past u64::MAX
                _ => {
                    return Err(ConsensusError::InvalidChain {
                        expected: expected.unwrap_or(u64::MAX),
                        found: header.number,
                    })
                }
            }
        }
        Ok(())
    }

    fn apply_header(&mut self, header: &BlockHeader, recovery: &dyn SignerRecovery) -> Result<()> {
        let number = header.number;

        // Pending votes are discarded on checkpoint blocks
        if number.checked_rem(self.config.epoch) == Some(0) {
            self.votes.clear();
            self.tally.clear();
            self.quorum_votes.clear();
            self.quorum_tally.clear();
        }

        // Let the oldest recent signer seal again
        self.shrink_recents(number);
        let signer_count = self.signers.len() as u64;

        let signer = recovery.recover(header)?;
        if !self.signers.contains(&signer) {
            return Err(ConsensusError::UnauthorizedSigner(signer));
        }
        if self.recents.values().any(|recent| *recent == signer) {
            return Err(ConsensusError::RecentlySigned(signer));
        }
        self.recents.insert(number, signer);

        match VoteKind::from_nonce(&header.nonce) {
            Some(VoteKind::Authorize) => self.apply_signer_vote(signer, header, true),
            Some(VoteKind::Drop) => self.apply_signer_vote(signer, header, false),
            Some(VoteKind::QuorumPercent) => self.apply_quorum_vote(signer, header, signer_count),
            None => return Err(ConsensusError::InvalidVote(header.nonce)),
        }
        Ok(())
    }

    fn apply_signer_vote(&mut self, signer: Address, header: &BlockHeader, authorize: bool) {
        let number = header.number;
        let target = header.coinbase;

        // Only the latest vote of a signer about an account counts
        if let Some(position) = self
            .votes
            .iter()
            .position(|vote| vote.signer == signer && vote.address == target)
        {
            let previous = self.votes.remove(position);
            self.uncast(&previous.address, previous.authorize);
        }

        if self.cast(target, authorize) {
            self.votes.push(Arc::new(Vote {
                signer,
                block: number,
                address: target,
                authorize,
            }));
        }

        let passed = match self.tally.get(&target) {
            Some(tally) if tally.votes >= self.required_majority() => *tally,
            _ => return,
        };

        if passed.authorize {
            self.signers.insert(target);
            info!("Signer {} authorized at block {}", target, number);
        } else {
            self.signers.remove(&target);
            // Window shrinks with the signer set
            self.shrink_recents(number);
            self.purge_votes_cast_by(&target);
            info!("Signer {} deauthorized at block {}", target, number);
        }

        // The matter is settled, drop every other vote about the account
        self.votes.retain(|vote| vote.address != target);
        self.tally.remove(&target);
    }

    fn apply_quorum_vote(&mut self, signer: Address, header: &BlockHeader, signer_count: u64) {
        let number = header.number;
        let target = header.coinbase;
        let percent = header.quorum_proposal();

        self.quorum_cooldowns.clear();

        // One live proposal per signer and value, whatever coinbase carried it
        if let Some(position) = self
            .quorum_votes
            .iter()
            .position(|vote| vote.signer == signer && vote.percent == percent)
        {
            self.quorum_votes.remove(position);
            self.uncast_quorum(percent, true);
        }

        if self.cast_quorum(signer, percent) {
            self.quorum_votes.push(Arc::new(QuorumVote {
                signer,
                block: number,
                address: target,
                percent,
                authorize: true,
            }));
        }

        let passed = self
            .quorum_tally
            .get(&percent)
            .map_or(false, |tally| tally.votes >= self.required_majority());
        if !passed {
            return;
        }

        let previous = self.quorum_percent;
        self.quorum_percent = percent;
        self.quorum_votes.retain(|vote| vote.percent != percent);
        self.quorum_tally.remove(&percent);
        self.quorum_cooldowns.insert(
            percent,
            QuorumCooldown {
                block: number.saturating_add(signer_count),
            },
        );
        info!(
            "Quorum percentage changed from {} to {} at block {}",
            previous, percent, number
        );
    }

    /// Whether casting the vote changes anything: authorize a non-signer or
    /// drop a signer.
    fn valid_vote(&self, address: &Address, authorize: bool) -> bool {
        self.signers.contains(address) != authorize
    }

    fn cast(&mut self, address: Address, authorize: bool) -> bool {
        if !self.valid_vote(&address, authorize) {
            return false;
        }
        self.tally
            .entry(address)
            .or_insert(Tally { authorize, votes: 0 })
            .votes += 1;
        true
    }

    fn uncast(&mut self, address: &Address, authorize: bool) -> bool {
        let tally = match self.tally.get_mut(address) {
            Some(tally) => tally,
            // Dangling vote, nothing to revert
            None => return false,
        };
        if tally.authorize != authorize {
            return false;
        }
        if tally.votes > 1 {
            tally.votes -= 1;
        } else {
            self.tally.remove(address);
        }
        true
    }

    fn valid_quorum_vote(&self, percent: u64, authorize: bool) -> bool {
        authorize && self.quorum_percent != percent
    }

    fn cast_quorum(&mut self, signer: Address, percent: u64) -> bool {
        if !self.valid_quorum_vote(percent, true) {
            return false;
        }
        let tally = self.quorum_tally.entry(percent).or_insert(QuorumTally {
            authorize: true,
            votes: 0,
            signer,
        });
        tally.votes += 1;
        tally.signer = signer;
        true
    }

    fn uncast_quorum(&mut self, percent: u64, authorize: bool) -> bool {
        let tally = match self.quorum_tally.get_mut(&percent) {
            Some(tally) => tally,
            None => return false,
        };
        if tally.authorize != authorize {
            return false;
        }
        if tally.votes > 1 {
            tally.votes -= 1;
        } else {
            self.quorum_tally.remove(&percent);
        }
        true
    }

    /// Drops every vote cast by `signer` and reverts its tally contribution.
    fn purge_votes_cast_by(&mut self, signer: &Address) {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.votes)
            .into_iter()
            .partition(|vote| vote.signer == *signer);
        self.votes = kept;
        for vote in removed {
            self.uncast(&vote.address, vote.authorize);
        }
    }

    fn shrink_recents(&mut self, number: u64) {
        let limit = self.required_majority();
        let size = self.recents.len() as u64;
        if number < limit || size < limit {
            return;
        }
        for i in 0..(size - limit + 1) {
            if let Some(block) = number.checked_sub(limit.saturating_add(i)) {
                self.recents.remove(&block);
            }
        }
    }
}
