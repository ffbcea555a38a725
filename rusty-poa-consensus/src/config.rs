//! Engine parameters for signer voting and snapshot checkpointing.

use rusty_poa_types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, Result};

/// Blocks after which pending votes are discarded.
pub const DEFAULT_EPOCH: u64 = 30_000;
/// Blocks between persisted snapshots.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 1024;
/// Recent snapshots kept in memory by the manager.
pub const DEFAULT_INMEMORY_SNAPSHOTS: usize = 128;
/// Starting quorum percentage of a genesis snapshot.
pub const DEFAULT_QUORUM_PERCENT: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoaConfig {
    /// Checkpoint interval at which pending votes are cleared
    pub epoch: u64,
    /// How often the snapshot manager persists a snapshot
    pub checkpoint_interval: u64,
    /// Capacity of the manager's in-memory snapshot cache
    pub inmemory_snapshots: usize,
    /// Capacity of the shared signature cache
    pub signature_cache_size: usize,
    /// Quorum percentage a genesis snapshot starts with
    pub quorum_percent: u64,
    /// Genesis signer set
    pub signers: Vec<Address>,
}

impl Default for PoaConfig {
    fn default() -> Self {
        PoaConfig {
            epoch: DEFAULT_EPOCH,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            inmemory_snapshots: DEFAULT_INMEMORY_SNAPSHOTS,
            signature_cache_size: rusty_poa_crypto::DEFAULT_SIGNATURE_CACHE_SIZE,
            quorum_percent: DEFAULT_QUORUM_PERCENT,
            signers: Vec::new(),
        }
    }
}

impl PoaConfig {
    /// Default parameters with the given genesis signers.
    pub fn with_signers(signers: Vec<Address>) -> Self {
        PoaConfig {
            signers,
            ..PoaConfig::default()
        }
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: PoaConfig =
            toml::from_str(source).map_err(|e| ConsensusError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epoch == 0 {
            return Err(ConsensusError::InvalidConfig("epoch must be non-zero".to_string()));
        }
        if self.checkpoint_interval == 0 {
            return Err(ConsensusError::InvalidConfig(
                "checkpoint_interval must be non-zero".to_string(),
            ));
        }
        if self.inmemory_snapshots == 0 || self.signature_cache_size == 0 {
            return Err(ConsensusError::InvalidConfig("cache sizes must be non-zero".to_string()));
        }
        if !(1..=100).contains(&self.quorum_percent) {
            return Err(ConsensusError::InvalidConfig(format!(
                "quorum_percent must be within 1..=100, got {}",
                self.quorum_percent
            )));
        }
        if self.signers.is_empty() {
            return Err(ConsensusError::InvalidConfig(
                "at least one genesis signer is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_with_defaults() {
        let config = PoaConfig::from_toml(
            r#"
            epoch = 100
            signers = ["0x0000000000000000000000000000000000000001"]
            "#,
        )
        .unwrap();
        assert_eq!(config.epoch, 100);
        assert_eq!(config.quorum_percent, DEFAULT_QUORUM_PERCENT);
        assert_eq!(config.checkpoint_interval, DEFAULT_CHECKPOINT_INTERVAL);
        assert_eq!(config.signers, vec![Address::from_low_u64(1)]);
    }

    #[test]
    fn test_validation() {
        let mut config = PoaConfig::with_signers(vec![Address::from_low_u64(1)]);
        assert!(config.validate().is_ok());

        config.epoch = 0;
        assert!(matches!(config.validate(), Err(ConsensusError::InvalidConfig(_))));

        let config = PoaConfig::default();
        assert!(matches!(config.validate(), Err(ConsensusError::InvalidConfig(_))));

        assert!(PoaConfig::from_toml("epoch = \"soon\"").is_err());
    }

    #[test]
    fn test_quorum_percent_range() {
        let mut config = PoaConfig::with_signers(vec![Address::from_low_u64(1)]);
        for percent in [1, 67, 100] {
            config.quorum_percent = percent;
            assert!(config.validate().is_ok());
        }
        for percent in [0, 101, u64::MAX] {
            config.quorum_percent = percent;
            assert!(matches!(config.validate(), Err(ConsensusError::InvalidConfig(_))));
        }

        let parsed = PoaConfig::from_toml(
            r#"
            quorum_percent = 150
            signers = ["0x0000000000000000000000000000000000000001"]
            "#,
        );
        assert!(matches!(parsed, Err(ConsensusError::InvalidConfig(_))));
    }
}
