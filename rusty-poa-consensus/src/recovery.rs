//! Seam for resolving the account that sealed a header.

use std::num::NonZeroUsize;
use std::sync::Arc;

use rusty_poa_crypto::SignatureCache;
use rusty_poa_types::{Address, BlockHeader};

use crate::error::{ConsensusError, Result};

/// Resolves the signer of a header. Must be deterministic per header.
pub trait SignerRecovery: Send + Sync {
    fn recover(&self, header: &BlockHeader) -> Result<Address>;
}

/// Recovers ed25519 seals, memoizing results in a shared [`SignatureCache`].
#[derive(Clone)]
pub struct SealRecoverer {
    cache: Arc<SignatureCache>,
}

impl SealRecoverer {
    pub fn new(cache: Arc<SignatureCache>) -> Self {
        SealRecoverer { cache }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            ConsensusError::InvalidConfig("signature cache capacity must be non-zero".to_string())
        })?;
        Ok(SealRecoverer::new(Arc::new(SignatureCache::new(capacity))))
    }

    pub fn cache(&self) -> &Arc<SignatureCache> {
        &self.cache
    }
}

impl SignerRecovery for SealRecoverer {
    fn recover(&self, header: &BlockHeader) -> Result<Address> {
        Ok(self.cache.recover(header)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_poa_crypto::SealKeyPair;
    use rusty_poa_types::NONCE_DROP_VOTE;

    #[test]
    fn test_seal_recoverer_shares_cache() {
        let recoverer = SealRecoverer::with_capacity(8).unwrap();
        let other = recoverer.clone();

        let key = SealKeyPair::from_seed([9; 32]).unwrap();
        let mut header = BlockHeader::new([0; 32], 4, Address::zero(), NONCE_DROP_VOTE);
        key.seal(&mut header);

        assert_eq!(recoverer.recover(&header).unwrap(), key.address());
        assert_eq!(other.cache().get(&header.hash()), Some(key.address()));
    }

    #[test]
    fn test_unsealed_header_fails() {
        let recoverer = SealRecoverer::with_capacity(8).unwrap();
        let header = BlockHeader::new([0; 32], 4, Address::zero(), NONCE_DROP_VOTE);
        assert!(matches!(
            recoverer.recover(&header),
            Err(ConsensusError::SignatureRecovery(_))
        ));
        assert!(SealRecoverer::with_capacity(0).is_err());
    }
}
