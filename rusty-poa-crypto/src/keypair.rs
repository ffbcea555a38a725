//! Seal key pairs for block signers.

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};
use rand::rngs::OsRng;
use rusty_poa_types::{Address, BlockHeader, ADDRESS_LENGTH};

use crate::error::CryptoError;

/// Length of a seal: public key followed by signature.
pub const SEAL_LENGTH: usize = 32 + 64;

/// Derives the account identifier owning a seal public key.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let digest = blake3::hash(public_key.as_bytes());
    let mut raw = [0u8; ADDRESS_LENGTH];
    raw.copy_from_slice(&digest.as_bytes()[..ADDRESS_LENGTH]);
    Address(raw)
}

/// An ed25519 key pair that seals block headers.
pub struct SealKeyPair {
    keypair: Keypair,
}

impl SealKeyPair {
    /// Generates a new random key pair.
    pub fn generate() -> Self {
        let mut csprng = OsRng {};
        let keypair = Keypair::generate(&mut csprng);
        SealKeyPair { keypair }
    }

    /// Builds a key pair deterministically from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_bytes(&seed)
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;
        let public = PublicKey::from(&secret);
        Ok(SealKeyPair {
            keypair: Keypair { secret, public },
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.keypair.public)
    }

    /// Signs the header's seal hash and stores `public_key || signature` in
    /// its seal, replacing any previous seal.
    pub fn seal(&self, header: &mut BlockHeader) {
        let signature = self.keypair.sign(&header.seal_hash());
        let mut seal = Vec::with_capacity(SEAL_LENGTH);
        seal.extend_from_slice(self.keypair.public.as_bytes());
        seal.extend_from_slice(&signature.to_bytes());
        header.seal = seal;
    }
}
