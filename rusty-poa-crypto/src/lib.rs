//! Cryptographic primitives for the Rusty PoA signer engine.

pub mod cache;
pub mod error;
pub mod keypair;
pub mod seal;

pub use cache::{SignatureCache, DEFAULT_SIGNATURE_CACHE_SIZE};
pub use error::CryptoError;
pub use keypair::{address_from_public_key, SealKeyPair, SEAL_LENGTH};
pub use seal::recover_seal_signer;
