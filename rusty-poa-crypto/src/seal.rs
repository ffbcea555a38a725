//! Recovering the signer of a sealed header.

use ed25519_dalek::{PublicKey, Signature, Verifier};
use rusty_poa_types::{Address, BlockHeader};

use crate::error::CryptoError;
use crate::keypair::{address_from_public_key, SEAL_LENGTH};

/// Verifies the header's seal and returns the account that produced it.
pub fn recover_seal_signer(header: &BlockHeader) -> Result<Address, CryptoError> {
    if header.seal.len() != SEAL_LENGTH {
        return Err(CryptoError::InvalidSealLength {
            expected: SEAL_LENGTH,
            found: header.seal.len(),
        });
    }
    let (key_bytes, signature_bytes) = header.seal.split_at(32);

    let public_key = PublicKey::from_bytes(key_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let signature = Signature::try_from(signature_bytes)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    public_key
        .verify(&header.seal_hash(), &signature)
        .map_err(|_| CryptoError::SignatureMismatch(hex::encode(header.hash())))?;

    Ok(address_from_public_key(&public_key))
}
