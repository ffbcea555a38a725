//! Shared primitive types for the Rusty PoA signer engine.
//!
//! Account identifiers, block hashes and the block header consumed by the
//! snapshot replay live here so that the crypto and consensus crates agree on
//! a single representation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub mod header;

pub use header::{
    BlockHeader, VoteKind, NONCE_AUTH_VOTE, NONCE_DROP_VOTE, NONCE_QUORUM_VOTE,
};

pub type Hash = [u8; 32];

/// Length of an account identifier in bytes.
pub const ADDRESS_LENGTH: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid address length: expected 20 bytes, got {0}")]
    InvalidAddressLength(usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

/// An account identifier permitted (or proposed) to seal blocks.
///
/// Ordering is byte-wise on the raw identifier, which is what turn-taking
/// relies on.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn zero() -> Self {
        Address([0u8; ADDRESS_LENGTH])
    }

    /// Creates an address from a byte slice of exactly [`ADDRESS_LENGTH`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let raw: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidAddressLength(bytes.len()))?;
        Ok(Address(raw))
    }

    /// Parses a hex string, with or without a `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self, TypesError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(trimmed).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Encodes a small integer as a right-aligned big-endian address.
    ///
    /// Quorum percentage proposals travel in the coinbase field this way.
    pub fn from_low_u64(value: u64) -> Self {
        let mut raw = [0u8; ADDRESS_LENGTH];
        raw[ADDRESS_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
        Address(raw)
    }

    /// Interprets the address as a big-endian unsigned integer and keeps the
    /// low 64 bits.
    pub fn low_u64(&self) -> u64 {
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&self.0[ADDRESS_LENGTH - 8..]);
        u64::from_be_bytes(tail)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Serialized as a hex string so addresses can key JSON maps.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Address::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address(hex!("00112233445566778899aabbccddeeff00112233"));
        assert_eq!(addr.to_string(), "0x00112233445566778899aabbccddeeff00112233");
        assert_eq!(Address::from_hex(&addr.to_string()).unwrap(), addr);
        assert_eq!(Address::from_hex("00112233445566778899aabbccddeeff00112233").unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_bad_length() {
        assert_eq!(
            Address::from_slice(&[1u8; 19]),
            Err(TypesError::InvalidAddressLength(19))
        );
        assert!(Address::from_hex("0xzz").is_err());
    }

    #[test]
    fn test_low_u64() {
        assert_eq!(Address::from_low_u64(75).low_u64(), 75);
        assert_eq!(Address::zero().low_u64(), 0);

        // Bytes above the low 64 bits are ignored.
        let mut raw = [0xffu8; ADDRESS_LENGTH];
        raw[ADDRESS_LENGTH - 8..].copy_from_slice(&66u64.to_be_bytes());
        assert_eq!(Address(raw).low_u64(), 66);
    }

    #[test]
    fn test_address_ordering_is_bytewise() {
        let low = Address(hex!("0100000000000000000000000000000000000000"));
        let high = Address(hex!("0200000000000000000000000000000000000000"));
        let tail = Address(hex!("00ffffffffffffffffffffffffffffffffffffff"));
        let mut sorted = vec![high, low, tail];
        sorted.sort();
        assert_eq!(sorted, vec![tail, low, high]);
    }

    #[test]
    fn test_address_as_json_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(Address::from_low_u64(7), 3u32);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::HashMap<Address, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
