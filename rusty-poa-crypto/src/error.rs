use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid seal length: expected {expected} bytes, got {found}")]
    InvalidSealLength { expected: usize, found: usize },
    #[error("Invalid seal public key: {0}")]
    InvalidPublicKey(String),
    #[error("Malformed seal signature: {0}")]
    MalformedSignature(String),
    #[error("Seal signature does not verify for header {0}")]
    SignatureMismatch(String),
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),
}
