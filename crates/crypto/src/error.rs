//! Crypto error types.

use thiserror::Error;

/// Hashing and secret encryption errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("hashing error: {0}")]
    Hashing(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    /// The stored blob is malformed, was produced with another passphrase,
    /// or was tampered with.
    #[error("decryption error: {0}")]
    Decryption(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
