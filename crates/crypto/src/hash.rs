//! bcrypt hashing of bearer secrets.
//!
//! bcrypt is CPU bound, so both operations run on the blocking thread pool.

use crate::error::{CryptoError, CryptoResult};

/// Default bcrypt work factor.
pub const DEFAULT_HASH_COST: u32 = 10;

/// Hash a secret with a random salt.
pub async fn hash_secret(plaintext: &str, cost: u32) -> CryptoResult<String> {
    let plaintext = plaintext.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::hash(plaintext, cost).map_err(|e| CryptoError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| CryptoError::Hashing(format!("task join error: {e}")))?
}

/// Verify a secret against a stored hash.
///
/// A malformed hash never matches.
pub async fn verify_secret(plaintext: &str, hash: &str) -> CryptoResult<bool> {
    let plaintext = plaintext.to_string();
    let hash = hash.to_string();

    tokio::task::spawn_blocking(move || match bcrypt::verify(plaintext, &hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!(error = %e, "Stored hash could not be parsed");
            false
        }
    })
    .await
    .map_err(|e| CryptoError::Hashing(format!("task join error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_secret("correct horse", TEST_COST).await.unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_secret("correct horse", &hash).await.unwrap());
        assert!(!verify_secret("correct horsf", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let a = hash_secret("same", TEST_COST).await.unwrap();
        let b = hash_secret("same", TEST_COST).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_false() {
        assert!(!verify_secret("anything", "not-a-bcrypt-hash").await.unwrap());
        assert!(!verify_secret("anything", "").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_cost_is_error() {
        assert!(hash_secret("x", 2).await.is_err());
    }
}
