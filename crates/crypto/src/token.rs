//! Bearer token generation.

use base64::Engine;
use rand::RngCore;

/// Random bytes in a bearer secret (256 bits).
pub const TOKEN_SECRET_BYTES: usize = 32;

/// Generate a random bearer secret, URL-safe base64 without padding.
pub fn generate_token_secret() -> String {
    let mut bytes = [0u8; TOKEN_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_shape() {
        let secret = generate_token_secret();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(secret.len(), 43);
        assert!(
            secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_secrets_are_unique() {
        assert_ne!(generate_token_secret(), generate_token_secret());
    }
}
