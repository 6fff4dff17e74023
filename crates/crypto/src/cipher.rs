//! Passphrase-keyed authenticated encryption for stored secrets.
//!
//! Blob format: `base64(nonce):base64(tag):base64(ciphertext)` with a 96-bit
//! random nonce and a 128-bit Poly1305 tag. The key is derived once per
//! cipher with PBKDF2-HMAC-SHA256 over a fixed application salt.

use crate::error::{CryptoError, CryptoResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

const KEY_SALT: &[u8] = b"sharegate.service-account.v1";
const KEY_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypts and decrypts secrets under a passphrase-derived key.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; KEY_LEN],
}

impl SecretCipher {
    /// Derive the key from a passphrase.
    pub fn new(passphrase: &str) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KEY_SALT, KEY_ITERATIONS, &mut key);
        Self { key }
    }

    fn aead(&self) -> CryptoResult<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(format!("invalid key: {e}")))
    }

    /// Encrypt a UTF-8 secret with a fresh nonce.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .aead()?
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        // the AEAD output is ciphertext || tag
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        Ok(format!(
            "{}:{}:{}",
            STANDARD.encode(nonce_bytes),
            STANDARD.encode(tag),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Decrypt a blob produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, blob: &str) -> CryptoResult<String> {
        let parts: Vec<&str> = blob.split(':').collect();
        let [nonce_b64, tag_b64, ciphertext_b64] = parts.as_slice() else {
            return Err(CryptoError::Decryption(format!(
                "expected 3 colon-separated parts, got {}",
                parts.len()
            )));
        };

        let nonce_bytes = decode_part("nonce", nonce_b64)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Decryption(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce_bytes.len()
            )));
        }
        let tag = decode_part("tag", tag_b64)?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::Decryption(format!(
                "tag must be {TAG_LEN} bytes, got {}",
                tag.len()
            )));
        }
        let mut sealed = decode_part("ciphertext", ciphertext_b64)?;
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .aead()
            .map_err(|e| CryptoError::Decryption(e.to_string()))?
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_slice())
            .map_err(|_| CryptoError::Decryption("authentication tag mismatch".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
    }
}

fn decode_part(name: &str, value: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::Decryption(format!("invalid base64 {name}: {e}")))
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretCipher([REDACTED])")
    }
}
