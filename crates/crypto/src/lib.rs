//! Secret handling for sharegate.
//!
//! This crate provides:
//! - bcrypt hashing and verification of recipient bearer tokens
//! - Bearer token generation
//! - Passphrase-keyed ChaCha20-Poly1305 encryption of stored secrets

pub mod cipher;
pub mod error;
pub mod hash;
pub mod token;

pub use cipher::SecretCipher;
pub use error::{CryptoError, CryptoResult};
pub use hash::{DEFAULT_HASH_COST, hash_secret, verify_secret};
pub use token::{TOKEN_SECRET_BYTES, generate_token_secret};
