//! Core domain types and wire formats for sharegate.
//!
//! This crate defines the data model shared by the other crates:
//! - Recipient and token identifiers, credential profiles
//! - Access grant options and authorization outcomes
//! - Share and table references
//! - Delta Sharing protocol actions and NDJSON codec
//! - Application configuration

pub mod config;
pub mod error;
pub mod grant;
pub mod protocol;
pub mod table;
pub mod token;

pub use error::{Error, Result};
pub use grant::{Authorization, DenyReason, GrantAction, GrantOptions, GrantSettings, Patch};
pub use table::{ShareRef, TableRef};
pub use token::{
    CredentialProfile, IssuedCredential, RecipientId, TOKEN_HINT_LEN, TokenId,
    ValidatedRecipient, token_hint,
};
