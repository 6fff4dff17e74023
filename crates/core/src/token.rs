//! Recipient identities and bearer credential types.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of leading secret characters kept as a non-secret hint.
pub const TOKEN_HINT_LEN: usize = 8;

/// Version of the credential profile file format handed to recipients.
pub const SHARE_CREDENTIALS_VERSION: u32 = 1;

/// Unique identifier for a stored recipient token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(Uuid);

impl TokenId {
    /// Generate a new random token ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidToken(format!("invalid token ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TokenId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a recipient.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(Uuid);

impl RecipientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidArgument(format!("invalid recipient ID: {e}")))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecipientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecipientId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientId({})", self.0)
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the display hint for a bearer secret.
///
/// The hint only narrows which stored hashes are checked first; it never
/// authorizes anything on its own.
pub fn token_hint(secret: &str) -> String {
    secret.chars().take(TOKEN_HINT_LEN).collect()
}

/// A freshly issued bearer credential. The secret is only available here.
#[derive(Clone)]
pub struct IssuedCredential {
    pub token_id: TokenId,
    pub recipient_id: RecipientId,
    pub secret: String,
    pub hint: String,
    pub expires_at: Option<OffsetDateTime>,
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("token_id", &self.token_id)
            .field("recipient_id", &self.recipient_id)
            .field("secret", &"[REDACTED]")
            .field("hint", &self.hint)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The recipient a presented bearer secret resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedRecipient {
    pub recipient_id: RecipientId,
    pub token_id: TokenId,
}

/// Profile payload a recipient loads into a Delta Sharing client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProfile {
    pub share_credentials_version: u32,
    pub endpoint: String,
    pub bearer_token: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_time: Option<OffsetDateTime>,
}

impl CredentialProfile {
    /// Build the profile for an issued credential.
    pub fn for_credential(endpoint: impl Into<String>, issued: &IssuedCredential) -> Self {
        Self {
            share_credentials_version: SHARE_CREDENTIALS_VERSION,
            endpoint: endpoint.into(),
            bearer_token: issued.secret.clone(),
            expiration_time: issued.expires_at,
        }
    }
}
