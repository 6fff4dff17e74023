//! Database models mapping to the metadata schema.

use sharegate_core::GrantSettings;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Recipients and tokens
// =============================================================================

/// A recipient identity. `is_system` marks the internal service account.
#[derive(Debug, Clone, FromRow)]
pub struct RecipientRow {
    pub recipient_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: OffsetDateTime,
}

/// A stored bearer credential. Only the bcrypt hash and the hint are kept.
#[derive(Debug, Clone, FromRow)]
pub struct RecipientTokenRow {
    pub token_id: Uuid,
    pub recipient_id: Uuid,
    pub token_hash: String,
    pub token_hint: String,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub active: bool,
    pub last_used_at: Option<OffsetDateTime>,
}

impl RecipientTokenRow {
    /// Active and not past its expiry.
    pub fn is_usable(&self, now: OffsetDateTime) -> bool {
        self.active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct ShareRow {
    pub share_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct SchemaRow {
    pub schema_id: Uuid,
    pub share_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct TableRow {
    pub table_id: Uuid,
    pub schema_id: Uuid,
    pub name: String,
    /// Storage location of the Delta table (local path or `file://` URL).
    pub location: String,
    pub created_at: OffsetDateTime,
}

/// A table joined with its schema and share.
#[derive(Debug, Clone, FromRow)]
pub struct TableEntryRow {
    pub table_id: Uuid,
    pub share_id: Uuid,
    pub share_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub location: String,
}

// =============================================================================
// Access grants
// =============================================================================

/// Authorization edge between one recipient and one share.
#[derive(Debug, Clone, FromRow)]
pub struct AccessGrantRow {
    pub grant_id: Uuid,
    pub recipient_id: Uuid,
    pub share_id: Uuid,
    pub granted_by: Option<String>,
    pub granted_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub can_download: bool,
    pub can_query: bool,
    pub max_rows_per_query: Option<i64>,
    pub updated_at: OffsetDateTime,
}

impl AccessGrantRow {
    pub fn settings(&self) -> GrantSettings {
        GrantSettings {
            granted_by: self.granted_by.clone(),
            expires_at: self.expires_at,
            can_download: self.can_download,
            can_query: self.can_query,
            max_rows_per_query: self.max_rows_per_query,
        }
    }
}

// =============================================================================
// Service account
// =============================================================================

/// Singleton key of the service account row.
pub const SERVICE_ACCOUNT_KEY: &str = "system";

/// Encrypted service account credential.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceAccountRow {
    pub account_key: String,
    /// `nonce:tag:ciphertext`, never the plaintext.
    pub ciphertext: String,
    pub recipient_id: Uuid,
    pub updated_at: OffsetDateTime,
}
