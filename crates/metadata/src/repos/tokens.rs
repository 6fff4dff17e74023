//! Recipient token repository.

use crate::error::MetadataResult;
use crate::models::RecipientTokenRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for recipient bearer tokens.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Insert a token row.
    async fn create_token(&self, token: &RecipientTokenRow) -> MetadataResult<()>;

    /// Get a token by ID.
    async fn get_token(&self, token_id: Uuid) -> MetadataResult<Option<RecipientTokenRow>>;

    /// All rows flagged active. Expiry is not applied.
    async fn list_active_tokens(&self) -> MetadataResult<Vec<RecipientTokenRow>>;

    /// All rows of a recipient, newest first.
    async fn list_tokens_for_recipient(
        &self,
        recipient_id: Uuid,
    ) -> MetadataResult<Vec<RecipientTokenRow>>;

    /// Deactivate every token of the recipient and insert `token`, atomically.
    ///
    /// Returns the number of rows deactivated.
    async fn rotate_token(&self, token: &RecipientTokenRow) -> MetadataResult<u64>;

    /// Flip a token to inactive.
    async fn deactivate_token(&self, token_id: Uuid) -> MetadataResult<()>;

    /// Update last used time.
    async fn touch_token(&self, token_id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()>;
}
