//! Recipient repository.

use crate::error::MetadataResult;
use crate::models::RecipientRow;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait RecipientRepo: Send + Sync {
    /// Create a recipient. Fails with `AlreadyExists` on a duplicate name.
    async fn create_recipient(&self, recipient: &RecipientRow) -> MetadataResult<()>;

    async fn get_recipient(&self, recipient_id: Uuid) -> MetadataResult<Option<RecipientRow>>;

    async fn get_recipient_by_name(&self, name: &str) -> MetadataResult<Option<RecipientRow>>;

    async fn list_recipients(&self) -> MetadataResult<Vec<RecipientRow>>;

    /// Delete a recipient; tokens and grants go with it.
    async fn delete_recipient(&self, recipient_id: Uuid) -> MetadataResult<bool>;
}
