//! Access grant repository.

use crate::error::MetadataResult;
use crate::models::AccessGrantRow;
use async_trait::async_trait;
use sharegate_core::GrantOptions;
use time::OffsetDateTime;
use uuid::Uuid;

#[async_trait]
pub trait GrantRepo: Send + Sync {
    /// Create the grant or overlay the supplied fields on the existing one.
    async fn upsert_grant(
        &self,
        recipient_id: Uuid,
        share_id: Uuid,
        options: &GrantOptions,
        now: OffsetDateTime,
    ) -> MetadataResult<AccessGrantRow>;

    /// Overlay the supplied fields on an existing grant; `None` if there is none.
    async fn update_grant(
        &self,
        recipient_id: Uuid,
        share_id: Uuid,
        options: &GrantOptions,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<AccessGrantRow>>;

    /// Delete a grant. Returns whether a row existed.
    async fn delete_grant(&self, recipient_id: Uuid, share_id: Uuid) -> MetadataResult<bool>;

    /// Replace all grants of the recipient with default grants on `share_ids`.
    ///
    /// Runs in one transaction; any failure leaves the previous grants intact.
    async fn replace_grants(
        &self,
        recipient_id: Uuid,
        share_ids: &[Uuid],
        granted_by: Option<&str>,
        now: OffsetDateTime,
    ) -> MetadataResult<u64>;

    async fn get_grant(
        &self,
        recipient_id: Uuid,
        share_id: Uuid,
    ) -> MetadataResult<Option<AccessGrantRow>>;

    async fn list_grants_for_recipient(
        &self,
        recipient_id: Uuid,
    ) -> MetadataResult<Vec<AccessGrantRow>>;
}
