//! Service account credential repository.

use crate::error::MetadataResult;
use crate::models::ServiceAccountRow;
use async_trait::async_trait;

#[async_trait]
pub trait ServiceAccountRepo: Send + Sync {
    /// The stored encrypted credential, if one was provisioned.
    async fn get_service_account(&self) -> MetadataResult<Option<ServiceAccountRow>>;

    /// Insert or replace the singleton row.
    async fn put_service_account(&self, row: &ServiceAccountRow) -> MetadataResult<()>;
}
