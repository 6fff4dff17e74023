//! Share, schema and table catalog repository.

use crate::error::MetadataResult;
use crate::models::{SchemaRow, ShareRow, TableEntryRow, TableRow};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ShareRepo: Send + Sync {
    /// Create a share. Fails with `AlreadyExists` on a duplicate name.
    async fn create_share(&self, share: &ShareRow) -> MetadataResult<()>;

    async fn get_share(&self, share_id: Uuid) -> MetadataResult<Option<ShareRow>>;

    async fn get_share_by_name(&self, name: &str) -> MetadataResult<Option<ShareRow>>;

    /// All shares ordered by name.
    async fn list_shares(&self) -> MetadataResult<Vec<ShareRow>>;

    async fn create_schema(&self, schema: &SchemaRow) -> MetadataResult<()>;

    async fn get_schema(&self, share_id: Uuid, name: &str) -> MetadataResult<Option<SchemaRow>>;

    async fn list_schemas(&self, share_id: Uuid) -> MetadataResult<Vec<SchemaRow>>;

    async fn create_table(&self, table: &TableRow) -> MetadataResult<()>;

    /// Tables of a share, optionally limited to one schema.
    async fn list_tables(
        &self,
        share_id: Uuid,
        schema: Option<&str>,
    ) -> MetadataResult<Vec<TableEntryRow>>;

    /// Look up one table by schema and table name.
    async fn resolve_table(
        &self,
        share_id: Uuid,
        schema: &str,
        table: &str,
    ) -> MetadataResult<Option<TableEntryRow>>;
}
