//! Metadata store test utilities.

use sharegate_core::RecipientId;
use sharegate_metadata::models::{RecipientRow, SchemaRow, ShareRow, TableRow};
use sharegate_metadata::{MetadataResult, MetadataStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A test metadata store wrapper that cleans up on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMetadata {
    /// Create a new SQLite store in a temporary directory.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStore::new(&db_path).await?;

        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    /// Get a reference to the metadata store.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}

/// Insert a regular recipient.
#[allow(dead_code)]
pub async fn create_recipient(store: &Arc<dyn MetadataStore>, name: &str) -> RecipientId {
    let row = RecipientRow {
        recipient_id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        is_system: false,
        created_at: OffsetDateTime::now_utc(),
    };
    store
        .create_recipient(&row)
        .await
        .expect("Failed to create recipient");
    RecipientId::from(row.recipient_id)
}

/// Insert a share.
#[allow(dead_code)]
pub async fn create_share(store: &Arc<dyn MetadataStore>, name: &str) -> ShareRow {
    let row = ShareRow {
        share_id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        created_at: OffsetDateTime::now_utc(),
    };
    store.create_share(&row).await.expect("Failed to create share");
    row
}

/// Insert a schema and a table at `location` inside `share`.
#[allow(dead_code)]
pub async fn register_table(
    store: &Arc<dyn MetadataStore>,
    share: &ShareRow,
    schema: &str,
    table: &str,
    location: &str,
) {
    let schema_row = match store
        .get_schema(share.share_id, schema)
        .await
        .expect("Failed to look up schema")
    {
        Some(row) => row,
        None => {
            let row = SchemaRow {
                schema_id: Uuid::new_v4(),
                share_id: share.share_id,
                name: schema.to_string(),
                created_at: OffsetDateTime::now_utc(),
            };
            store
                .create_schema(&row)
                .await
                .expect("Failed to create schema");
            row
        }
    };

    let table_row = TableRow {
        table_id: Uuid::new_v4(),
        schema_id: schema_row.schema_id,
        name: table.to_string(),
        location: location.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    store
        .create_table(&table_row)
        .await
        .expect("Failed to create table");
}
