//! Metadata store abstraction and SQLite implementation for sharegate.
//!
//! This crate provides the control-plane data model:
//! - Recipients and their hashed bearer tokens
//! - Shares, schemas and tables
//! - Access grants between recipients and shares
//! - The encrypted service account credential

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use sharegate_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
