//! Local table access for standalone mode.

pub mod delta;
pub mod rows;

pub use delta::DeltaLogReader;

use async_trait::async_trait;
use sharegate_core::protocol::{
    ChangeFile, ChangeKind, ChangeRange, Metadata, Protocol, QueryRequest, QueryResponse,
    QueryWindow, RowPage, TableMetadata, TableStats,
};

/// Table reader errors.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("table not found: {0}")]
    NotFound(String),

    #[error("invalid transaction log: {0}")]
    InvalidLog(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported location: {0}")]
    Unsupported(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReaderResult<T> = std::result::Result<T, ReaderError>;

/// One entry of a table's change data feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    pub file: ChangeFile,
}

/// Change data feed of a version range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet {
    pub protocol: Protocol,
    pub metadata: Metadata,
    pub entries: Vec<ChangeEntry>,
}

/// Read access to tables stored at a location.
#[async_trait]
pub trait TableReader: Send + Sync {
    /// Protocol, metadata and columns of the latest snapshot.
    async fn get_metadata(&self, location: &str) -> ReaderResult<TableMetadata>;

    /// Decoded rows of the latest snapshot, cut to `window`.
    async fn query(&self, location: &str, window: QueryWindow) -> ReaderResult<RowPage>;

    /// Data files of a snapshot selected by version or timestamp.
    async fn get_files(&self, location: &str, request: &QueryRequest)
    -> ReaderResult<QueryResponse>;

    /// Change data feed between two versions or timestamps.
    async fn get_changes(&self, location: &str, range: &ChangeRange) -> ReaderResult<ChangeSet>;

    async fn get_stats(&self, location: &str) -> ReaderResult<TableStats>;

    /// Latest committed version.
    async fn version(&self, location: &str) -> ReaderResult<i64>;
}
