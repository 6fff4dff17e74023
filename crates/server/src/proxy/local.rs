//! Requests served from local storage through a [`TableReader`].

use super::ProxyResult;
use crate::reader::TableReader;
use sharegate_core::protocol::{
    ChangeAction, ChangeRange, ChangesResponse, QueryRequest, QueryResponse, QueryWindow, RowPage,
    TableMetadata, TableStats,
};

pub async fn metadata(reader: &dyn TableReader, location: &str) -> ProxyResult<TableMetadata> {
    Ok(reader.get_metadata(location).await?)
}

pub async fn query(
    reader: &dyn TableReader,
    location: &str,
    window: QueryWindow,
) -> ProxyResult<RowPage> {
    Ok(reader.query(location, window).await?)
}

pub async fn files(
    reader: &dyn TableReader,
    location: &str,
    request: &QueryRequest,
) -> ProxyResult<QueryResponse> {
    Ok(reader.get_files(location, request).await?)
}

/// Change data feed re-wrapped into add/remove/cdf actions.
pub async fn changes(
    reader: &dyn TableReader,
    location: &str,
    range: &ChangeRange,
) -> ProxyResult<ChangesResponse> {
    let changes = reader.get_changes(location, range).await?;
    Ok(ChangesResponse {
        protocol: changes.protocol,
        metadata: Some(changes.metadata),
        actions: changes
            .entries
            .into_iter()
            .map(|entry| ChangeAction::from_kind(entry.kind, entry.file))
            .collect(),
    })
}

pub async fn version(reader: &dyn TableReader, location: &str) -> ProxyResult<i64> {
    Ok(reader.version(location).await?)
}

pub async fn stats(reader: &dyn TableReader, location: &str) -> ProxyResult<TableStats> {
    Ok(reader.get_stats(location).await?)
}
