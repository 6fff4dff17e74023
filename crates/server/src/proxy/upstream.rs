//! Requests against an upstream Delta Sharing server.

use super::{ProxyError, ProxyResult, UpstreamConfig};
use crate::metrics;
use crate::reader::rows::{decode_rows, with_partition_values};
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use sharegate_core::protocol::{
    ChangeRange, ChangesResponse, DecodeReport, FileAction, QueryRequest, QueryResponse,
    QueryWindow, RowPage, TableMetadata, TableStats, decode_action_stream, decode_change_stream,
    parse_schema_columns,
};
use url::Url;

/// Response header carrying the table version.
pub const TABLE_VERSION_HEADER: &str = "delta-table-version";

/// Upstream names of a table.
#[derive(Clone, Copy, Debug)]
pub struct UpstreamTable<'a> {
    pub share: &'a str,
    pub schema: &'a str,
    pub table: &'a str,
}

fn table_url(endpoint: &Url, table: &UpstreamTable<'_>, action: &str) -> ProxyResult<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| {
            ProxyError::InvalidArgument(format!("upstream endpoint {endpoint} cannot be a base URL"))
        })?
        .pop_if_empty()
        .extend([
            "shares",
            table.share,
            "schemas",
            table.schema,
            "tables",
            table.table,
            action,
        ]);
    Ok(url)
}

/// Send a request and turn non-success statuses into `UpstreamProtocolError`.
async fn send(endpoint: &'static str, request: RequestBuilder) -> ProxyResult<Response> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_upstream_request(endpoint, None);
            tracing::warn!(endpoint, error = %e, "Upstream request failed");
            return Err(e.into());
        }
    };

    let status = response.status();
    metrics::record_upstream_request(endpoint, Some(status.as_u16()));
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(endpoint, status = status.as_u16(), "Upstream returned an error status");
        return Err(ProxyError::upstream_status(status.as_u16(), body));
    }
    Ok(response)
}

fn version_header(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(TABLE_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn record_skips(endpoint: &str, report: &DecodeReport) {
    if report.skipped > 0 {
        metrics::NDJSON_LINES_SKIPPED.inc_by(report.skipped as u64);
        tracing::warn!(
            endpoint,
            lines = report.lines,
            skipped = report.skipped,
            "Upstream response contained malformed lines"
        );
    }
}

/// `GET .../metadata`
pub async fn fetch_metadata(
    client: &Client,
    upstream: &UpstreamConfig,
    token: &str,
    table: &UpstreamTable<'_>,
) -> ProxyResult<TableMetadata> {
    let url = table_url(&upstream.endpoint, table, "metadata")?;
    let response = send("metadata", client.get(url).bearer_auth(token)).await?;
    let version = version_header(response.headers());
    let body = response.text().await?;

    let decoded = decode_action_stream(&body)?;
    record_skips("metadata", &decoded.report);
    let metadata = decoded.value.metadata.ok_or_else(|| {
        ProxyError::UpstreamDecode("metadata response has no metaData line".to_string())
    })?;
    let columns = parse_schema_columns(&metadata.schema_string)?;

    Ok(TableMetadata {
        protocol: decoded.value.protocol,
        columns,
        version: version.or(metadata.version),
        metadata,
    })
}

/// `POST .../query`
pub async fn fetch_files(
    client: &Client,
    upstream: &UpstreamConfig,
    token: &str,
    table: &UpstreamTable<'_>,
    request: &QueryRequest,
) -> ProxyResult<QueryResponse> {
    let url = table_url(&upstream.endpoint, table, "query")?;
    let body = request.encode()?;
    let response = send(
        "query",
        client
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .body(body),
    )
    .await?;
    let text = response.text().await?;

    let decoded = decode_action_stream(&text)?;
    record_skips("query", &decoded.report);
    Ok(decoded.value)
}

/// `GET .../changes`
pub async fn fetch_changes(
    client: &Client,
    upstream: &UpstreamConfig,
    token: &str,
    table: &UpstreamTable<'_>,
    range: &ChangeRange,
) -> ProxyResult<ChangesResponse> {
    let url = table_url(&upstream.endpoint, table, "changes")?;
    let response = send(
        "changes",
        client
            .get(url)
            .bearer_auth(token)
            .query(&range.to_query_pairs()),
    )
    .await?;
    let text = response.text().await?;

    let decoded = decode_change_stream(&text)?;
    record_skips("changes", &decoded.report);
    Ok(decoded.value)
}

/// `GET .../version`
pub async fn fetch_version(
    client: &Client,
    upstream: &UpstreamConfig,
    token: &str,
    table: &UpstreamTable<'_>,
) -> ProxyResult<i64> {
    let url = table_url(&upstream.endpoint, table, "version")?;
    let response = send("version", client.get(url).bearer_auth(token)).await?;
    version_header(response.headers()).ok_or_else(|| {
        ProxyError::UpstreamDecode(format!("response has no {TABLE_VERSION_HEADER} header"))
    })
}

/// Snapshot statistics computed from the file listing.
pub async fn fetch_stats(
    client: &Client,
    upstream: &UpstreamConfig,
    token: &str,
    table: &UpstreamTable<'_>,
) -> ProxyResult<TableStats> {
    let version = fetch_version(client, upstream, token, table).await?;
    let request = QueryRequest {
        version: Some(version),
        ..Default::default()
    };
    let response = fetch_files(client, upstream, token, table, &request).await?;

    let num_records: Option<i64> = response
        .files
        .iter()
        .map(|file| {
            let stats: Value = serde_json::from_str(file.stats.as_deref()?).ok()?;
            stats.get("numRecords")?.as_i64()
        })
        .sum();

    Ok(TableStats {
        version,
        num_files: response.files.len() as u64,
        size_in_bytes: response
            .files
            .iter()
            .map(|f| u64::try_from(f.size).unwrap_or(0))
            .sum(),
        num_records: num_records.and_then(|n| u64::try_from(n).ok()),
    })
}

/// Fetch one data file by its (pre-signed) URL and decode up to `limit` rows.
async fn fetch_file_rows(client: &Client, file: &FileAction, limit: u64) -> ProxyResult<Vec<Value>> {
    let response = send("file", client.get(&file.url)).await?;
    let bytes: Bytes = response.bytes().await?;
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);

    let decoded = tokio::task::spawn_blocking(move || decode_rows(bytes, Some(limit)))
        .await
        .map_err(|e| ProxyError::UpstreamDecode(format!("task join error: {e}")))?
        .map_err(|e| ProxyError::UpstreamDecode(e.to_string()))?;
    Ok(with_partition_values(decoded.rows, &file.partition_values))
}

/// Decoded rows of the latest snapshot, cut to `window`.
///
/// Files are fetched one after another until one row past the window is
/// buffered. Files that cannot be fetched or decoded are skipped, so
/// `total_rows` counts fetched rows only.
pub async fn query_rows(
    client: &Client,
    upstream: &UpstreamConfig,
    token: &str,
    table: &UpstreamTable<'_>,
    window: QueryWindow,
) -> ProxyResult<RowPage> {
    let target = window.fetch_target();
    let request = QueryRequest {
        limit_hint: i64::try_from(target).ok(),
        ..Default::default()
    };
    let response = fetch_files(client, upstream, token, table, &request).await?;
    let metadata = response.metadata.ok_or_else(|| {
        ProxyError::UpstreamDecode("query response has no metaData line".to_string())
    })?;
    let columns = parse_schema_columns(&metadata.schema_string)?;

    // one row past the window tells whether more rows exist
    let wanted = target.saturating_add(1);
    let mut rows = Vec::new();
    for file in &response.files {
        let buffered = rows.len() as u64;
        if buffered >= wanted {
            break;
        }
        match fetch_file_rows(client, file, wanted - buffered).await {
            Ok(file_rows) => rows.extend(file_rows),
            Err(e) => {
                metrics::UPSTREAM_FILES_SKIPPED.inc();
                tracing::warn!(file_id = %file.id, error = %e, "Skipping unreadable data file");
            }
        }
    }

    let total_rows = rows.len() as u64;
    let (rows, has_more) = window.apply(rows, total_rows);
    Ok(RowPage {
        columns,
        rows,
        total_rows,
        has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_encodes_segments() {
        let endpoint = Url::parse("https://upstream.example.com/delta-sharing/").unwrap();
        let table = UpstreamTable {
            share: "acme",
            schema: "sales data",
            table: "orders",
        };
        let url = table_url(&endpoint, &table, "metadata").unwrap();
        assert_eq!(
            url.as_str(),
            "https://upstream.example.com/delta-sharing/shares/acme/schemas/sales%20data/tables/orders/metadata"
        );
    }

    #[test]
    fn test_table_url_without_trailing_slash() {
        let endpoint = Url::parse("http://localhost:9000/delta-sharing").unwrap();
        let table = UpstreamTable {
            share: "s",
            schema: "d",
            table: "t",
        };
        let url = table_url(&endpoint, &table, "version").unwrap();
        assert_eq!(url.path(), "/delta-sharing/shares/s/schemas/d/tables/t/version");
    }

    #[test]
    fn test_version_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(version_header(&headers), None);
        headers.insert(TABLE_VERSION_HEADER, "42".parse().unwrap());
        assert_eq!(version_header(&headers), Some(42));
    }
}
