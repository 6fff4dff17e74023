//! Protocol proxy: serves table data either from an upstream sharing server
//! (hybrid) or from local storage (standalone).
//!
//! The mode is fixed at startup. Both modes return the same result types.

pub mod local;
pub mod upstream;

use crate::reader::{ReaderError, TableReader};
use crate::service_account::{ServiceAccountError, ServiceAccountManager};
use sharegate_core::config::ProxyConfig;
use sharegate_core::protocol::{
    ChangeRange, ChangesResponse, QueryRequest, QueryResponse, QueryWindow, RowPage,
    TableMetadata, TableStats,
};
use sharegate_core::{ShareRef, TableRef};
use sharegate_metadata::models::ShareRow;
use sharegate_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Longest upstream error body kept in an error.
const MAX_ERROR_BODY: usize = 1024;

/// Proxy errors.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The upstream server answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    UpstreamProtocolError { status: u16, body: String },

    #[error("upstream request failed: {0}")]
    UpstreamTransport(String),

    #[error("invalid upstream response: {0}")]
    UpstreamDecode(String),

    #[error("local read failed: {cause}")]
    LocalReadError { cause: String },

    #[error("service account error: {0}")]
    ServiceAccount(#[from] ServiceAccountError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl ProxyError {
    pub(crate) fn upstream_status(status: u16, body: String) -> Self {
        let body = if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &body[..end])
        } else {
            body
        };
        Self::UpstreamProtocolError { status, body }
    }
}

impl From<ReaderError> for ProxyError {
    fn from(e: ReaderError) -> Self {
        match e {
            ReaderError::NotFound(msg) => Self::NotFound(msg),
            ReaderError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            other => Self::LocalReadError {
                cause: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        Self::UpstreamTransport(e.to_string())
    }
}

impl From<sharegate_core::Error> for ProxyError {
    fn from(e: sharegate_core::Error) -> Self {
        match e {
            sharegate_core::Error::Decode(msg) => Self::UpstreamDecode(msg),
            sharegate_core::Error::Serialization(msg) => Self::UpstreamDecode(msg),
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

/// Where the upstream sharing server lives.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub endpoint: Url,
    pub timeout: Duration,
}

/// How data-access requests are served.
#[derive(Clone, Debug)]
pub enum ProxyMode {
    Hybrid(UpstreamConfig),
    Standalone,
}

impl ProxyMode {
    pub fn from_config(config: &ProxyConfig) -> ProxyResult<Self> {
        match config {
            ProxyConfig::Standalone => Ok(Self::Standalone),
            ProxyConfig::Hybrid {
                endpoint,
                request_timeout_secs,
            } => {
                let endpoint = Url::parse(endpoint).map_err(|e| {
                    ProxyError::InvalidArgument(format!("invalid upstream endpoint '{endpoint}': {e}"))
                })?;
                Ok(Self::Hybrid(UpstreamConfig {
                    endpoint,
                    timeout: Duration::from_secs(*request_timeout_secs),
                }))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hybrid(_) => "hybrid",
            Self::Standalone => "standalone",
        }
    }
}

/// A table reference resolved against the local catalog.
#[derive(Clone, Debug)]
pub struct ResolvedTable {
    pub share: ShareRow,
    pub schema: String,
    pub table: String,
    /// Storage location, when the table is registered or overridden.
    pub location: Option<String>,
}

impl ResolvedTable {
    fn upstream(&self) -> upstream::UpstreamTable<'_> {
        upstream::UpstreamTable {
            share: &self.share.name,
            schema: &self.schema,
            table: &self.table,
        }
    }

    fn location(&self) -> ProxyResult<&str> {
        self.location.as_deref().ok_or_else(|| {
            ProxyError::NotFound(format!(
                "table {}.{}.{}",
                self.share.name, self.schema, self.table
            ))
        })
    }
}

/// Serves table metadata, files, rows and changes in the configured mode.
pub struct ProtocolProxy {
    mode: ProxyMode,
    metadata: Arc<dyn MetadataStore>,
    reader: Arc<dyn TableReader>,
    service_account: Option<Arc<ServiceAccountManager>>,
    http: reqwest::Client,
}

impl ProtocolProxy {
    /// Build a proxy. Hybrid mode needs the service account to authenticate upstream.
    pub fn new(
        mode: ProxyMode,
        metadata: Arc<dyn MetadataStore>,
        reader: Arc<dyn TableReader>,
        service_account: Option<Arc<ServiceAccountManager>>,
    ) -> ProxyResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let ProxyMode::Hybrid(upstream) = &mode {
            if service_account.is_none() {
                return Err(ProxyError::InvalidArgument(
                    "hybrid mode requires a service account".to_string(),
                ));
            }
            builder = builder.timeout(upstream.timeout);
        }
        Ok(Self {
            mode,
            metadata,
            reader,
            service_account,
            http: builder.build()?,
        })
    }

    pub fn mode(&self) -> &ProxyMode {
        &self.mode
    }

    /// Resolve the share and, when registered, the table's storage location.
    pub async fn resolve(&self, table: &TableRef) -> ProxyResult<ResolvedTable> {
        let share = match &table.share {
            ShareRef::Id(id) => self.metadata.get_share(*id).await?,
            ShareRef::Name(name) => self.metadata.get_share_by_name(name).await?,
        }
        .ok_or_else(|| ProxyError::NotFound(format!("share {}", table.share)))?;

        let location = match &table.location {
            Some(location) => Some(location.clone()),
            None => self
                .metadata
                .resolve_table(share.share_id, &table.schema, &table.table)
                .await?
                .map(|entry| entry.location),
        };

        Ok(ResolvedTable {
            share,
            schema: table.schema.clone(),
            table: table.table.clone(),
            location,
        })
    }

    async fn upstream_token(&self) -> ProxyResult<String> {
        match &self.service_account {
            Some(manager) => Ok(manager.ensure_token().await?),
            None => Err(ProxyError::InvalidArgument(
                "hybrid mode requires a service account".to_string(),
            )),
        }
    }

    /// Drop the cached service account secret when upstream rejects it.
    async fn observe<T>(&self, result: ProxyResult<T>) -> ProxyResult<T> {
        if let Err(ProxyError::UpstreamProtocolError { status, .. }) = &result
            && (*status == 401 || *status == 403)
            && let Some(manager) = &self.service_account
        {
            tracing::warn!(status, "Upstream rejected the service account credential");
            manager.invalidate_cache().await;
        }
        result
    }

    pub async fn get_metadata(&self, table: &TableRef) -> ProxyResult<TableMetadata> {
        let resolved = self.resolve(table).await?;
        match &self.mode {
            ProxyMode::Hybrid(upstream) => {
                let token = self.upstream_token().await?;
                let result =
                    upstream::fetch_metadata(&self.http, upstream, &token, &resolved.upstream())
                        .await;
                self.observe(result).await
            }
            ProxyMode::Standalone => {
                local::metadata(self.reader.as_ref(), resolved.location()?).await
            }
        }
    }

    /// Decoded rows of the latest snapshot, cut to `window`.
    pub async fn query(&self, table: &TableRef, window: QueryWindow) -> ProxyResult<RowPage> {
        let resolved = self.resolve(table).await?;
        match &self.mode {
            ProxyMode::Hybrid(upstream) => {
                let token = self.upstream_token().await?;
                let result = upstream::query_rows(
                    &self.http,
                    upstream,
                    &token,
                    &resolved.upstream(),
                    window,
                )
                .await;
                self.observe(result).await
            }
            ProxyMode::Standalone => {
                local::query(self.reader.as_ref(), resolved.location()?, window).await
            }
        }
    }

    pub async fn query_changes(
        &self,
        table: &TableRef,
        range: &ChangeRange,
    ) -> ProxyResult<ChangesResponse> {
        range.validate()?;
        let resolved = self.resolve(table).await?;
        match &self.mode {
            ProxyMode::Hybrid(upstream) => {
                let token = self.upstream_token().await?;
                let result = upstream::fetch_changes(
                    &self.http,
                    upstream,
                    &token,
                    &resolved.upstream(),
                    range,
                )
                .await;
                self.observe(result).await
            }
            ProxyMode::Standalone => {
                local::changes(self.reader.as_ref(), resolved.location()?, range).await
            }
        }
    }

    /// Protocol, metadata and file actions of a snapshot.
    pub async fn query_files(
        &self,
        table: &TableRef,
        request: &QueryRequest,
    ) -> ProxyResult<QueryResponse> {
        request.validate()?;
        let resolved = self.resolve(table).await?;
        match &self.mode {
            ProxyMode::Hybrid(upstream) => {
                let token = self.upstream_token().await?;
                let result = upstream::fetch_files(
                    &self.http,
                    upstream,
                    &token,
                    &resolved.upstream(),
                    request,
                )
                .await;
                self.observe(result).await
            }
            ProxyMode::Standalone => {
                local::files(self.reader.as_ref(), resolved.location()?, request).await
            }
        }
    }

    pub async fn table_version(&self, table: &TableRef) -> ProxyResult<i64> {
        let resolved = self.resolve(table).await?;
        match &self.mode {
            ProxyMode::Hybrid(upstream) => {
                let token = self.upstream_token().await?;
                let result =
                    upstream::fetch_version(&self.http, upstream, &token, &resolved.upstream())
                        .await;
                self.observe(result).await
            }
            ProxyMode::Standalone => {
                local::version(self.reader.as_ref(), resolved.location()?).await
            }
        }
    }

    pub async fn table_stats(&self, table: &TableRef) -> ProxyResult<TableStats> {
        let resolved = self.resolve(table).await?;
        match &self.mode {
            ProxyMode::Hybrid(upstream) => {
                let token = self.upstream_token().await?;
                let result =
                    upstream::fetch_stats(&self.http, upstream, &token, &resolved.upstream())
                        .await;
                self.observe(result).await
            }
            ProxyMode::Standalone => {
                local::stats(self.reader.as_ref(), resolved.location()?).await
            }
        }
    }
}

impl std::fmt::Debug for ProtocolProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolProxy")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_config() {
        assert!(matches!(
            ProxyMode::from_config(&ProxyConfig::Standalone).unwrap(),
            ProxyMode::Standalone
        ));

        let mode = ProxyMode::from_config(&ProxyConfig::Hybrid {
            endpoint: "https://upstream.example.com/delta-sharing/".to_string(),
            request_timeout_secs: 7,
        })
        .unwrap();
        match mode {
            ProxyMode::Hybrid(upstream) => {
                assert_eq!(upstream.endpoint.host_str(), Some("upstream.example.com"));
                assert_eq!(upstream.timeout, Duration::from_secs(7));
            }
            ProxyMode::Standalone => panic!("expected hybrid"),
        }

        assert!(
            ProxyMode::from_config(&ProxyConfig::Hybrid {
                endpoint: "not a url".to_string(),
                request_timeout_secs: 7,
            })
            .is_err()
        );
    }

    #[test]
    fn test_reader_errors_map_to_proxy_errors() {
        assert!(matches!(
            ProxyError::from(ReaderError::NotFound("t".into())),
            ProxyError::NotFound(_)
        ));
        assert!(matches!(
            ProxyError::from(ReaderError::Parquet("bad".into())),
            ProxyError::LocalReadError { .. }
        ));
    }

    #[test]
    fn test_upstream_error_body_is_truncated() {
        let body = "é".repeat(MAX_ERROR_BODY);
        match ProxyError::upstream_status(500, body) {
            ProxyError::UpstreamProtocolError { status, body } => {
                assert_eq!(status, 500);
                assert!(body.len() <= MAX_ERROR_BODY + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
