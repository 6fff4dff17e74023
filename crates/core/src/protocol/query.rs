//! Query request bodies, row windows and change ranges.

use super::action::{ChangeAction, FileAction, Metadata, Protocol};
use super::schema::Column;
use serde::{Deserialize, Serialize};

/// Body of a `POST .../query` request.
///
/// Predicate hints are forwarded verbatim and never evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate_hints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_hint: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl QueryRequest {
    pub fn new(
        predicate_hints: Option<Vec<String>>,
        limit_hint: Option<i64>,
        version: Option<i64>,
        timestamp: Option<String>,
    ) -> crate::Result<Self> {
        let request = Self {
            predicate_hints,
            limit_hint,
            version,
            timestamp,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.version.is_some() && self.timestamp.is_some() {
            return Err(crate::Error::InvalidArgument(
                "version and timestamp cannot both be specified".to_string(),
            ));
        }
        if let Some(limit) = self.limit_hint
            && limit < 0
        {
            return Err(crate::Error::InvalidArgument(format!(
                "limitHint must not be negative, got {limit}"
            )));
        }
        if let Some(version) = self.version
            && version < 0
        {
            return Err(crate::Error::InvalidArgument(format!(
                "version must not be negative, got {version}"
            )));
        }
        Ok(())
    }

    /// Encode as the JSON body sent upstream.
    pub fn encode(&self) -> crate::Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }
}

/// Row window requested from a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    #[serde(default = "default_window_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_window_limit() -> u64 {
    100
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            limit: default_window_limit(),
            offset: 0,
        }
    }
}

impl QueryWindow {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Rows that must be buffered before the window can be cut.
    pub fn fetch_target(&self) -> u64 {
        self.limit.saturating_add(self.offset)
    }

    /// Cut the window out of buffered rows.
    ///
    /// `total_rows` is the number of rows that were available; `has_more` is
    /// true when rows beyond the window exist.
    pub fn apply<T>(&self, rows: Vec<T>, total_rows: u64) -> (Vec<T>, bool) {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        let page: Vec<T> = rows.into_iter().skip(offset).take(limit).collect();
        let has_more = self.fetch_target() < total_rows;
        (page, has_more)
    }
}

/// Version or timestamp range for a change data feed request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_timestamp: Option<String>,
}

impl ChangeRange {
    pub fn from_version(starting_version: i64) -> Self {
        Self {
            starting_version: Some(starting_version),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        match (&self.starting_version, &self.starting_timestamp) {
            (None, None) => {
                return Err(crate::Error::InvalidArgument(
                    "either startingVersion or startingTimestamp is required".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(crate::Error::InvalidArgument(
                    "startingVersion and startingTimestamp cannot both be specified".to_string(),
                ));
            }
            _ => {}
        }
        if self.ending_version.is_some() && self.ending_timestamp.is_some() {
            return Err(crate::Error::InvalidArgument(
                "endingVersion and endingTimestamp cannot both be specified".to_string(),
            ));
        }
        if let Some(start) = self.starting_version
            && start < 0
        {
            return Err(crate::Error::InvalidArgument(format!(
                "startingVersion must not be negative, got {start}"
            )));
        }
        if let (Some(start), Some(end)) = (self.starting_version, self.ending_version)
            && end < start
        {
            return Err(crate::Error::InvalidArgument(format!(
                "endingVersion {end} is before startingVersion {start}"
            )));
        }
        Ok(())
    }

    /// Query string pairs for the upstream `.../changes` request.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.starting_version {
            pairs.push(("startingVersion", v.to_string()));
        }
        if let Some(v) = self.ending_version {
            pairs.push(("endingVersion", v.to_string()));
        }
        if let Some(ts) = &self.starting_timestamp {
            pairs.push(("startingTimestamp", ts.clone()));
        }
        if let Some(ts) = &self.ending_timestamp {
            pairs.push(("endingTimestamp", ts.clone()));
        }
        pairs
    }
}

/// Snapshot files of a table as returned by `POST .../query`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResponse {
    pub protocol: Protocol,
    pub metadata: Option<Metadata>,
    pub files: Vec<FileAction>,
}

/// Change data feed of a table as returned by `GET .../changes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangesResponse {
    pub protocol: Protocol,
    pub metadata: Option<Metadata>,
    pub actions: Vec<ChangeAction>,
}

/// Table metadata with its columns resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableMetadata {
    pub protocol: Protocol,
    pub metadata: Metadata,
    pub columns: Vec<Column>,
    pub version: Option<i64>,
}

/// A window of decoded rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPage {
    pub columns: Vec<Column>,
    pub rows: Vec<serde_json::Value>,
    pub total_rows: u64,
    pub has_more: bool,
}

/// Aggregate statistics of a table snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub version: i64,
    pub num_files: u64,
    pub size_in_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_records: Option<u64>,
}
