//! Delta transaction log replay over local storage.
//!
//! Commits are read from `_delta_log/<20-digit version>.json`. Checkpoints are
//! not read, so every commit since version 0 must still be present.

use super::rows::{decode_rows, with_partition_values};
use super::{ChangeEntry, ChangeSet, ReaderError, ReaderResult, TableReader};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sharegate_core::protocol::{
    ChangeFile, ChangeKind, ChangeRange, FileAction, Metadata, Protocol, QueryRequest,
    QueryResponse, QueryWindow, RowPage, TableMetadata, TableStats, parse_schema_columns,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

const LOG_DIR: &str = "_delta_log";
const COMMIT_SUFFIX: &str = ".json";
const VERSION_DIGITS: usize = 20;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddFile {
    path: String,
    #[serde(default)]
    partition_values: BTreeMap<String, Option<String>>,
    size: i64,
    #[serde(default = "default_data_change")]
    data_change: bool,
    #[serde(default)]
    stats: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveFile {
    path: String,
    #[serde(default = "default_data_change")]
    data_change: bool,
    #[serde(default)]
    partition_values: BTreeMap<String, Option<String>>,
    #[serde(default)]
    size: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdcFile {
    path: String,
    #[serde(default)]
    partition_values: BTreeMap<String, Option<String>>,
    size: i64,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    #[serde(default)]
    timestamp: Option<i64>,
}

fn default_data_change() -> bool {
    true
}

#[derive(Clone, Debug)]
enum LogAction {
    Protocol(Protocol),
    Metadata(Metadata),
    Add(AddFile),
    Remove(RemoveFile),
    Cdc(CdcFile),
}

#[derive(Clone, Debug)]
struct Commit {
    version: i64,
    /// Milliseconds since the epoch.
    timestamp: i64,
    actions: Vec<LogAction>,
}

fn parse_commit(version: i64, text: &str, fallback_timestamp: i64) -> ReaderResult<Commit> {
    let mut actions = Vec::new();
    let mut timestamp = None;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| {
            ReaderError::InvalidLog(format!("commit {version} line {}: {e}", idx + 1))
        })?;
        let Value::Object(object) = value else {
            return Err(ReaderError::InvalidLog(format!(
                "commit {version} line {}: not a JSON object",
                idx + 1
            )));
        };

        for (key, payload) in object {
            match key.as_str() {
                "protocol" => actions.push(LogAction::Protocol(from_payload(version, idx, payload)?)),
                "metaData" => actions.push(LogAction::Metadata(from_payload(version, idx, payload)?)),
                "add" => actions.push(LogAction::Add(from_payload(version, idx, payload)?)),
                "remove" => actions.push(LogAction::Remove(from_payload(version, idx, payload)?)),
                "cdc" => actions.push(LogAction::Cdc(from_payload(version, idx, payload)?)),
                "commitInfo" => {
                    let info: CommitInfo = from_payload(version, idx, payload)?;
                    timestamp = info.timestamp.or(timestamp);
                }
                // txn, domainMetadata and other actions do not affect sharing
                _ => {}
            }
        }
    }

    Ok(Commit {
        version,
        timestamp: timestamp.unwrap_or(fallback_timestamp),
        actions,
    })
}

fn from_payload<T: DeserializeOwned>(version: i64, idx: usize, payload: Value) -> ReaderResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| ReaderError::InvalidLog(format!("commit {version} line {}: {e}", idx + 1)))
}

/// Version encoded in a commit file name.
fn commit_version(file_name: &str) -> Option<i64> {
    let digits = file_name.strip_suffix(COMMIT_SUFFIX)?;
    if digits.len() != VERSION_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Resolve a table location to an absolute directory.
pub fn table_root(location: &str) -> ReaderResult<PathBuf> {
    if location.starts_with("file:") {
        let url = Url::parse(location)
            .map_err(|e| ReaderError::Unsupported(format!("{location}: {e}")))?;
        return url
            .to_file_path()
            .map_err(|_| ReaderError::Unsupported(format!("{location}: not a local file URL")));
    }
    if location.contains("://") {
        return Err(ReaderError::Unsupported(format!(
            "{location}: only local paths and file:// URLs can be read"
        )));
    }
    Ok(std::path::absolute(location)?)
}

/// Resolve a (URL-encoded, usually relative) data file path from the log.
fn resolve_data_path(root: &Path, path: &str) -> ReaderResult<PathBuf> {
    let base = Url::from_directory_path(root).map_err(|_| {
        ReaderError::Unsupported(format!("table root {} is not absolute", root.display()))
    })?;
    let url = base
        .join(path)
        .map_err(|e| ReaderError::InvalidLog(format!("invalid data file path '{path}': {e}")))?;
    url.to_file_path().map_err(|_| {
        ReaderError::Unsupported(format!("data file '{path}' is not on the local filesystem"))
    })
}

fn file_id(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

fn num_records(stats: Option<&str>) -> Option<i64> {
    let stats: Value = serde_json::from_str(stats?).ok()?;
    stats.get("numRecords")?.as_i64()
}

fn parse_timestamp_millis(name: &str, value: &str) -> ReaderResult<i64> {
    let parsed = OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        ReaderError::InvalidArgument(format!("{name} '{value}' is not an RFC 3339 timestamp: {e}"))
    })?;
    i64::try_from(parsed.unix_timestamp_nanos() / 1_000_000)
        .map_err(|_| ReaderError::InvalidArgument(format!("{name} '{value}' is out of range")))
}

async fn modified_millis(path: &Path) -> i64 {
    tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
        .map(OffsetDateTime::from)
        .and_then(|t| i64::try_from(t.unix_timestamp_nanos() / 1_000_000).ok())
        .unwrap_or(0)
}

/// Table state as of one version.
#[derive(Debug)]
struct Snapshot {
    version: i64,
    timestamp: i64,
    protocol: Protocol,
    metadata: Metadata,
    files: BTreeMap<String, AddFile>,
}

impl Snapshot {
    fn size_in_bytes(&self) -> i64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// Metadata with the snapshot's version, size and file count filled in.
    fn described_metadata(&self) -> Metadata {
        let mut metadata = self.metadata.clone();
        metadata.version = Some(self.version);
        metadata.size = Some(self.size_in_bytes());
        metadata.num_files = i64::try_from(self.files.len()).ok();
        metadata
    }

    fn num_records(&self) -> Option<i64> {
        self.files
            .values()
            .map(|f| num_records(f.stats.as_deref()))
            .sum()
    }
}

/// The loaded commit history of one table.
#[derive(Debug)]
struct TableLog {
    root: PathBuf,
    commits: Vec<Commit>,
}

impl TableLog {
    async fn load(location: &str) -> ReaderResult<Self> {
        let root = table_root(location)?;
        let log_dir = root.join(LOG_DIR);

        let mut entries = match tokio::fs::read_dir(&log_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReaderError::NotFound(format!(
                    "no transaction log at {}",
                    log_dir.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(version) = entry.file_name().to_str().and_then(commit_version) {
                versions.push((version, entry.path()));
            }
        }
        versions.sort_by_key(|(version, _)| *version);

        if versions.is_empty() {
            return Err(ReaderError::NotFound(format!(
                "transaction log at {} has no commits",
                log_dir.display()
            )));
        }
        for (expected, (version, _)) in (0_i64..).zip(&versions) {
            if *version != expected {
                return Err(ReaderError::InvalidLog(format!(
                    "commit {expected} is missing (checkpoints are not supported)"
                )));
            }
        }

        let mut commits = Vec::with_capacity(versions.len());
        for (version, path) in versions {
            let text = tokio::fs::read_to_string(&path).await?;
            let fallback = modified_millis(&path).await;
            commits.push(parse_commit(version, &text, fallback)?);
        }

        tracing::debug!(root = %root.display(), commits = commits.len(), "Loaded Delta log");
        Ok(Self { root, commits })
    }

    fn latest_version(&self) -> i64 {
        self.commits.last().map_or(0, |c| c.version)
    }

    fn snapshot(&self, version: Option<i64>) -> ReaderResult<Snapshot> {
        let latest = self.latest_version();
        let version = version.unwrap_or(latest);
        if version < 0 || version > latest {
            return Err(ReaderError::InvalidArgument(format!(
                "version {version} does not exist (latest is {latest})"
            )));
        }

        let mut protocol = None;
        let mut metadata = None;
        let mut files = BTreeMap::new();
        let mut timestamp = 0;

        for commit in self.commits.iter().take_while(|c| c.version <= version) {
            timestamp = commit.timestamp;
            for action in &commit.actions {
                match action {
                    LogAction::Protocol(p) => protocol = Some(p.clone()),
                    LogAction::Metadata(m) => metadata = Some(m.clone()),
                    LogAction::Add(add) => {
                        files.insert(add.path.clone(), add.clone());
                    }
                    LogAction::Remove(remove) => {
                        files.remove(&remove.path);
                    }
                    LogAction::Cdc(_) => {}
                }
            }
        }

        let metadata = metadata.ok_or_else(|| {
            ReaderError::InvalidLog(format!("no metaData action up to version {version}"))
        })?;
        Ok(Snapshot {
            version,
            timestamp,
            protocol: protocol.unwrap_or_default(),
            metadata,
            files,
        })
    }

    /// Latest version committed at or before `timestamp`.
    fn version_at(&self, name: &str, timestamp: &str) -> ReaderResult<i64> {
        let millis = parse_timestamp_millis(name, timestamp)?;
        self.commits
            .iter()
            .rev()
            .find(|c| c.timestamp <= millis)
            .map(|c| c.version)
            .ok_or_else(|| {
                ReaderError::InvalidArgument(format!("{name} {timestamp} is before the first commit"))
            })
    }

    /// First version committed at or after `timestamp`.
    fn version_from(&self, name: &str, timestamp: &str) -> ReaderResult<i64> {
        let millis = parse_timestamp_millis(name, timestamp)?;
        self.commits
            .iter()
            .find(|c| c.timestamp >= millis)
            .map(|c| c.version)
            .ok_or_else(|| {
                ReaderError::InvalidArgument(format!("{name} {timestamp} is after the latest commit"))
            })
    }

    fn file_url(&self, path: &str) -> ReaderResult<String> {
        let resolved = resolve_data_path(&self.root, path)?;
        Url::from_file_path(&resolved)
            .map(|url| url.to_string())
            .map_err(|_| ReaderError::Unsupported(format!("{} is not absolute", resolved.display())))
    }

    fn file_action(&self, add: &AddFile) -> ReaderResult<FileAction> {
        Ok(FileAction {
            url: self.file_url(&add.path)?,
            id: file_id(&add.path),
            partition_values: add.partition_values.clone(),
            size: add.size,
            stats: add.stats.clone(),
            version: None,
            timestamp: None,
            expiration_timestamp: None,
        })
    }

    fn changes(&self, range: &ChangeRange) -> ReaderResult<ChangeSet> {
        range
            .validate()
            .map_err(|e| ReaderError::InvalidArgument(e.to_string()))?;
        let latest = self.latest_version();

        let start = match (range.starting_version, &range.starting_timestamp) {
            (Some(version), _) => version,
            (None, Some(ts)) => self.version_from("startingTimestamp", ts)?,
            (None, None) => {
                return Err(ReaderError::InvalidArgument(
                    "either startingVersion or startingTimestamp is required".to_string(),
                ));
            }
        };
        if start > latest {
            return Err(ReaderError::InvalidArgument(format!(
                "startingVersion {start} is beyond the latest version {latest}"
            )));
        }
        let end = match (range.ending_version, &range.ending_timestamp) {
            (Some(version), _) => version.min(latest),
            (None, Some(ts)) => self.version_at("endingTimestamp", ts)?,
            (None, None) => latest,
        };
        if end < start {
            return Err(ReaderError::InvalidArgument(format!(
                "range ends at version {end}, before its start {start}"
            )));
        }

        let snapshot = self.snapshot(Some(end))?;
        let mut entries = Vec::new();

        for commit in self
            .commits
            .iter()
            .filter(|c| (start..=end).contains(&c.version))
        {
            // a commit with change data files describes its changes only through them
            let has_cdc = commit
                .actions
                .iter()
                .any(|a| matches!(a, LogAction::Cdc(_)));

            for action in &commit.actions {
                let (kind, path, partition_values, size, stats) = match action {
                    LogAction::Cdc(cdc) => (
                        ChangeKind::Cdf,
                        &cdc.path,
                        &cdc.partition_values,
                        cdc.size,
                        None,
                    ),
                    LogAction::Add(add) if !has_cdc && add.data_change => (
                        ChangeKind::Add,
                        &add.path,
                        &add.partition_values,
                        add.size,
                        add.stats.clone(),
                    ),
                    LogAction::Remove(remove) if !has_cdc && remove.data_change => (
                        ChangeKind::Remove,
                        &remove.path,
                        &remove.partition_values,
                        remove.size.unwrap_or(0),
                        None,
                    ),
                    _ => continue,
                };
                entries.push(ChangeEntry {
                    kind,
                    file: ChangeFile {
                        url: self.file_url(path)?,
                        id: file_id(path),
                        partition_values: partition_values.clone(),
                        size,
                        version: commit.version,
                        timestamp: commit.timestamp,
                        stats,
                        expiration_timestamp: None,
                    },
                });
            }
        }

        Ok(ChangeSet {
            protocol: snapshot.protocol,
            metadata: snapshot.metadata,
            entries,
        })
    }
}

fn columns_of(metadata: &Metadata) -> ReaderResult<Vec<sharegate_core::protocol::Column>> {
    parse_schema_columns(&metadata.schema_string)
        .map_err(|e| ReaderError::InvalidLog(format!("invalid schemaString: {e}")))
}

/// Reads Delta tables from the local filesystem by replaying JSON commits.
#[derive(Clone, Debug, Default)]
pub struct DeltaLogReader;

impl DeltaLogReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TableReader for DeltaLogReader {
    async fn get_metadata(&self, location: &str) -> ReaderResult<TableMetadata> {
        let log = TableLog::load(location).await?;
        let snapshot = log.snapshot(None)?;
        Ok(TableMetadata {
            columns: columns_of(&snapshot.metadata)?,
            metadata: snapshot.described_metadata(),
            protocol: snapshot.protocol,
            version: Some(snapshot.version),
        })
    }

    async fn query(&self, location: &str, window: QueryWindow) -> ReaderResult<RowPage> {
        let log = TableLog::load(location).await?;
        let snapshot = log.snapshot(None)?;
        let columns = columns_of(&snapshot.metadata)?;
        let target = window.fetch_target();

        let mut rows = Vec::new();
        let mut total_rows: u64 = 0;
        for add in snapshot.files.values() {
            let path = resolve_data_path(&log.root, &add.path)?;
            let bytes = Bytes::from(tokio::fs::read(&path).await?);
            let needed = usize::try_from(target.saturating_sub(rows.len() as u64))
                .unwrap_or(usize::MAX);

            let decoded = tokio::task::spawn_blocking(move || decode_rows(bytes, Some(needed)))
                .await
                .map_err(|e| ReaderError::Parquet(format!("task join error: {e}")))??;
            total_rows += decoded.num_rows;
            rows.extend(with_partition_values(decoded.rows, &add.partition_values));
        }

        let (rows, has_more) = window.apply(rows, total_rows);
        Ok(RowPage {
            columns,
            rows,
            total_rows,
            has_more,
        })
    }

    async fn get_files(
        &self,
        location: &str,
        request: &QueryRequest,
    ) -> ReaderResult<QueryResponse> {
        request
            .validate()
            .map_err(|e| ReaderError::InvalidArgument(e.to_string()))?;
        let log = TableLog::load(location).await?;
        let version = match (&request.version, &request.timestamp) {
            (Some(version), _) => Some(*version),
            (None, Some(ts)) => Some(log.version_at("timestamp", ts)?),
            (None, None) => None,
        };
        let snapshot = log.snapshot(version)?;

        let mut selected: Vec<&AddFile> = snapshot.files.values().collect();
        // limitHint can only be honoured when every file carries a record count
        if let Some(limit) = request.limit_hint
            && selected
                .iter()
                .all(|f| num_records(f.stats.as_deref()).is_some())
        {
            let mut covered = 0_i64;
            selected.retain(|f| {
                let keep = covered < limit;
                covered += num_records(f.stats.as_deref()).unwrap_or(0);
                keep
            });
        }

        let files = selected
            .into_iter()
            .map(|add| log.file_action(add))
            .collect::<ReaderResult<Vec<_>>>()?;

        Ok(QueryResponse {
            protocol: snapshot.protocol.clone(),
            metadata: Some(snapshot.described_metadata()),
            files,
        })
    }

    async fn get_changes(&self, location: &str, range: &ChangeRange) -> ReaderResult<ChangeSet> {
        TableLog::load(location).await?.changes(range)
    }

    async fn get_stats(&self, location: &str) -> ReaderResult<TableStats> {
        let log = TableLog::load(location).await?;
        let snapshot = log.snapshot(None)?;
        Ok(TableStats {
            version: snapshot.version,
            num_files: snapshot.files.len() as u64,
            size_in_bytes: u64::try_from(snapshot.size_in_bytes()).unwrap_or(0),
            num_records: snapshot
                .num_records()
                .and_then(|n| u64::try_from(n).ok()),
        })
    }

    async fn version(&self, location: &str) -> ReaderResult<i64> {
        Ok(TableLog::load(location).await?.latest_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTOCOL: &str = r#"{"protocol":{"minReaderVersion":1,"minWriterVersion":2}}"#;
    const METADATA: &str = r#"{"metaData":{"id":"t1","format":{"provider":"parquet","options":{}},"schemaString":"{\"type\":\"struct\",\"fields\":[{\"name\":\"id\",\"type\":\"long\",\"nullable\":false,\"metadata\":{}}]}","partitionColumns":[],"configuration":{"delta.enableChangeDataFeed":"true"},"createdTime":1700000000000}}"#;

    fn add(path: &str, size: i64) -> String {
        format!(
            r#"{{"add":{{"path":"{path}","partitionValues":{{}},"size":{size},"modificationTime":1,"dataChange":true,"stats":"{{\"numRecords\":2}}"}}}}"#
        )
    }

    fn remove(path: &str) -> String {
        format!(r#"{{"remove":{{"path":"{path}","deletionTimestamp":5,"dataChange":true,"size":10}}}}"#)
    }

    fn commit_info(ts: i64) -> String {
        format!(r#"{{"commitInfo":{{"timestamp":{ts},"operation":"WRITE"}}}}"#)
    }

    fn log(commits: Vec<String>) -> TableLog {
        let commits = commits
            .iter()
            .enumerate()
            .map(|(v, text)| parse_commit(v as i64, text, 0).unwrap())
            .collect();
        TableLog {
            root: PathBuf::from("/data/tables/t1"),
            commits,
        }
    }

    #[test]
    fn test_commit_version_parsing() {
        assert_eq!(commit_version("00000000000000000000.json"), Some(0));
        assert_eq!(commit_version("00000000000000000012.json"), Some(12));
        assert_eq!(commit_version("00000000000000000012.checkpoint.parquet"), None);
        assert_eq!(commit_version("12.json"), None);
        assert_eq!(commit_version("_last_checkpoint"), None);
    }

    #[test]
    fn test_replay_applies_removes() {
        let log = log(vec![
            format!("{}\n{PROTOCOL}\n{METADATA}\n{}\n{}", commit_info(1000), add("a.parquet", 10), add("b.parquet", 20)),
            format!("{}\n{}", commit_info(2000), remove("a.parquet")),
        ]);

        let latest = log.snapshot(None).unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.files.keys().collect::<Vec<_>>(), vec!["b.parquet"]);
        assert_eq!(latest.size_in_bytes(), 20);
        assert_eq!(latest.timestamp, 2000);

        let first = log.snapshot(Some(0)).unwrap();
        assert_eq!(first.files.len(), 2);
        assert_eq!(first.num_records(), Some(4));

        assert!(matches!(log.snapshot(Some(2)), Err(ReaderError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_metadata_is_invalid() {
        let log = log(vec![format!("{PROTOCOL}\n{}", add("a.parquet", 1))]);
        assert!(matches!(log.snapshot(None), Err(ReaderError::InvalidLog(_))));
    }

    #[test]
    fn test_malformed_commit_is_invalid() {
        assert!(matches!(
            parse_commit(3, "{not json", 0),
            Err(ReaderError::InvalidLog(_))
        ));
    }

    #[test]
    fn test_changes_prefer_cdc_files() {
        let log = log(vec![
            format!("{}\n{PROTOCOL}\n{METADATA}\n{}", commit_info(1000), add("a.parquet", 10)),
            format!(
                "{}\n{}\n{}\n{}",
                commit_info(2000),
                remove("a.parquet"),
                add("b.parquet", 5),
                r#"{"cdc":{"path":"_change_data/c1.parquet","partitionValues":{},"size":7,"dataChange":false}}"#
            ),
            format!("{}\n{}", commit_info(3000), remove("b.parquet")),
        ]);

        let changes = log.changes(&ChangeRange::from_version(0)).unwrap();
        let kinds: Vec<_> = changes.entries.iter().map(|e| (e.kind, e.file.version)).collect();
        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Add, 0),
                (ChangeKind::Cdf, 1),
                (ChangeKind::Remove, 2)
            ]
        );
        assert_eq!(changes.entries[1].file.size, 7);
        assert_eq!(changes.entries[1].file.timestamp, 2000);
        assert!(changes.entries[0].file.url.starts_with("file:///data/tables/t1/"));

        let bounded = log
            .changes(&ChangeRange {
                starting_version: Some(1),
                ending_version: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(bounded.entries.len(), 1);
    }

    #[test]
    fn test_changes_by_timestamp() {
        let log = log(vec![
            format!("{}\n{PROTOCOL}\n{METADATA}\n{}", commit_info(1_700_000_000_000), add("a.parquet", 1)),
            format!("{}\n{}", commit_info(1_700_000_100_000), add("b.parquet", 1)),
        ]);
        let range = ChangeRange {
            starting_timestamp: Some("2023-11-14T22:13:30Z".to_string()),
            ..Default::default()
        };
        let changes = log.changes(&range).unwrap();
        assert_eq!(changes.entries.len(), 1);
        assert_eq!(changes.entries[0].file.version, 1);

        let bad = ChangeRange {
            starting_timestamp: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(matches!(log.changes(&bad), Err(ReaderError::InvalidArgument(_))));
    }

    #[test]
    fn test_changes_beyond_latest_is_invalid() {
        let log = log(vec![format!("{PROTOCOL}\n{METADATA}")]);
        assert!(matches!(
            log.changes(&ChangeRange::from_version(5)),
            Err(ReaderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_table_root_rejects_remote_urls() {
        assert!(matches!(
            table_root("s3://bucket/table"),
            Err(ReaderError::Unsupported(_))
        ));
        assert_eq!(
            table_root("file:///data/tables/t1").unwrap(),
            PathBuf::from("/data/tables/t1")
        );
        assert!(table_root("relative/table").unwrap().is_absolute());
    }

    #[test]
    fn test_resolve_encoded_data_path() {
        let root = Path::new("/data/t1");
        assert_eq!(
            resolve_data_path(root, "date=2024-01-01%2010%3A00/part-0.parquet").unwrap(),
            PathBuf::from("/data/t1/date=2024-01-01 10:00/part-0.parquet")
        );
    }
}
