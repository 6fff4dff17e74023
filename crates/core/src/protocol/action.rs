//! Delta Sharing protocol actions.
//!
//! Each NDJSON line of a metadata, query or changes response is a JSON object
//! with exactly one of these keys: `protocol`, `metaData`, `file`, `add`,
//! `remove` or `cdf`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reader protocol requirements of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub min_reader_version: i32,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            min_reader_version: 1,
        }
    }
}

/// Table data file format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub provider: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            provider: "parquet".to_string(),
            options: BTreeMap::new(),
        }
    }
}

/// Table metadata (`metaData` line).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub format: Format,
    pub schema_string: String,
    #[serde(default)]
    pub partition_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_files: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
}

/// A data file of a table snapshot (`file` line).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAction {
    pub url: String,
    pub id: String,
    #[serde(default)]
    pub partition_values: BTreeMap<String, Option<String>>,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<i64>,
}

/// A file referenced by a change data feed action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFile {
    pub url: String,
    pub id: String,
    #[serde(default)]
    pub partition_values: BTreeMap<String, Option<String>>,
    pub size: i64,
    pub version: i64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<i64>,
}

/// One change data feed action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Rows inserted by a data file added in `version`.
    Add(ChangeFile),
    /// Rows deleted by a data file removed in `version`.
    Remove(ChangeFile),
    /// Change data file carrying explicit `_change_type` rows.
    Cdf(ChangeFile),
}

impl ChangeAction {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Add(_) => ChangeKind::Add,
            Self::Remove(_) => ChangeKind::Remove,
            Self::Cdf(_) => ChangeKind::Cdf,
        }
    }

    pub fn file(&self) -> &ChangeFile {
        match self {
            Self::Add(f) | Self::Remove(f) | Self::Cdf(f) => f,
        }
    }

    pub fn from_kind(kind: ChangeKind, file: ChangeFile) -> Self {
        match kind {
            ChangeKind::Add => Self::Add(file),
            ChangeKind::Remove => Self::Remove(file),
            ChangeKind::Cdf => Self::Cdf(file),
        }
    }
}

/// Kind of a change data feed action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Cdf,
}

/// A single line of a metadata or query response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "protocol")]
    Protocol(Protocol),
    #[serde(rename = "metaData")]
    Metadata(Metadata),
    #[serde(rename = "file")]
    File(FileAction),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_action_is_externally_tagged() {
        let action = ChangeAction::Cdf(ChangeFile {
            url: "https://host/f.parquet".to_string(),
            id: "f1".to_string(),
            partition_values: BTreeMap::new(),
            size: 10,
            version: 3,
            timestamp: 1_700_000_000_000,
            stats: None,
            expiration_timestamp: None,
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["cdf"]["version"], 3);
        assert_eq!(json["cdf"]["partitionValues"], serde_json::json!({}));
        assert!(json["cdf"].get("stats").is_none());
    }

    #[test]
    fn test_metadata_defaults_format() {
        let json = r#"{"id":"t1","schemaString":"{}"}"#;
        let metadata: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.format.provider, "parquet");
        assert!(metadata.partition_columns.is_empty());
    }

    #[test]
    fn test_action_key_names() {
        let line = serde_json::to_string(&Action::Protocol(Protocol::default())).unwrap();
        assert_eq!(line, r#"{"protocol":{"minReaderVersion":1}}"#);
    }
}
