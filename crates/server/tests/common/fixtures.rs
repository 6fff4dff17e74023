//! Delta table fixtures written to a temporary directory.

use arrow_array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Schema of every fixture table: `id: long, name: string`.
#[allow(dead_code)]
pub const SCHEMA_STRING: &str = r#"{"type":"struct","fields":[{"name":"id","type":"long","nullable":false,"metadata":{}},{"name":"name","type":"string","nullable":true,"metadata":{}}]}"#;

/// Same columns plus a `region` partition column.
#[allow(dead_code)]
pub const PARTITIONED_SCHEMA_STRING: &str = r#"{"type":"struct","fields":[{"name":"id","type":"long","nullable":false,"metadata":{}},{"name":"name","type":"string","nullable":true,"metadata":{}},{"name":"region","type":"string","nullable":true,"metadata":{}}]}"#;

/// Encode rows `(id, "row-<id>")` as a Parquet file.
#[allow(dead_code)]
pub fn parquet_bytes(ids: &[i64]) -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    let names: Vec<Option<String>> = ids.iter().map(|i| Some(format!("row-{i}"))).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids.to_vec())),
            Arc::new(StringArray::from(names)),
        ],
    )
    .expect("Failed to build record batch");

    let mut buffer = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buffer, schema, None).expect("Failed to create parquet writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close parquet writer");
    buffer
}

#[allow(dead_code)]
pub fn protocol_action() -> Value {
    json!({"protocol": {"minReaderVersion": 1, "minWriterVersion": 2}})
}

#[allow(dead_code)]
pub fn metadata_action(schema_string: &str, partition_columns: &[&str]) -> Value {
    json!({"metaData": {
        "id": "fixture-table",
        "format": {"provider": "parquet", "options": {}},
        "schemaString": schema_string,
        "partitionColumns": partition_columns,
        "configuration": {"delta.enableChangeDataFeed": "true"},
        "createdTime": 1_700_000_000_000_i64
    }})
}

#[allow(dead_code)]
pub fn add_action(path: &str, size: i64, num_records: usize, partition_values: Value) -> Value {
    json!({"add": {
        "path": path,
        "partitionValues": partition_values,
        "size": size,
        "modificationTime": 1_700_000_000_000_i64,
        "dataChange": true,
        "stats": json!({"numRecords": num_records}).to_string()
    }})
}

#[allow(dead_code)]
pub fn remove_action(path: &str, size: i64) -> Value {
    json!({"remove": {
        "path": path,
        "deletionTimestamp": 1_700_000_000_000_i64,
        "dataChange": true,
        "size": size
    }})
}

#[allow(dead_code)]
pub fn commit_info(timestamp_ms: i64) -> Value {
    json!({"commitInfo": {"timestamp": timestamp_ms, "operation": "WRITE"}})
}

/// A Delta table under construction in a directory.
#[allow(dead_code)]
pub struct DeltaTableFixture {
    pub root: PathBuf,
    next_version: i64,
}

#[allow(dead_code)]
impl DeltaTableFixture {
    /// Create an empty table directory with its `_delta_log`.
    pub fn create(root: &Path) -> Self {
        std::fs::create_dir_all(root.join("_delta_log")).expect("Failed to create _delta_log");
        Self {
            root: root.to_path_buf(),
            next_version: 0,
        }
    }

    /// Location string as registered in the catalog.
    pub fn location(&self) -> String {
        self.root.display().to_string()
    }

    /// Write a data file and return an `add` action for it.
    pub fn data_file(&self, path: &str, ids: &[i64], partition_values: Value) -> Value {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create data directory");
        }
        let bytes = parquet_bytes(ids);
        std::fs::write(&full_path, &bytes).expect("Failed to write data file");
        add_action(path, bytes.len() as i64, ids.len(), partition_values)
    }

    /// Append a commit and return its version.
    pub fn commit(&mut self, actions: &[Value]) -> i64 {
        let version = self.next_version;
        let text: String = actions.iter().map(|a| format!("{a}\n")).collect();
        std::fs::write(
            self.root
                .join("_delta_log")
                .join(format!("{version:020}.json")),
            text,
        )
        .expect("Failed to write commit");
        self.next_version += 1;
        version
    }
}

/// Two-commit table with seven rows:
/// version 0 adds `part-0` (ids 1-3) and `part-1` (ids 4-5),
/// version 1 adds `part-2` (ids 6-7).
#[allow(dead_code)]
pub fn sample_table(root: &Path) -> DeltaTableFixture {
    let mut table = DeltaTableFixture::create(root);
    let part0 = table.data_file("part-0.parquet", &[1, 2, 3], json!({}));
    let part1 = table.data_file("part-1.parquet", &[4, 5], json!({}));
    table.commit(&[
        commit_info(1_700_000_000_000),
        protocol_action(),
        metadata_action(SCHEMA_STRING, &[]),
        part0,
        part1,
    ]);
    let part2 = table.data_file("part-2.parquet", &[6, 7], json!({}));
    table.commit(&[commit_info(1_700_000_100_000), part2]);
    table
}
