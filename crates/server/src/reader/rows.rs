//! Parquet data file decoding into JSON rows.

use super::{ReaderError, ReaderResult};
use arrow_json::ArrayWriter;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Rows decoded from one data file.
#[derive(Debug, Default)]
pub struct DecodedRows {
    pub rows: Vec<Value>,
    /// Row count recorded in the file footer, regardless of `limit`.
    pub num_rows: u64,
}

/// Decode at most `limit` rows of a Parquet file.
pub fn decode_rows(bytes: Bytes, limit: Option<usize>) -> ReaderResult<DecodedRows> {
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| ReaderError::Parquet(format!("failed to read parquet footer: {e}")))?;
    let num_rows = u64::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);

    if limit == Some(0) {
        return Ok(DecodedRows {
            rows: Vec::new(),
            num_rows,
        });
    }
    if let Some(limit) = limit {
        builder = builder.with_limit(limit);
    }

    let reader = builder
        .build()
        .map_err(|e| ReaderError::Parquet(format!("failed to build parquet reader: {e}")))?;

    let mut writer = ArrayWriter::new(Vec::new());
    for batch in reader {
        let batch = batch
            .map_err(|e| ReaderError::Parquet(format!("failed to decode parquet batch: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| ReaderError::Parquet(format!("failed to write JSON: {e}")))?;
    }
    writer
        .finish()
        .map_err(|e| ReaderError::Parquet(format!("failed to finalize JSON: {e}")))?;

    let buffer = writer.into_inner();
    let rows = if buffer.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice(&buffer)
            .map_err(|e| ReaderError::Parquet(format!("invalid JSON rows: {e}")))?
    };

    Ok(DecodedRows { rows, num_rows })
}

/// Add partition column values, which Delta keeps out of the data files.
pub fn with_partition_values(
    rows: Vec<Value>,
    partition_values: &BTreeMap<String, Option<String>>,
) -> Vec<Value> {
    if partition_values.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|row| match row {
            Value::Object(mut object) => {
                insert_missing(&mut object, partition_values);
                Value::Object(object)
            }
            other => other,
        })
        .collect()
}

fn insert_missing(object: &mut Map<String, Value>, partition_values: &BTreeMap<String, Option<String>>) {
    for (column, value) in partition_values {
        object
            .entry(column.clone())
            .or_insert_with(|| value.clone().map_or(Value::Null, Value::String));
    }
}
