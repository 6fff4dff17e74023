//! NDJSON action stream decoding and encoding.
//!
//! Decoding is lenient: lines that are not JSON objects, carry no recognized
//! key, carry more than one key, or whose payload does not match the action
//! shape are logged and skipped. The caller learns how many lines were dropped
//! through [`DecodeReport`].

use super::action::{Action, ChangeAction, ChangeFile, FileAction, Metadata, Protocol};
use super::query::{ChangesResponse, QueryResponse};
use serde_json::{Map, Value};

const PROTOCOL_KEY: &str = "protocol";
const METADATA_KEY: &str = "metaData";
const FILE_KEY: &str = "file";
const ADD_KEY: &str = "add";
const REMOVE_KEY: &str = "remove";
const CDF_KEY: &str = "cdf";

/// Counts of what a decode pass consumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Non-blank lines seen.
    pub lines: usize,
    /// Lines dropped as malformed or unrecognized.
    pub skipped: usize,
}

/// A decoded value plus the report of skipped lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub report: DecodeReport,
}

enum StreamLine {
    Protocol(Protocol),
    Metadata(Metadata),
    File(FileAction),
    Change(ChangeAction),
}

/// Split an NDJSON body into single-key objects, keeping only `accepted` keys.
fn decode_lines<'a>(
    text: &'a str,
    accepted: &'a [&'static str],
    report: &'a mut DecodeReport,
) -> impl Iterator<Item = StreamLine> + 'a {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(move |(idx, line)| {
            report.lines += 1;
            match decode_line(line, accepted) {
                Ok(parsed) => Some(parsed),
                Err(reason) => {
                    report.skipped += 1;
                    tracing::warn!(line = idx + 1, reason = %reason, "Skipping NDJSON line");
                    None
                }
            }
        })
}

fn decode_line(line: &str, accepted: &[&'static str]) -> Result<StreamLine, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(object) = value else {
        return Err("line is not a JSON object".to_string());
    };
    let (key, payload) = single_entry(object)?;
    if !accepted.contains(&key.as_str()) {
        return Err(format!("unrecognized action '{key}'"));
    }

    let parsed = match key.as_str() {
        PROTOCOL_KEY => serde_json::from_value(payload).map(StreamLine::Protocol),
        METADATA_KEY => serde_json::from_value(payload).map(StreamLine::Metadata),
        FILE_KEY => serde_json::from_value(payload).map(StreamLine::File),
        ADD_KEY => serde_json::from_value::<ChangeFile>(payload)
            .map(|f| StreamLine::Change(ChangeAction::Add(f))),
        REMOVE_KEY => serde_json::from_value::<ChangeFile>(payload)
            .map(|f| StreamLine::Change(ChangeAction::Remove(f))),
        CDF_KEY => serde_json::from_value::<ChangeFile>(payload)
            .map(|f| StreamLine::Change(ChangeAction::Cdf(f))),
        _ => return Err(format!("unrecognized action '{key}'")),
    };
    parsed.map_err(|e| format!("malformed '{key}' action: {e}"))
}

fn single_entry(object: Map<String, Value>) -> Result<(String, Value), String> {
    let mut entries = object.into_iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        (None, _) => Err("empty object".to_string()),
        (Some(_), Some(_)) => Err("object has more than one action key".to_string()),
    }
}

fn require_header(
    protocol: &Option<Protocol>,
    metadata: &Option<Metadata>,
) -> crate::Result<()> {
    if protocol.is_none() && metadata.is_none() {
        return Err(crate::Error::Decode(
            "stream contains neither protocol nor metaData".to_string(),
        ));
    }
    Ok(())
}

/// Decode a metadata or query response (`protocol`, `metaData`, `file`).
pub fn decode_action_stream(text: &str) -> crate::Result<Decoded<QueryResponse>> {
    let mut report = DecodeReport::default();
    let mut protocol = None;
    let mut metadata = None;
    let mut files = Vec::new();

    for line in decode_lines(text, &[PROTOCOL_KEY, METADATA_KEY, FILE_KEY], &mut report) {
        match line {
            StreamLine::Protocol(p) => protocol = Some(p),
            StreamLine::Metadata(m) => metadata = Some(m),
            StreamLine::File(f) => files.push(f),
            StreamLine::Change(_) => {}
        }
    }

    require_header(&protocol, &metadata)?;
    Ok(Decoded {
        value: QueryResponse {
            protocol: protocol.unwrap_or_default(),
            metadata,
            files,
        },
        report,
    })
}

/// Decode a change data feed response (`protocol`, `metaData`, `add`, `remove`, `cdf`).
pub fn decode_change_stream(text: &str) -> crate::Result<Decoded<ChangesResponse>> {
    let mut report = DecodeReport::default();
    let mut protocol = None;
    let mut metadata = None;
    let mut actions = Vec::new();

    let accepted = [PROTOCOL_KEY, METADATA_KEY, ADD_KEY, REMOVE_KEY, CDF_KEY];
    for line in decode_lines(text, &accepted, &mut report) {
        match line {
            StreamLine::Protocol(p) => protocol = Some(p),
            StreamLine::Metadata(m) => metadata = Some(m),
            StreamLine::Change(c) => actions.push(c),
            StreamLine::File(_) => {}
        }
    }

    require_header(&protocol, &metadata)?;
    Ok(Decoded {
        value: ChangesResponse {
            protocol: protocol.unwrap_or_default(),
            metadata,
            actions,
        },
        report,
    })
}

fn push_line<T: serde::Serialize>(out: &mut String, value: &T) -> crate::Result<()> {
    out.push_str(&serde_json::to_string(value)?);
    out.push('\n');
    Ok(())
}

/// Encode a query response as NDJSON.
pub fn encode_action_stream(response: &QueryResponse) -> crate::Result<String> {
    let mut out = String::new();
    push_line(&mut out, &Action::Protocol(response.protocol.clone()))?;
    if let Some(metadata) = &response.metadata {
        push_line(&mut out, &Action::Metadata(metadata.clone()))?;
    }
    for file in &response.files {
        push_line(&mut out, &Action::File(file.clone()))?;
    }
    Ok(out)
}

/// Encode a change data feed response as NDJSON.
pub fn encode_change_stream(response: &ChangesResponse) -> crate::Result<String> {
    let mut out = String::new();
    push_line(&mut out, &Action::Protocol(response.protocol.clone()))?;
    if let Some(metadata) = &response.metadata {
        push_line(&mut out, &Action::Metadata(metadata.clone()))?;
    }
    for action in &response.actions {
        push_line(&mut out, action)?;
    }
    Ok(out)
}
