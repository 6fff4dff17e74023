//! Delta Sharing wire formats.

pub mod action;
pub mod codec;
pub mod list;
pub mod query;
pub mod schema;

pub use action::{Action, ChangeAction, ChangeFile, ChangeKind, FileAction, Format, Metadata, Protocol};
pub use codec::{
    DecodeReport, Decoded, decode_action_stream, decode_change_stream, encode_action_stream,
    encode_change_stream,
};
pub use list::{Page, SchemaInfo, ShareInfo, TableInfo, decode_paginated_list, paginate};
pub use query::{
    ChangeRange, ChangesResponse, QueryRequest, QueryResponse, QueryWindow, RowPage,
    TableMetadata, TableStats,
};
pub use schema::{Column, parse_schema_columns};
