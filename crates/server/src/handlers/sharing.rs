//! Delta Sharing endpoints, authenticated with recipient credentials.
//!
//! A share the recipient holds no unexpired grant on is reported as not
//! found, never as forbidden, so share names do not leak.

use crate::auth::{AuthenticatedRecipient, require_recipient};
use crate::error::{ApiError, ApiResult};
use crate::grants::{GrantError, deny_label};
use crate::handlers::common::{ndjson_response, read_json_or_default};
use crate::proxy::upstream::TABLE_VERSION_HEADER;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use sharegate_core::protocol::{
    ChangeRange, Page, QueryRequest, QueryResponse, QueryWindow, RowPage, SchemaInfo, ShareInfo,
    TableInfo, TableStats, encode_action_stream, encode_change_stream, paginate,
};
use sharegate_core::{Authorization, GrantAction, ShareRef, TableRef};
use sharegate_metadata::models::{ShareRow, TableEntryRow};

/// Pagination parameters of list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl ListParams {
    fn page_size(&self, state: &AppState) -> usize {
        let max = state.config.server.max_page_size;
        self.max_results.unwrap_or(max).clamp(1, max) as usize
    }
}

/// Response of `GET /shares/{share}`.
#[derive(Debug, Serialize)]
pub struct GetShareResponse {
    pub share: ShareInfo,
}

fn share_info(share: &ShareRow) -> ShareInfo {
    ShareInfo {
        name: share.name.clone(),
        id: Some(share.share_id.to_string()),
    }
}

fn table_info(entry: TableEntryRow) -> TableInfo {
    TableInfo {
        name: entry.table_name,
        schema: entry.schema_name,
        share: entry.share_name,
        share_id: Some(entry.share_id.to_string()),
        id: Some(entry.table_id.to_string()),
    }
}

/// Resolve a share path segment the recipient is allowed to see.
async fn visible_share(
    state: &AppState,
    recipient: &AuthenticatedRecipient,
    share: &str,
) -> ApiResult<ShareRow> {
    let share_ref = ShareRef::parse(share)?;
    let row = match state.grants.resolve_share(&share_ref).await {
        Ok(row) => row,
        Err(GrantError::ShareNotFound(_)) => {
            return Err(ApiError::NotFound(format!("share {share_ref}")));
        }
        Err(e) => return Err(e.into()),
    };
    if !state
        .grants
        .has_grant(recipient.recipient_id, row.share_id)
        .await?
    {
        return Err(ApiError::NotFound(format!("share {share_ref}")));
    }
    Ok(row)
}

/// Check a data-access capability on a share.
async fn authorize(
    state: &AppState,
    recipient: &AuthenticatedRecipient,
    share: &ShareRow,
    action: GrantAction,
) -> ApiResult<Authorization> {
    let authorization = state
        .grants
        .is_authorized(recipient.recipient_id, share.share_id, action)
        .await?;
    match authorization.deny_reason {
        None if authorization.allowed => Ok(authorization),
        reason => Err(ApiError::Forbidden(format!(
            "{} not permitted on share {}: {}",
            action.as_str(),
            share.name,
            reason.map(deny_label).unwrap_or("denied")
        ))),
    }
}

fn table_ref(share: &ShareRow, schema: String, table: String) -> ApiResult<TableRef> {
    Ok(TableRef::new(ShareRef::Id(share.share_id), schema, table)?)
}

/// GET /delta-sharing/shares - Shares the recipient holds a grant on.
pub async fn list_shares(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    req: Request,
) -> ApiResult<Json<Page<ShareInfo>>> {
    let recipient = require_recipient(&req)?;
    let shares: Vec<ShareInfo> = state
        .grants
        .granted_shares(recipient.recipient_id)
        .await?
        .iter()
        .map(share_info)
        .collect();
    let page = paginate(
        &shares,
        params.page_size(&state),
        params.page_token.as_deref(),
    )?;
    Ok(Json(page))
}

/// GET /delta-sharing/shares/{share}
pub async fn get_share(
    State(state): State<AppState>,
    Path(share): Path<String>,
    req: Request,
) -> ApiResult<Json<GetShareResponse>> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    Ok(Json(GetShareResponse {
        share: share_info(&share),
    }))
}

/// GET /delta-sharing/shares/{share}/schemas
pub async fn list_schemas(
    State(state): State<AppState>,
    Path(share): Path<String>,
    Query(params): Query<ListParams>,
    req: Request,
) -> ApiResult<Json<Page<SchemaInfo>>> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let schemas: Vec<SchemaInfo> = state
        .metadata
        .list_schemas(share.share_id)
        .await?
        .into_iter()
        .map(|schema| SchemaInfo {
            name: schema.name,
            share: share.name.clone(),
        })
        .collect();
    let page = paginate(
        &schemas,
        params.page_size(&state),
        params.page_token.as_deref(),
    )?;
    Ok(Json(page))
}

/// GET /delta-sharing/shares/{share}/schemas/{schema}/tables
pub async fn list_tables(
    State(state): State<AppState>,
    Path((share, schema)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    req: Request,
) -> ApiResult<Json<Page<TableInfo>>> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    if state
        .metadata
        .get_schema(share.share_id, &schema)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!("schema {}.{schema}", share.name)));
    }

    let tables: Vec<TableInfo> = state
        .metadata
        .list_tables(share.share_id, Some(schema.as_str()))
        .await?
        .into_iter()
        .map(table_info)
        .collect();
    let page = paginate(
        &tables,
        params.page_size(&state),
        params.page_token.as_deref(),
    )?;
    Ok(Json(page))
}

/// GET /delta-sharing/shares/{share}/all-tables
pub async fn list_all_tables(
    State(state): State<AppState>,
    Path(share): Path<String>,
    Query(params): Query<ListParams>,
    req: Request,
) -> ApiResult<Json<Page<TableInfo>>> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let tables: Vec<TableInfo> = state
        .metadata
        .list_tables(share.share_id, None)
        .await?
        .into_iter()
        .map(table_info)
        .collect();
    let page = paginate(
        &tables,
        params.page_size(&state),
        params.page_token.as_deref(),
    )?;
    Ok(Json(page))
}

/// GET .../tables/{table}/version - Version in the `Delta-Table-Version` header.
pub async fn get_table_version(
    State(state): State<AppState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    req: Request,
) -> ApiResult<Response> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let table = table_ref(&share, schema, table)?;

    let version = state.proxy.table_version(&table).await?;
    Ok((
        StatusCode::OK,
        [(TABLE_VERSION_HEADER, version.to_string())],
    )
        .into_response())
}

/// GET .../tables/{table}/metadata - Protocol and metadata lines.
pub async fn get_table_metadata(
    State(state): State<AppState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    req: Request,
) -> ApiResult<Response> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let table = table_ref(&share, schema, table)?;

    let metadata = state.proxy.get_metadata(&table).await?;
    let version = metadata.version;
    let body = encode_action_stream(&QueryResponse {
        protocol: metadata.protocol,
        metadata: Some(metadata.metadata),
        files: Vec::new(),
    })?;

    let headers: Vec<(&'static str, String)> = version
        .map(|v| vec![(TABLE_VERSION_HEADER, v.to_string())])
        .unwrap_or_default();
    Ok(ndjson_response(body, &headers))
}

/// POST .../tables/{table}/query - File actions of a snapshot.
///
/// Needs the download capability. `limitHint` is capped at the grant's row ceiling.
pub async fn query_table(
    State(state): State<AppState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    req: Request,
) -> ApiResult<Response> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let table = table_ref(&share, schema, table)?;
    let authorization = authorize(&state, &recipient, &share, GrantAction::Download).await?;

    let mut request: QueryRequest = read_json_or_default(req).await?;
    request.limit_hint = authorization.clamp_rows(request.limit_hint);
    request.validate()?;

    let response = state.proxy.query_files(&table, &request).await?;
    tracing::debug!(
        recipient_id = %recipient.recipient_id,
        table = %table,
        files = response.files.len(),
        "Served table query"
    );
    let version = response.metadata.as_ref().and_then(|m| m.version);
    let body = encode_action_stream(&response)?;
    let headers: Vec<(&'static str, String)> = version
        .map(|v| vec![(TABLE_VERSION_HEADER, v.to_string())])
        .unwrap_or_default();
    Ok(ndjson_response(body, &headers))
}

/// GET .../tables/{table}/changes - Change data feed between versions or timestamps.
pub async fn get_table_changes(
    State(state): State<AppState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    Query(range): Query<ChangeRange>,
    req: Request,
) -> ApiResult<Response> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let table = table_ref(&share, schema, table)?;
    authorize(&state, &recipient, &share, GrantAction::Download).await?;
    range.validate()?;

    let response = state.proxy.query_changes(&table, &range).await?;
    let body = encode_change_stream(&response)?;
    Ok(ndjson_response(body, &[]))
}

/// POST .../tables/{table}/rows - Decoded rows, for the query capability.
///
/// The requested `limit` is capped at the grant's row ceiling.
pub async fn query_table_rows(
    State(state): State<AppState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    req: Request,
) -> ApiResult<Json<RowPage>> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let table = table_ref(&share, schema, table)?;
    let authorization = authorize(&state, &recipient, &share, GrantAction::Query).await?;

    let mut window: QueryWindow = read_json_or_default(req).await?;
    let requested = i64::try_from(window.limit).unwrap_or(i64::MAX);
    if let Some(limit) = authorization.clamp_rows(Some(requested)) {
        window.limit = u64::try_from(limit).unwrap_or(0);
    }

    let page = state.proxy.query(&table, window).await?;
    tracing::debug!(
        recipient_id = %recipient.recipient_id,
        table = %table,
        rows = page.rows.len(),
        total_rows = page.total_rows,
        "Served table rows"
    );
    Ok(Json(page))
}

/// GET .../tables/{table}/stats - Snapshot size, file and record counts.
pub async fn get_table_stats(
    State(state): State<AppState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    req: Request,
) -> ApiResult<Json<TableStats>> {
    let recipient = require_recipient(&req)?;
    let share = visible_share(&state, &recipient, &share).await?;
    let table = table_ref(&share, schema, table)?;
    authorize(&state, &recipient, &share, GrantAction::Query).await?;

    Ok(Json(state.proxy.table_stats(&table).await?))
}
