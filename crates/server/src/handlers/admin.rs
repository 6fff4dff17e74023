//! Administrative endpoints, authenticated with the admin token.

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::read_json;
use crate::service_account::{SYSTEM_RECIPIENT_NAME, ServiceAccountManager};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sharegate_core::table::validate_name;
use sharegate_core::{CredentialProfile, GrantOptions, IssuedCredential, RecipientId, ShareRef};
use sharegate_metadata::models::{AccessGrantRow, RecipientRow, SchemaRow, ShareRow, TableRow};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Recipients
// =============================================================================

/// Request to create a recipient.
#[derive(Debug, Deserialize)]
pub struct CreateRecipientRequest {
    pub name: String,
    pub description: Option<String>,
}

/// A freshly issued credential. The profile carries the only copy of the secret.
#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub recipient_id: String,
    pub token_id: String,
    pub token_hint: String,
    pub profile: CredentialProfile,
}

/// Recipient listing entry.
#[derive(Debug, Serialize)]
pub struct RecipientResponse {
    pub recipient_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Response for listing recipients.
#[derive(Debug, Serialize)]
pub struct ListRecipientsResponse {
    pub recipients: Vec<RecipientResponse>,
}

fn credential_response(state: &AppState, issued: &IssuedCredential) -> CredentialResponse {
    CredentialResponse {
        recipient_id: issued.recipient_id.to_string(),
        token_id: issued.token_id.to_string(),
        token_hint: issued.hint.clone(),
        profile: state.credentials.credential_profile(issued),
    }
}

fn parse_recipient_id(id: &str) -> ApiResult<RecipientId> {
    RecipientId::parse(id).map_err(|e| ApiError::BadRequest(format!("invalid recipient ID: {e}")))
}

/// Reject operations on the system recipient; it is managed through the
/// service-account endpoints.
async fn regular_recipient(state: &AppState, recipient_id: RecipientId) -> ApiResult<RecipientRow> {
    let row = state
        .metadata
        .get_recipient(*recipient_id.as_uuid())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("recipient {recipient_id}")))?;
    if row.is_system {
        return Err(ApiError::BadRequest(
            "the system recipient is managed through /v1/admin/service-account".to_string(),
        ));
    }
    Ok(row)
}

/// POST /v1/admin/recipients - Create a recipient and issue its first credential.
pub async fn create_recipient(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CredentialResponse>)> {
    require_admin(&req)?;
    let body: CreateRecipientRequest = read_json(req).await?;

    let name = body.name.trim().to_string();
    validate_name("recipient", &name)?;
    if name == SYSTEM_RECIPIENT_NAME {
        return Err(ApiError::Conflict(format!("recipient name '{name}' is reserved")));
    }

    let row = RecipientRow {
        recipient_id: Uuid::new_v4(),
        name,
        description: body.description,
        is_system: false,
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_recipient(&row).await?;
    tracing::info!(recipient_id = %row.recipient_id, name = %row.name, "Recipient created");

    let issued = state
        .credentials
        .issue(RecipientId::from(row.recipient_id))
        .await?;
    Ok((StatusCode::CREATED, Json(credential_response(&state, &issued))))
}

/// GET /v1/admin/recipients - List regular recipients.
pub async fn list_recipients(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ListRecipientsResponse>> {
    require_admin(&req)?;
    let recipients = state
        .metadata
        .list_recipients()
        .await?
        .into_iter()
        .filter(|row| !row.is_system)
        .map(|row| RecipientResponse {
            recipient_id: row.recipient_id.to_string(),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        })
        .collect();
    Ok(Json(ListRecipientsResponse { recipients }))
}

/// POST /v1/admin/recipients/{recipient_id}/rotate - Replace the active credential.
pub async fn rotate_recipient_credential(
    State(state): State<AppState>,
    Path(recipient_id): Path<String>,
    req: Request,
) -> ApiResult<Json<CredentialResponse>> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    regular_recipient(&state, recipient_id).await?;

    let issued = state.credentials.rotate(recipient_id).await?;
    Ok(Json(credential_response(&state, &issued)))
}

/// DELETE /v1/admin/recipients/{recipient_id} - Delete a recipient with its
/// credentials and grants.
pub async fn delete_recipient(
    State(state): State<AppState>,
    Path(recipient_id): Path<String>,
    req: Request,
) -> ApiResult<StatusCode> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    regular_recipient(&state, recipient_id).await?;

    if !state
        .metadata
        .delete_recipient(*recipient_id.as_uuid())
        .await?
    {
        return Err(ApiError::NotFound(format!("recipient {recipient_id}")));
    }
    tracing::info!(recipient_id = %recipient_id, "Recipient deleted");
    sync_service_account(state.service_account.as_ref()).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Catalog
// =============================================================================

/// Request to create a share.
#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Request to create a schema.
#[derive(Debug, Deserialize)]
pub struct CreateSchemaRequest {
    pub name: String,
}

/// Request to register a table.
#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub name: String,
    /// Storage location: a local path or `file://` URL.
    pub location: String,
}

/// Catalog object created.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub id: String,
    pub name: String,
}

async fn resolve_share(state: &AppState, share: &str) -> ApiResult<ShareRow> {
    let share_ref = ShareRef::parse(share)?;
    Ok(state.grants.resolve_share(&share_ref).await?)
}

/// Bring the service account's grants in line after shares or grants changed.
async fn sync_service_account(manager: Option<&Arc<ServiceAccountManager>>) {
    if let Some(manager) = manager
        && let Err(e) = manager.sync_grants().await
    {
        tracing::warn!(error = %e, "Failed to sync service account grants");
    }
}

/// POST /v1/admin/shares - Create a share.
pub async fn create_share(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CatalogResponse>)> {
    require_admin(&req)?;
    let body: CreateShareRequest = read_json(req).await?;
    let name = body.name.trim().to_string();
    validate_name("share", &name)?;
    if Uuid::parse_str(&name).is_ok() {
        return Err(ApiError::BadRequest(
            "share names cannot be UUIDs; they would be read as share IDs".to_string(),
        ));
    }

    let row = ShareRow {
        share_id: Uuid::new_v4(),
        name,
        description: body.description,
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_share(&row).await?;
    tracing::info!(share_id = %row.share_id, name = %row.name, "Share created");

    sync_service_account(state.service_account.as_ref()).await;

    Ok((
        StatusCode::CREATED,
        Json(CatalogResponse {
            id: row.share_id.to_string(),
            name: row.name,
        }),
    ))
}

/// POST /v1/admin/shares/{share}/schemas - Create a schema in a share.
pub async fn create_schema(
    State(state): State<AppState>,
    Path(share): Path<String>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CatalogResponse>)> {
    require_admin(&req)?;
    let share = resolve_share(&state, &share).await?;
    let body: CreateSchemaRequest = read_json(req).await?;
    let name = body.name.trim().to_string();
    validate_name("schema", &name)?;

    let row = SchemaRow {
        schema_id: Uuid::new_v4(),
        share_id: share.share_id,
        name,
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_schema(&row).await?;
    tracing::info!(share = %share.name, schema = %row.name, "Schema created");

    Ok((
        StatusCode::CREATED,
        Json(CatalogResponse {
            id: row.schema_id.to_string(),
            name: row.name,
        }),
    ))
}

/// POST /v1/admin/shares/{share}/schemas/{schema}/tables - Register a table.
pub async fn create_table(
    State(state): State<AppState>,
    Path((share, schema)): Path<(String, String)>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CatalogResponse>)> {
    require_admin(&req)?;
    let share = resolve_share(&state, &share).await?;
    let schema = state
        .metadata
        .get_schema(share.share_id, &schema)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("schema {}.{schema}", share.name)))?;

    let body: CreateTableRequest = read_json(req).await?;
    let name = body.name.trim().to_string();
    validate_name("table", &name)?;
    if body.location.trim().is_empty() {
        return Err(ApiError::BadRequest("table location is empty".to_string()));
    }

    let row = TableRow {
        table_id: Uuid::new_v4(),
        schema_id: schema.schema_id,
        name,
        location: body.location.trim().to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_table(&row).await?;
    tracing::info!(
        share = %share.name,
        schema = %schema.name,
        table = %row.name,
        location = %row.location,
        "Table registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(CatalogResponse {
            id: row.table_id.to_string(),
            name: row.name,
        }),
    ))
}

// =============================================================================
// Grants
// =============================================================================

/// Grant details.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub recipient_id: String,
    pub share_id: String,
    pub granted_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub granted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub can_download: bool,
    pub can_query: bool,
    pub max_rows_per_query: Option<i64>,
}

impl From<AccessGrantRow> for GrantResponse {
    fn from(row: AccessGrantRow) -> Self {
        Self {
            recipient_id: row.recipient_id.to_string(),
            share_id: row.share_id.to_string(),
            granted_by: row.granted_by,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            can_download: row.can_download,
            can_query: row.can_query,
            max_rows_per_query: row.max_rows_per_query,
        }
    }
}

/// Response for listing a recipient's grants.
#[derive(Debug, Serialize)]
pub struct ListGrantsResponse {
    pub grants: Vec<GrantResponse>,
}

/// Request to replace every grant of a recipient.
#[derive(Debug, Deserialize)]
pub struct ReplaceGrantsRequest {
    /// Share names or IDs.
    pub shares: Vec<String>,
    pub granted_by: Option<String>,
}

/// Response of a bulk grant operation.
#[derive(Debug, Serialize)]
pub struct GrantCountResponse {
    pub grants: u64,
}

/// GET /v1/admin/recipients/{recipient_id}/grants
pub async fn list_grants(
    State(state): State<AppState>,
    Path(recipient_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ListGrantsResponse>> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    let grants = state
        .metadata
        .list_grants_for_recipient(*recipient_id.as_uuid())
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();
    Ok(Json(ListGrantsResponse { grants }))
}

/// PUT /v1/admin/recipients/{recipient_id}/grants/{share} - Create or overlay a grant.
pub async fn put_grant(
    State(state): State<AppState>,
    Path((recipient_id, share)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<GrantResponse>> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    regular_recipient(&state, recipient_id).await?;
    let share = ShareRef::parse(&share)?;
    let options: GrantOptions = read_json(req).await?;

    let row = state.grants.grant(recipient_id, &share, &options).await?;
    sync_service_account(state.service_account.as_ref()).await;
    Ok(Json(row.into()))
}

/// PATCH /v1/admin/recipients/{recipient_id}/grants/{share} - Update an existing grant.
///
/// Fields absent from the body keep their stored values; `null` clears
/// nullable fields.
pub async fn patch_grant(
    State(state): State<AppState>,
    Path((recipient_id, share)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<GrantResponse>> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    regular_recipient(&state, recipient_id).await?;
    let share = ShareRef::parse(&share)?;
    let options: GrantOptions = read_json(req).await?;

    let row = state.grants.update(recipient_id, &share, &options).await?;
    sync_service_account(state.service_account.as_ref()).await;
    Ok(Json(row.into()))
}

/// DELETE /v1/admin/recipients/{recipient_id}/grants/{share} - Revoke a grant.
///
/// Revoking a grant that does not exist succeeds.
pub async fn delete_grant(
    State(state): State<AppState>,
    Path((recipient_id, share)): Path<(String, String)>,
    req: Request,
) -> ApiResult<StatusCode> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    regular_recipient(&state, recipient_id).await?;
    let share = ShareRef::parse(&share)?;

    state.grants.revoke(recipient_id, &share).await?;
    sync_service_account(state.service_account.as_ref()).await;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/admin/recipients/{recipient_id}/grants - Replace all grants.
pub async fn replace_grants(
    State(state): State<AppState>,
    Path(recipient_id): Path<String>,
    req: Request,
) -> ApiResult<Json<GrantCountResponse>> {
    require_admin(&req)?;
    let recipient_id = parse_recipient_id(&recipient_id)?;
    regular_recipient(&state, recipient_id).await?;
    let body: ReplaceGrantsRequest = read_json(req).await?;

    let shares = body
        .shares
        .iter()
        .map(|s| ShareRef::parse(s))
        .collect::<sharegate_core::Result<Vec<_>>>()?;
    let grants = state
        .grants
        .replace_all(recipient_id, &shares, body.granted_by.as_deref())
        .await?;
    sync_service_account(state.service_account.as_ref()).await;
    Ok(Json(GrantCountResponse { grants }))
}

// =============================================================================
// Service account
// =============================================================================

fn service_account(state: &AppState) -> ApiResult<&Arc<ServiceAccountManager>> {
    state.service_account.as_ref().ok_or_else(|| {
        ApiError::Conflict("service account requires secrets.passphrase".to_string())
    })
}

/// POST /v1/admin/service-account/rotate - Issue a new service account credential.
pub async fn rotate_service_account(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<StatusCode> {
    require_admin(&req)?;
    service_account(&state)?.rotate().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/service-account/sync - Grant the service account every share.
pub async fn sync_service_account_grants(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<GrantCountResponse>> {
    require_admin(&req)?;
    let grants = service_account(&state)?.sync_grants().await?;
    Ok(Json(GrantCountResponse { grants }))
}
