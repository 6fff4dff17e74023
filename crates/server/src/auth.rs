//! Authentication middleware.
//!
//! Two kinds of bearer are accepted: the configured admin token, matched by
//! its SHA-256 hash, and recipient credentials, validated by the credential
//! authority. Handlers pick the principal they need from the request
//! extensions.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use sharegate_core::{RecipientId, TokenId};
use subtle::ConstantTimeEq;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Path prefix of the Delta Sharing surface.
pub const SHARING_PREFIX: &str = "/delta-sharing";

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request authenticated with a recipient credential.
#[derive(Clone, Copy, Debug)]
pub struct AuthenticatedRecipient {
    pub recipient_id: RecipientId,
    pub token_id: TokenId,
}

/// A request authenticated with the admin token.
#[derive(Clone, Copy, Debug)]
pub struct AdminPrincipal;

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
        .filter(|token| !token.is_empty())
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// SHA-256 hex digest of a bearer token.
pub fn hash_admin_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Constant-time check of a bearer against a configured SHA-256 hex hash.
fn matches_token_hash(token: &str, token_hash: &str) -> bool {
    let expected = token_hash.to_ascii_lowercase();
    hash_admin_token(token)
        .as_bytes()
        .ct_eq(expected.as_bytes())
        .into()
}

fn is_admin_token(state: &AppState, token: &str) -> bool {
    matches_token_hash(token, &state.config.admin.token_hash)
}

/// Authentication middleware that resolves the bearer and sets up trace context.
///
/// Requests without a usable bearer pass through unauthenticated; handlers
/// reject them with [`require_recipient`] or [`require_admin`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let bearer = extract_bearer_token(&req).map(str::to_string);
    if let Some(token) = bearer {
        if is_admin_token(&state, &token) {
            req.extensions_mut().insert(AdminPrincipal);
        } else if req.uri().path().starts_with(SHARING_PREFIX) {
            if let Some(validated) = state.credentials.validate(&token).await? {
                req.extensions_mut().insert(AuthenticatedRecipient {
                    recipient_id: validated.recipient_id,
                    token_id: validated.token_id,
                });
            }
        }
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require a valid recipient credential.
///
/// Missing, unknown, expired and revoked credentials all get the same 401.
pub fn require_recipient(req: &Request) -> ApiResult<AuthenticatedRecipient> {
    req.extensions()
        .get::<AuthenticatedRecipient>()
        .copied()
        .ok_or_else(ApiError::invalid_token)
}

/// Require the admin token.
pub fn require_admin(req: &Request) -> ApiResult<AdminPrincipal> {
    req.extensions()
        .get::<AdminPrincipal>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("admin token required".to_string()))
}
