//! API error types.

use crate::credentials::CredentialError;
use crate::grants::GrantError;
use crate::proxy::ProxyError;
use crate::service_account::ServiceAccountError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sharegate_crypto::CryptoError;
use sharegate_metadata::MetadataError;

/// Message returned for every rejected bearer credential.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid or expired token";

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("core error: {0}")]
    Core(#[from] sharegate_core::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("grant error: {0}")]
    Grant(#[from] GrantError),

    #[error("service account error: {0}")]
    ServiceAccount(#[from] ServiceAccountError),

    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),
}

impl ApiError {
    pub fn invalid_token() -> Self {
        Self::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::Metadata(_) => "metadata_error",
            Self::Core(_) => "invalid_argument",
            Self::Crypto(_) => "internal_error",
            Self::Credential(e) => match e {
                CredentialError::CredentialNotFound(_) => "not_found",
                CredentialError::CredentialAlreadyIssued(_) => "conflict",
                CredentialError::CredentialIntegrityError(_) => "credential_integrity_error",
                _ => "internal_error",
            },
            Self::Grant(e) => match e {
                GrantError::GrantNotFound { .. } => "grant_not_found",
                GrantError::ShareNotFound(_) | GrantError::RecipientNotFound(_) => "not_found",
                GrantError::InvalidArgument(_) => "invalid_argument",
                GrantError::Metadata(_) => "metadata_error",
            },
            Self::ServiceAccount(_) => "service_account_error",
            Self::Proxy(e) => match e {
                ProxyError::NotFound(_) => "not_found",
                ProxyError::InvalidArgument(_) => "invalid_argument",
                ProxyError::UpstreamProtocolError { .. }
                | ProxyError::UpstreamTransport(_)
                | ProxyError::UpstreamDecode(_) => "upstream_error",
                ProxyError::LocalReadError { .. } => "local_read_error",
                ProxyError::ServiceAccount(_) => "service_account_error",
                ProxyError::Metadata(_) => "metadata_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => metadata_status(e),
            Self::Core(_) => StatusCode::BAD_REQUEST,
            Self::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Credential(e) => match e {
                CredentialError::CredentialNotFound(_) => StatusCode::NOT_FOUND,
                CredentialError::CredentialAlreadyIssued(_) => StatusCode::CONFLICT,
                CredentialError::Metadata(e) => metadata_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Grant(e) => match e {
                GrantError::GrantNotFound { .. }
                | GrantError::ShareNotFound(_)
                | GrantError::RecipientNotFound(_) => StatusCode::NOT_FOUND,
                GrantError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                GrantError::Metadata(e) => metadata_status(e),
            },
            Self::ServiceAccount(e) => match e {
                ServiceAccountError::NameConflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Proxy(e) => match e {
                ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
                ProxyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                ProxyError::UpstreamProtocolError { status: 404, .. } => StatusCode::NOT_FOUND,
                ProxyError::UpstreamProtocolError { .. }
                | ProxyError::UpstreamTransport(_)
                | ProxyError::UpstreamDecode(_) => StatusCode::BAD_GATEWAY,
                ProxyError::Metadata(e) => metadata_status(e),
                ProxyError::LocalReadError { .. } | ProxyError::ServiceAccount(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message safe to hand to the caller.
    ///
    /// Server-side failures get a generic message; details only go to the log.
    fn public_message(&self, status: StatusCode) -> String {
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
            StatusCode::BAD_GATEWAY => match self {
                Self::Proxy(ProxyError::UpstreamProtocolError { status, .. }) => {
                    format!("upstream returned status {status}")
                }
                _ => "upstream request failed".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

fn metadata_status(e: &MetadataError) -> StatusCode {
    match e {
        MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
        MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
        MetadataError::Constraint(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message(status),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
