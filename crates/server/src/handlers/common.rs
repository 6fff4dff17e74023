//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

/// Content type of Delta Sharing action streams.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson; charset=utf-8";

/// Maximum request body size for JSON endpoints (1 MiB).
pub const MAX_JSON_BODY_SIZE: usize = 1024 * 1024;

/// Read and parse a JSON request body.
///
/// An empty body parses as `T::default()`.
pub async fn read_json_or_default<T>(req: Request) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Read and parse a JSON request body that must be present.
pub async fn read_json<T: DeserializeOwned>(req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// 200 response carrying an NDJSON body.
pub fn ndjson_response(body: String, extra_headers: &[(&'static str, String)]) -> Response {
    let mut response = (StatusCode::OK, [(CONTENT_TYPE, NDJSON_CONTENT_TYPE)], Body::from(body))
        .into_response();
    for (name, value) in extra_headers {
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(*name, value);
        }
    }
    response
}
