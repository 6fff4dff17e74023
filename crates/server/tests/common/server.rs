//! Server test utilities.

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use sharegate_core::config::{AppConfig, MetadataConfig};
use sharegate_metadata::{MetadataStore, SqliteStore};
use sharegate_server::reader::DeltaLogReader;
use sharegate_server::{AppState, create_router};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Plaintext of the admin token configured by `AppConfig::for_testing`.
#[allow(dead_code)]
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a standalone-mode test server with a temporary metadata store.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("metadata.db");

        let mut config = AppConfig::for_testing();
        config.metadata = MetadataConfig::Sqlite {
            path: db_path.clone(),
        };
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let state = AppState::new(config, metadata, Arc::new(DeltaLogReader::new()))
            .expect("Failed to create app state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Scratch directory for table fixtures, removed with the server.
    pub fn data_dir(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join("tables").join(name)
    }

    /// Send a request and return status, headers and raw body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        auth_token: Option<&str>,
    ) -> (StatusCode, HeaderMap, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let text = String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8");
        (status, headers, text)
    }

    /// Send a request and parse the body as JSON (`Value::Null` when empty).
    pub async fn json_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Value) {
        let (status, _, text) = self.request(method, uri, body, auth_token).await;
        let json = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, json)
    }

    /// Create a recipient through the admin API and return `(recipient_id, bearer_token)`.
    pub async fn create_recipient(&self, name: &str) -> (String, String) {
        let (status, body) = self
            .json_request(
                Method::POST,
                "/v1/admin/recipients",
                Some(serde_json::json!({"name": name})),
                Some(ADMIN_TOKEN),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create recipient failed: {body}");
        (
            body["recipient_id"]
                .as_str()
                .expect("recipient_id")
                .to_string(),
            body["profile"]["bearerToken"]
                .as_str()
                .expect("bearerToken")
                .to_string(),
        )
    }

    /// Create a share, schema and table through the admin API.
    pub async fn create_table(&self, share: &str, schema: &str, table: &str, location: &str) {
        let (status, _) = self
            .json_request(
                Method::POST,
                "/v1/admin/shares",
                Some(serde_json::json!({"name": share})),
                Some(ADMIN_TOKEN),
            )
            .await;
        assert!(
            status == StatusCode::CREATED || status == StatusCode::CONFLICT,
            "create share failed: {status}"
        );

        let (status, _) = self
            .json_request(
                Method::POST,
                &format!("/v1/admin/shares/{share}/schemas"),
                Some(serde_json::json!({"name": schema})),
                Some(ADMIN_TOKEN),
            )
            .await;
        assert!(
            status == StatusCode::CREATED || status == StatusCode::CONFLICT,
            "create schema failed: {status}"
        );

        let (status, body) = self
            .json_request(
                Method::POST,
                &format!("/v1/admin/shares/{share}/schemas/{schema}/tables"),
                Some(serde_json::json!({"name": table, "location": location})),
                Some(ADMIN_TOKEN),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create table failed: {body}");
    }

    /// Grant a share to a recipient with the given options.
    pub async fn grant(&self, recipient_id: &str, share: &str, options: Value) -> Value {
        let (status, body) = self
            .json_request(
                Method::PUT,
                &format!("/v1/admin/recipients/{recipient_id}/grants/{share}"),
                Some(options),
                Some(ADMIN_TOKEN),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "grant failed: {body}");
        body
    }
}
