//! HTTP API tests: admin endpoints and Delta Sharing endpoints end to end.

mod common;

use axum::http::{Method, StatusCode};
use common::{ADMIN_TOKEN, TestServer, sample_table};
use serde_json::{Value, json};
use sharegate_metadata::MetadataStore;

fn lines(body: &str) -> Vec<Value> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// A server with `sales.default.orders` backed by the sample table and a
/// recipient `acme` holding a grant with `options`.
async fn server_with_grant(options: Value) -> (TestServer, String, String) {
    let server = TestServer::new().await;
    let table = sample_table(&server.data_dir("orders"));
    server
        .create_table("sales", "default", "orders", &table.location())
        .await;
    let (recipient_id, token) = server.create_recipient("acme").await;
    server.grant(&recipient_id, "sales", options).await;
    (server, recipient_id, token)
}

const ORDERS: &str = "/delta-sharing/shares/sales/schemas/default/tables/orders";

#[tokio::test]
async fn test_health_is_unauthenticated() {
    let server = TestServer::new().await;
    let (status, body) = server
        .json_request(Method::GET, "/v1/health", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "standalone");
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_token() {
    let server = TestServer::new().await;
    let (_, recipient_token) = server.create_recipient("acme").await;

    let (status, body) = server
        .json_request(Method::GET, "/v1/admin/recipients", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    // a recipient credential is not an admin credential
    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/shares",
            Some(json!({"name": "sales"})),
            Some(&recipient_token),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .json_request(Method::GET, "/v1/admin/recipients", None, Some("wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_recipient_lifecycle() {
    let server = TestServer::new().await;

    let (status, created) = server
        .json_request(
            Method::POST,
            "/v1/admin/recipients",
            Some(json!({"name": "acme", "description": "Acme Corp"})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let recipient_id = created["recipient_id"].as_str().unwrap().to_string();
    let first = created["profile"]["bearerToken"].as_str().unwrap().to_string();
    assert_eq!(created["profile"]["shareCredentialsVersion"], 1);
    assert_eq!(
        created["profile"]["endpoint"],
        "http://127.0.0.1:8080/delta-sharing"
    );
    assert!(first.starts_with(created["token_hint"].as_str().unwrap()));

    let (status, listed) = server
        .json_request(Method::GET, "/v1/admin/recipients", None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["recipients"].as_array().unwrap().len(), 1);
    assert_eq!(listed["recipients"][0]["name"], "acme");
    assert_eq!(listed["recipients"][0]["description"], "Acme Corp");

    // duplicate names conflict
    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/recipients",
            Some(json!({"name": "acme"})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server
        .json_request(Method::GET, "/delta-sharing/shares", None, Some(&first))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, rotated) = server
        .json_request(
            Method::POST,
            &format!("/v1/admin/recipients/{recipient_id}/rotate"),
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = rotated["profile"]["bearerToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let (status, _) = server
        .json_request(Method::GET, "/delta-sharing/shares", None, Some(&first))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server
        .json_request(Method::GET, "/delta-sharing/shares", None, Some(&second))
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/v1/admin/recipients/{recipient_id}");
    let (status, _) = server
        .json_request(Method::DELETE, &uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server
        .json_request(Method::GET, "/delta-sharing/shares", None, Some(&second))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server
        .json_request(Method::DELETE, &uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recipient_request_validation() {
    let server = TestServer::new().await;

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/recipients",
            Some(json!({"name": "__system__"})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/recipients",
            Some(json!({"name": "  "})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/recipients/not-a-uuid/rotate",
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .json_request(
            Method::POST,
            &format!("/v1/admin/recipients/{}/rotate", uuid::Uuid::new_v4()),
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_creation() {
    let server = TestServer::new().await;
    let auth = Some(ADMIN_TOKEN);

    let (status, share) = server
        .json_request(Method::POST, "/v1/admin/shares", Some(json!({"name": "sales"})), auth)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(share["name"], "sales");

    let (status, _) = server
        .json_request(Method::POST, "/v1/admin/shares", Some(json!({"name": "sales"})), auth)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // would be ambiguous with share IDs
    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/shares",
            Some(json!({"name": uuid::Uuid::new_v4().to_string()})),
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/shares/missing/schemas",
            Some(json!({"name": "default"})),
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/shares/sales/schemas/missing/tables",
            Some(json!({"name": "orders", "location": "/tmp/orders"})),
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/shares/sales/schemas",
            Some(json!({"name": "default"})),
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/shares/sales/schemas/default/tables",
            Some(json!({"name": "orders", "location": " "})),
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // a share can be addressed by ID too
    let share_id = share["id"].as_str().unwrap();
    let (status, _) = server
        .json_request(
            Method::POST,
            &format!("/v1/admin/shares/{share_id}/schemas/default/tables"),
            Some(json!({"name": "orders", "location": "/tmp/orders"})),
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_grant_endpoints() {
    let server = TestServer::new().await;
    let table = sample_table(&server.data_dir("orders"));
    server
        .create_table("sales", "default", "orders", &table.location())
        .await;
    server
        .create_table("marketing", "default", "orders", &table.location())
        .await;
    let (recipient_id, _) = server.create_recipient("acme").await;
    let grant_uri = format!("/v1/admin/recipients/{recipient_id}/grants/sales");

    let granted = server
        .grant(
            &recipient_id,
            "sales",
            json!({
                "granted_by": "ops",
                "expires_at": "2099-01-01T00:00:00Z",
                "max_rows_per_query": 5
            }),
        )
        .await;
    assert_eq!(granted["granted_by"], "ops");
    assert_eq!(granted["expires_at"], "2099-01-01T00:00:00Z");
    assert_eq!(granted["can_download"], true);
    assert_eq!(granted["can_query"], true);
    assert_eq!(granted["max_rows_per_query"], 5);

    // absent fields keep their values, null clears
    let (status, patched) = server
        .json_request(
            Method::PATCH,
            &grant_uri,
            Some(json!({"expires_at": null, "can_query": false})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["expires_at"], Value::Null);
    assert_eq!(patched["can_query"], false);
    assert_eq!(patched["max_rows_per_query"], 5);
    assert_eq!(patched["granted_by"], "ops");

    let (status, _) = server
        .json_request(
            Method::PUT,
            &grant_uri,
            Some(json!({"max_rows_per_query": 0})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let list_uri = format!("/v1/admin/recipients/{recipient_id}/grants");
    let (_, listed) = server
        .json_request(Method::GET, &list_uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(listed["grants"].as_array().unwrap().len(), 1);

    let (status, replaced) = server
        .json_request(
            Method::PUT,
            &list_uri,
            Some(json!({"shares": ["sales", "marketing"], "granted_by": "sync"})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["grants"], 2);

    let (status, _) = server
        .json_request(
            Method::PUT,
            &list_uri,
            Some(json!({"shares": ["sales", "missing"]})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = server
        .json_request(Method::GET, &list_uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(listed["grants"].as_array().unwrap().len(), 2);

    let (status, _) = server
        .json_request(Method::DELETE, &grant_uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // revoking again is a no-op
    let (status, _) = server
        .json_request(Method::DELETE, &grant_uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = server
        .json_request(
            Method::PATCH,
            &grant_uri,
            Some(json!({"can_query": true})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "grant_not_found");

    let (status, _) = server
        .json_request(
            Method::PUT,
            &format!("/v1/admin/recipients/{recipient_id}/grants/missing"),
            Some(json!({})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let server = TestServer::new().await;

    for token in [None, Some("bogus")] {
        let (status, body) = server
            .json_request(Method::GET, "/delta-sharing/shares", None, token)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("invalid or expired token")
        );
    }
}

#[tokio::test]
async fn test_share_listing_and_pagination() {
    let server = TestServer::new().await;
    let table = sample_table(&server.data_dir("orders"));
    for share in ["alpha", "beta", "gamma", "hidden"] {
        server
            .create_table(share, "default", "orders", &table.location())
            .await;
    }
    let (recipient_id, token) = server.create_recipient("acme").await;
    for share in ["gamma", "alpha", "beta"] {
        server.grant(&recipient_id, share, json!({})).await;
    }

    let (status, page) = server
        .json_request(
            Method::GET,
            "/delta-sharing/shares?maxResults=2",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    let next = page["nextPageToken"].as_str().unwrap().to_string();

    let (_, page) = server
        .json_request(
            Method::GET,
            &format!("/delta-sharing/shares?maxResults=2&pageToken={next}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["name"], "gamma");
    assert!(page.get("nextPageToken").is_none());

    let (status, _) = server
        .json_request(
            Method::GET,
            "/delta-sharing/shares?pageToken=garbage",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // an ungranted share looks like a missing one
    let (status, _) = server
        .json_request(Method::GET, "/delta-sharing/shares/hidden", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server
        .json_request(
            Method::GET,
            "/delta-sharing/shares/hidden/schemas/default/tables/orders/version",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .json_request(Method::GET, "/delta-sharing/shares/alpha", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["share"]["name"], "alpha");
}

#[tokio::test]
async fn test_schema_and_table_listing() {
    let (server, _, token) = server_with_grant(json!({})).await;
    let auth = Some(token.as_str());

    let (status, schemas) = server
        .json_request(Method::GET, "/delta-sharing/shares/sales/schemas", None, auth)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schemas["items"][0]["name"], "default");
    assert_eq!(schemas["items"][0]["share"], "sales");

    let (status, tables) = server
        .json_request(
            Method::GET,
            "/delta-sharing/shares/sales/schemas/default/tables",
            None,
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tables["items"][0]["name"], "orders");
    assert_eq!(tables["items"][0]["schema"], "default");
    assert!(tables["items"][0]["shareId"].is_string());

    let (status, _) = server
        .json_request(
            Method::GET,
            "/delta-sharing/shares/sales/schemas/missing/tables",
            None,
            auth,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, all) = server
        .json_request(Method::GET, "/delta-sharing/shares/sales/all-tables", None, auth)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_version_and_metadata() {
    let (server, _, token) = server_with_grant(json!({})).await;

    let (status, headers, _) = server
        .request(Method::GET, &format!("{ORDERS}/version"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["delta-table-version"], "1");

    let (status, headers, body) = server
        .request(Method::GET, &format!("{ORDERS}/metadata"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["content-type"],
        "application/x-ndjson; charset=utf-8"
    );
    assert_eq!(headers["delta-table-version"], "1");
    let lines = lines(&body);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["protocol"]["minReaderVersion"], 1);
    assert!(lines[1]["metaData"]["schemaString"].is_string());

    let (status, _, _) = server
        .request(
            Method::GET,
            "/delta-sharing/shares/sales/schemas/default/tables/missing/metadata",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_limit_hint_is_capped_by_grant() {
    let (server, _, token) = server_with_grant(json!({"max_rows_per_query": 3})).await;

    // part-0 alone covers the three allowed rows
    let (status, headers, body) = server
        .request(
            Method::POST,
            &format!("{ORDERS}/query"),
            Some(json!({"limitHint": 100})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["delta-table-version"], "1");
    let lines = lines(&body);
    let files: Vec<&Value> = lines.iter().filter(|l| l.get("file").is_some()).collect();
    assert_eq!(files.len(), 1);

    // an empty body is an unconstrained query, still capped
    let (status, _, body) = server
        .request(Method::POST, &format!("{ORDERS}/query"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        lines_with_key(&body, "file"),
        1,
        "limit defaults to the grant ceiling"
    );

    let (status, _, _) = server
        .request(
            Method::POST,
            &format!("{ORDERS}/query"),
            Some(json!({"version": 0, "timestamp": "2023-11-14T22:14:10Z"})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn lines_with_key(body: &str, key: &str) -> usize {
    lines(body).iter().filter(|l| l.get(key).is_some()).count()
}

#[tokio::test]
async fn test_query_without_ceiling_returns_all_files() {
    let (server, _, token) = server_with_grant(json!({})).await;
    let (status, _, body) = server
        .request(
            Method::POST,
            &format!("{ORDERS}/query"),
            Some(json!({})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines_with_key(&body, "file"), 3);

    let (status, _, body) = server
        .request(
            Method::POST,
            &format!("{ORDERS}/query"),
            Some(json!({"version": 0})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines_with_key(&body, "file"), 2);
}

#[tokio::test]
async fn test_changes() {
    let (server, _, token) = server_with_grant(json!({})).await;

    let (status, headers, body) = server
        .request(
            Method::GET,
            &format!("{ORDERS}/changes?startingVersion=1"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["content-type"],
        "application/x-ndjson; charset=utf-8"
    );
    let lines = lines(&body);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["add"]["version"], 1);

    let (status, _, _) = server
        .request(Method::GET, &format!("{ORDERS}/changes"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = server
        .request(
            Method::GET,
            &format!("{ORDERS}/changes?startingVersion=2&endingVersion=1"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rows_are_capped_by_grant() {
    let (server, _, token) = server_with_grant(json!({"max_rows_per_query": 3})).await;

    let (status, page) = server
        .json_request(
            Method::POST,
            &format!("{ORDERS}/rows"),
            Some(json!({"limit": 10, "offset": 2})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = page["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 4, 5]);
    assert_eq!(page["totalRows"], 7);
    assert_eq!(page["hasMore"], true);
    assert_eq!(page["columns"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_table_stats() {
    let (server, recipient_id, token) = server_with_grant(json!({})).await;

    let (status, stats) = server
        .json_request(Method::GET, &format!("{ORDERS}/stats"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["version"], 1);
    assert_eq!(stats["numFiles"], 3);
    assert_eq!(stats["numRecords"], 7);
    assert!(stats["sizeInBytes"].as_u64().unwrap() > 0);

    server
        .grant(&recipient_id, "sales", json!({"can_query": false}))
        .await;
    let (status, _) = server
        .json_request(Method::GET, &format!("{ORDERS}/stats"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_disabled_capabilities_are_forbidden() {
    let (server, recipient_id, token) = server_with_grant(json!({"can_query": false})).await;

    let (status, body) = server
        .json_request(Method::POST, &format!("{ORDERS}/rows"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
    let (status, _, _) = server
        .request(Method::POST, &format!("{ORDERS}/query"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    server
        .grant(
            &recipient_id,
            "sales",
            json!({"can_query": true, "can_download": false}),
        )
        .await;
    let (status, _, _) = server
        .request(Method::POST, &format!("{ORDERS}/query"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = server
        .request(
            Method::GET,
            &format!("{ORDERS}/changes?startingVersion=0"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .json_request(Method::POST, &format!("{ORDERS}/rows"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    // metadata needs a grant but no capability
    let (status, _, _) = server
        .request(Method::GET, &format!("{ORDERS}/metadata"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_grant_hides_share() {
    let (server, _, token) =
        server_with_grant(json!({"expires_at": "2020-01-01T00:00:00Z"})).await;

    let (status, page) = server
        .json_request(Method::GET, "/delta-sharing/shares", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(page["items"].as_array().unwrap().is_empty());

    let (status, _, _) = server
        .request(Method::GET, &format!("{ORDERS}/version"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_service_account_endpoints() {
    let server = TestServer::new().await;
    server
        .create_table("sales", "default", "orders", "/tmp/orders")
        .await;

    // nothing to sync before the account exists
    let (status, body) = server
        .json_request(
            Method::POST,
            "/v1/admin/service-account/sync",
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["grants"], 0);

    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/service-account/rotate",
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // new shares are granted to the service account as they are created
    server
        .create_table("marketing", "default", "orders", "/tmp/orders")
        .await;
    let (status, body) = server
        .json_request(
            Method::POST,
            "/v1/admin/service-account/sync",
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["grants"], 2);

    // the system recipient stays out of the recipient API
    let (_, listed) = server
        .json_request(Method::GET, "/v1/admin/recipients", None, Some(ADMIN_TOKEN))
        .await;
    assert!(listed["recipients"].as_array().unwrap().is_empty());

    let system = server
        .metadata()
        .get_recipient_by_name("__system__")
        .await
        .unwrap()
        .unwrap();
    let (status, _) = server
        .json_request(
            Method::POST,
            &format!("/v1/admin/recipients/{}/rotate", system.recipient_id),
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_system_recipient_grants_are_protected() {
    let server = TestServer::new().await;
    server
        .create_table("sales", "default", "orders", "/tmp/orders")
        .await;
    let (status, _) = server
        .json_request(
            Method::POST,
            "/v1/admin/service-account/rotate",
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let system = server
        .metadata()
        .get_recipient_by_name("__system__")
        .await
        .unwrap()
        .unwrap();
    let grant_uri = format!("/v1/admin/recipients/{}/grants/sales", system.recipient_id);

    let (status, _) = server
        .json_request(
            Method::PATCH,
            &grant_uri,
            Some(json!({"can_download": false})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server
        .json_request(Method::DELETE, &grant_uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let grants = server
        .metadata()
        .list_grants_for_recipient(system.recipient_id)
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
    assert!(grants[0].can_download);
    assert!(grants[0].can_query);
}

#[tokio::test]
async fn test_grant_changes_resync_service_account() {
    let server = TestServer::new().await;
    server
        .create_table("sales", "default", "orders", "/tmp/orders")
        .await;
    server
        .json_request(
            Method::POST,
            "/v1/admin/service-account/rotate",
            None,
            Some(ADMIN_TOKEN),
        )
        .await;
    let system = server
        .metadata()
        .get_recipient_by_name("__system__")
        .await
        .unwrap()
        .unwrap();
    let sales = server
        .metadata()
        .get_share_by_name("sales")
        .await
        .unwrap()
        .unwrap();

    // drop the system grant behind the API's back
    server
        .metadata()
        .delete_grant(system.recipient_id, sales.share_id)
        .await
        .unwrap();

    let (recipient_id, _) = server.create_recipient("acme").await;
    let (status, _) = server
        .json_request(
            Method::PUT,
            &format!("/v1/admin/recipients/{recipient_id}/grants/sales"),
            Some(json!({})),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let grants = server
        .metadata()
        .list_grants_for_recipient(system.recipient_id)
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].share_id, sales.share_id);
}

#[tokio::test]
async fn test_service_account_endpoints_need_passphrase() {
    let server = TestServer::with_config(|config| config.secrets.passphrase = None).await;

    for uri in [
        "/v1/admin/service-account/rotate",
        "/v1/admin/service-account/sync",
    ] {
        let (status, body) = server
            .json_request(Method::POST, uri, None, Some(ADMIN_TOKEN))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    sharegate_server::metrics::register_metrics();
    let (server, _, token) = server_with_grant(json!({})).await;
    server
        .request(Method::GET, "/delta-sharing/shares", None, Some(&token))
        .await;

    let (status, headers, body) = server.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert!(body.contains("sharegate_credential_validations_total"));

    let server = TestServer::with_config(|config| config.server.metrics_enabled = false).await;
    let (status, _, _) = server.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
