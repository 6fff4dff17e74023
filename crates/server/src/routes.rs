//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let sharing_routes = Router::new()
        .route("/delta-sharing/shares", get(handlers::list_shares))
        .route("/delta-sharing/shares/{share}", get(handlers::get_share))
        .route(
            "/delta-sharing/shares/{share}/schemas",
            get(handlers::list_schemas),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables",
            get(handlers::list_tables),
        )
        .route(
            "/delta-sharing/shares/{share}/all-tables",
            get(handlers::list_all_tables),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables/{table}/version",
            get(handlers::get_table_version),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables/{table}/metadata",
            get(handlers::get_table_metadata),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables/{table}/query",
            post(handlers::query_table),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables/{table}/changes",
            get(handlers::get_table_changes),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables/{table}/rows",
            post(handlers::query_table_rows),
        )
        .route(
            "/delta-sharing/shares/{share}/schemas/{schema}/tables/{table}/stats",
            get(handlers::get_table_stats),
        );

    let admin_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/admin/recipients",
            post(handlers::create_recipient).get(handlers::list_recipients),
        )
        .route(
            "/v1/admin/recipients/{recipient_id}",
            delete(handlers::delete_recipient),
        )
        .route(
            "/v1/admin/recipients/{recipient_id}/rotate",
            post(handlers::rotate_recipient_credential),
        )
        .route(
            "/v1/admin/recipients/{recipient_id}/grants",
            get(handlers::list_grants).put(handlers::replace_grants),
        )
        .route(
            "/v1/admin/recipients/{recipient_id}/grants/{share}",
            put(handlers::put_grant)
                .patch(handlers::patch_grant)
                .delete(handlers::delete_grant),
        )
        .route("/v1/admin/shares", post(handlers::create_share))
        .route(
            "/v1/admin/shares/{share}/schemas",
            post(handlers::create_schema),
        )
        .route(
            "/v1/admin/shares/{share}/schemas/{schema}/tables",
            post(handlers::create_table),
        )
        .route(
            "/v1/admin/service-account/rotate",
            post(handlers::rotate_service_account),
        )
        .route(
            "/v1/admin/service-account/sync",
            post(handlers::sync_service_account_grants),
        );

    let mut router = Router::new().merge(sharing_routes).merge(admin_routes);

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        // Auth middleware (resolves the bearer and sets the principal extension)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
