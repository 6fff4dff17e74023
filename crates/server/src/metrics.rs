//! Prometheus metrics for the sharegate server.
//!
//! Exposes counters for credential validation, upstream traffic and
//! tolerated protocol decode failures.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no recipient identifiers or table names, only aggregate counts.
//!
//! **Deployment Requirement**: The `/metrics` endpoint MUST be network-restricted
//! to authorized Prometheus scraper IPs only. Do NOT expose `/metrics` on
//! public networks.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Credential metrics
pub static CREDENTIAL_VALIDATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharegate_credential_validations_total",
            "Bearer credential validations by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static CREDENTIALS_ISSUED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharegate_credentials_issued_total",
            "Credentials issued by kind (issue, rotate)",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static CREDENTIAL_INTEGRITY_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharegate_credential_integrity_failures_total",
        "Credentials whose stored hash failed re-verification after write",
    )
    .expect("metric creation failed")
});

// Service account metrics
pub static SERVICE_ACCOUNT_PROVISIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharegate_service_account_provisions_total",
        "Service account credentials provisioned",
    )
    .expect("metric creation failed")
});

// Upstream proxy metrics
pub static UPSTREAM_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharegate_upstream_requests_total",
            "Requests sent to the upstream sharing server by endpoint and status class",
        ),
        &["endpoint", "status"],
    )
    .expect("metric creation failed")
});

pub static UPSTREAM_FILES_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharegate_upstream_files_skipped_total",
        "Data files skipped because they could not be fetched or decoded",
    )
    .expect("metric creation failed")
});

pub static NDJSON_LINES_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharegate_ndjson_lines_skipped_total",
        "Malformed or unrecognized NDJSON lines dropped while decoding upstream responses",
    )
    .expect("metric creation failed")
});

// Authorization metrics
pub static ACCESS_DENIED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharegate_access_denied_total",
            "Data access requests denied by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(CREDENTIAL_VALIDATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CREDENTIALS_ISSUED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CREDENTIAL_INTEGRITY_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SERVICE_ACCOUNT_PROVISIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPSTREAM_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPSTREAM_FILES_SKIPPED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(NDJSON_LINES_SKIPPED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACCESS_DENIED.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the /metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record an upstream response under its status class (`2xx`, `4xx`, ...).
pub fn record_upstream_request(endpoint: &str, status: Option<u16>) {
    let class = match status {
        Some(code) => format!("{}xx", code / 100),
        None => "error".to_string(),
    };
    UPSTREAM_REQUESTS
        .with_label_values(&[endpoint, class.as_str()])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // This would panic if any metric creation failed
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_upstream_status_class() {
        let before = UPSTREAM_REQUESTS
            .with_label_values(&["metadata", "4xx"])
            .get();
        record_upstream_request("metadata", Some(404));
        let after = UPSTREAM_REQUESTS
            .with_label_values(&["metadata", "4xx"])
            .get();
        assert_eq!(after, before + 1);
    }
}
