//! Delta Sharing credential authority and protocol proxy.
//!
//! This crate provides the HTTP server:
//! - Recipient credential issuance, rotation and validation
//! - Recipient-to-share access grants
//! - The internal service account used to reach an upstream server
//! - Delta Sharing endpoints served from an upstream server or local tables
//! - Admin endpoints for recipients, catalog, grants and the service account

pub mod auth;
pub mod bootstrap;
pub mod credentials;
pub mod error;
pub mod grants;
pub mod handlers;
pub mod metrics;
pub mod proxy;
pub mod reader;
pub mod routes;
pub mod service_account;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
