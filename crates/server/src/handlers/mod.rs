//! HTTP request handlers.

pub mod admin;
pub mod common;
pub mod health;
pub mod sharing;

pub use admin::*;
pub use health::*;
pub use sharing::*;
