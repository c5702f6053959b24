//! Operator HTTP surface.
//!
//! A small JSON API over the coordinator: per-source status and watermark,
//! and the reprocess request that lowers a watermark.

use serde::Serialize;

/// Submodule for the warp filters.
pub mod routes;
/// Submodule for response payloads.
pub mod types;
/// Submodule for the server wrapper.
pub mod web_server;

pub use routes::*;
pub use web_server::*;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}
