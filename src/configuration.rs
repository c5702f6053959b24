//! Configuration file model and validation.

/// Submodule for the top-level `Config` and its loading.
pub mod config;
/// Submodule for the per-section structures.
pub mod types;

pub use config::Config;
pub use types::{SourceEntry, TransportKind};
