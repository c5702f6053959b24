//! Error enums of every subsystem.

/// Submodule for the error types and their conversions.
pub mod types;
