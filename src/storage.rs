//! Storage subsystem
//!
//! This module provides the contracts the ingestion core persists through and
//! the backends implementing them.
//!
//! Components:
//! - `storage_trait`: the `EventSink`, `WatermarkStore` and `SourceDirectory` traits.
//! - `types`: shared data types used by storage backends.
//! - `memory_storage`: process-local implementation, used by tests and `--once` runs.
//! - `file_storage`: filesystem-backed implementation for simple persistence and inspection.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `db_entities`: SeaORM entity models for the database backend.
//! - `source_directory`: static source table built from the configuration.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod memory_storage;
pub mod source_directory;
pub mod storage_trait;
pub mod types;
