//! Storage Traits
//!
//! This module defines the contracts between the ingestion core and its
//! storage collaborator:
//! - `EventSink`: accepts normalized events for persistence
//! - `WatermarkStore`: persists the per-source watermark across restarts
//! - `SourceDirectory`: looks up credentials and alternate id by source id
//!
//! Async methods return a `Result` so the coordinator can leave a target
//! uncommitted when delivery fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error_handling::types::StorageError;
use crate::events::Event;
use crate::remote::SourceDescriptor;

/// Receives the deduplicated event stream.
///
/// A successful `persist` means the batch is durable; the coordinator commits
/// read offsets only afterwards, so implementations should be idempotent on
/// redelivery.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn persist(&self, events: &[Event]) -> Result<(), StorageError>;
}

/// Per-source watermark persistence.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns the saved watermark of `source_id`, if any.
    async fn load(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Replaces the saved watermark of `source_id`.
    async fn save(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Credentials and alternate id lookup by source id.
pub trait SourceDirectory: Send + Sync {
    fn lookup(&self, source_id: &str) -> Option<SourceDescriptor>;

    /// Every known source id, sorted.
    fn source_ids(&self) -> Vec<String>;
}
