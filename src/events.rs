//! Normalized event records.
//!
//! [`Event`] is the only artifact that crosses from the ingestion core into the
//! storage collaborator. [`DedupKey`] is derived from an event and used by the
//! coordinator to suppress re-emission of content seen through overlapping
//! read windows.

pub mod dedup_key;
pub mod event;

pub use dedup_key::DedupKey;
pub use event::{Event, EventKind};
