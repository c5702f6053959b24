use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dedup_key::DedupKey;

/// Kind of a normalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Kill,
    Suicide,
    Connection,
    WorldEvent,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Kill => "kill",
            EventKind::Suicide => "suicide",
            EventKind::Connection => "connection",
            EventKind::WorldEvent => "world_event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kill" => Some(EventKind::Kill),
            "suicide" => Some(EventKind::Suicide),
            "connection" => Some(EventKind::Connection),
            "world_event" => Some(EventKind::WorldEvent),
            _ => None,
        }
    }
}

/// A normalized event emitted by the ingestion core.
///
/// Only `kind`, `timestamp` and `source_id` are always present; everything else
/// depends on the kind and on how much the remote row carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub actor_name: Option<String>,
    pub actor_id: Option<String>,
    pub victim_name: Option<String>,
    pub victim_id: Option<String>,
    pub weapon: Option<String>,
    pub distance: Option<f64>,
    pub platform: Option<String>,
    pub victim_platform: Option<String>,
    pub location: Option<String>,
    /// Connection action (`register`, `kick`, ...) or world event state.
    pub detail: Option<String>,
    /// Remote file the event was read from.
    pub origin_file: String,
    pub origin_line: usize,
    /// Set when the row carried no timestamp and `timestamp` is the time it
    /// was ingested.
    #[serde(default)]
    pub timestamp_estimated: bool,
}

impl Event {
    /// Creates an event with every optional field unset.
    pub fn new(
        kind: EventKind,
        timestamp: DateTime<Utc>,
        source_id: impl Into<String>,
        origin_file: impl Into<String>,
        origin_line: usize,
    ) -> Self {
        Self {
            kind,
            timestamp,
            source_id: source_id.into(),
            actor_name: None,
            actor_id: None,
            victim_name: None,
            victim_id: None,
            weapon: None,
            distance: None,
            platform: None,
            victim_platform: None,
            location: None,
            detail: None,
            origin_file: origin_file.into(),
            origin_line,
            timestamp_estimated: false,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::from_event(self)
    }
}
