//! Poll/dedup coordinator core module.
//!
//! Turns remote file content into a deduplicated, ordered event stream. One
//! [`coordinator::Coordinator`] owns the per-source state (watermarks, read
//! cursors, dedup windows) and drives periodic ticks that fan out to one task
//! per registered source.

use serde::{Deserialize, Serialize};

/// Submodule for the coordinator and its driver loop.
pub mod coordinator;
/// Submodule for the per-source dedup window and the admission filter.
pub mod dedup;
/// Submodule turning parsed records into events.
pub mod normalizer;
/// Submodule for per-target read cursors.
pub mod target;
/// Submodule for settings, reports and statuses.
pub mod types;

pub use coordinator::Coordinator;
pub use dedup::DedupWindow;
pub use target::TargetCursor;
pub use types::{
    IngestSettings, SkipReason, SourceStatus, TargetKind, TargetReport, TargetStatus,
    TickReport, TickSummary,
};

/// Represents where a source currently is in its tick cycle.
///
/// Variants:
/// - `Idle`: waiting for the next tick.
/// - `Scanning`: acquiring a session and resolving targets.
/// - `Parsing`: reading and parsing targets.
/// - `Emitting`: delivering events to the sink.
/// - `Disabled`: stopped on a configuration or authentication error until
///   its credentials are updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    Idle,
    Scanning,
    Parsing,
    Emitting,
    Disabled,
}

impl SourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceState::Idle => "idle",
            SourceState::Scanning => "scanning",
            SourceState::Parsing => "parsing",
            SourceState::Emitting => "emitting",
            SourceState::Disabled => "disabled",
        }
    }
}
