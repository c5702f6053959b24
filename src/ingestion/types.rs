use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SourceState;
use crate::error_handling::types::{ConnectionError, IngestError, ResolveError};

/// Coordinator timing.
///
/// # Fields Overview
///
/// - `tick_interval`: period of the driver loop
/// - `scan_timeout`: bound on one source's whole tick
/// - `max_read_bytes`: cap on one incremental read; `None` reads to the end
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub tick_interval: Duration,
    pub scan_timeout: Duration,
    pub max_read_bytes: Option<u64>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            scan_timeout: Duration::from_secs(300),
            max_read_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetKind {
    Data,
    Log,
}

/// Outcome of one target within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetStatus {
    /// New content was consumed.
    Processed,
    /// Nothing new since the last tick.
    Unchanged,
    /// Content was consumed but every row was skipped.
    Suspect,
    /// Not touched this tick (lease conflict or deregistration).
    Skipped,
    /// Read, parse or delivery failed; retried next tick.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub path: String,
    pub kind: TargetKind,
    pub status: TargetStatus,
    pub emitted: usize,
    pub skipped_rows: usize,
    pub error: Option<String>,
}

impl TargetReport {
    pub fn new(path: &str, kind: TargetKind, status: TargetStatus) -> Self {
        Self {
            path: path.to_string(),
            kind,
            status,
            emitted: 0,
            skipped_rows: 0,
            error: None,
        }
    }

    pub fn failed(path: &str, kind: TargetKind, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(path, kind, TargetStatus::Failed)
        }
    }
}

/// What one source did during one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub source_id: String,
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: Vec<TargetReport>,
    pub emitted: usize,
    pub error: Option<String>,
}

/// Why a source was left out of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The previous tick of the source is still running.
    InFlight,
    Disabled,
}

#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub reports: Vec<TickReport>,
    pub skipped: Vec<(String, SkipReason)>,
}

impl TickSummary {
    pub fn emitted(&self) -> usize {
        self.reports.iter().map(|r| r.emitted).sum()
    }

    pub fn report(&self, source_id: &str) -> Option<&TickReport> {
        self.reports.iter().find(|r| r.source_id == source_id)
    }
}

/// Operator view of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub state: SourceState,
    pub status: String,
    pub watermark: Option<DateTime<Utc>>,
    pub last_tick: Option<TickReport>,
}

/// Human-readable status text for a failed source tick. Each failure
/// category gets its own wording.
pub fn describe_failure(err: &IngestError) -> String {
    match err {
        IngestError::MissingCredentials(_) => "disabled: missing credentials".to_string(),
        IngestError::SourceDisabled(reason) => format!("disabled: {}", reason),
        IngestError::Connection(e) if e.is_authentication() => {
            format!("disabled: authentication failed ({})", e)
        }
        IngestError::Connection(ConnectionError::RetriesExhausted { attempts, last_error }) => {
            format!(
                "unreachable after {} attempt(s): {}; retrying next tick",
                attempts, last_error
            )
        }
        IngestError::Connection(e) => format!("connection error: {}; retrying next tick", e),
        IngestError::Resolve(ResolveError::NotFound { attempted }) => format!(
            "no remote files found ({} path(s) tried); retrying next tick",
            attempted.len()
        ),
        IngestError::Resolve(ResolveError::Traversal(path)) => {
            format!("rejected remote path {}", path)
        }
        IngestError::Resolve(e) => format!("resolution error: {}; retrying next tick", e),
        IngestError::Storage(e) => format!("storage error: {}; retrying next tick", e),
        IngestError::TimedOut(e) => format!("scan timed out: {}", e),
        IngestError::UnknownSource(id) => format!("unknown source {}", id),
    }
}

/// Failures that keep a source disabled until its credentials change.
pub fn is_disabling(err: &IngestError) -> bool {
    match err {
        IngestError::MissingCredentials(_) | IngestError::SourceDisabled(_) => true,
        IngestError::Connection(e) => e.is_authentication(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::TransportError;

    #[test]
    fn failure_categories_have_distinct_texts() {
        let errors = vec![
            IngestError::MissingCredentials("1".into()),
            IngestError::Connection(ConnectionError::AuthenticationFailed("bad".into())),
            IngestError::Connection(ConnectionError::RetriesExhausted {
                attempts: 3,
                last_error: TransportError::Timeout("t".into()),
            }),
            IngestError::Resolve(ResolveError::NotFound {
                attempted: vec!["/a".into()],
            }),
            IngestError::Resolve(ResolveError::Traversal("/x".into())),
            IngestError::TimedOut("1".into()),
        ];
        let texts: Vec<String> = errors.iter().map(describe_failure).collect();
        for (i, a) in texts.iter().enumerate() {
            for b in texts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(texts[3].contains("1 path(s) tried"));
    }

    #[test]
    fn only_auth_and_credential_errors_disable() {
        assert!(is_disabling(&IngestError::MissingCredentials("1".into())));
        assert!(is_disabling(&IngestError::Connection(
            ConnectionError::AuthenticationFailed("x".into())
        )));
        assert!(!is_disabling(&IngestError::Connection(
            ConnectionError::RetriesExhausted {
                attempts: 3,
                last_error: TransportError::ConnectionReset("r".into()),
            }
        )));
        assert!(!is_disabling(&IngestError::Resolve(ResolveError::NotFound {
            attempted: vec![],
        })));
    }
}
