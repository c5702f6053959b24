use std::time::Duration;

use serde::Serialize;

use super::retry::RetryPolicy;
use crate::remote::SourceDescriptor;

/// Identity of a pooled session. At most one healthy session exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub source_id: String,
}

impl PoolKey {
    pub fn for_source(source: &SourceDescriptor) -> Self {
        Self {
            host: source.endpoint.bare_host().to_string(),
            port: source.endpoint.port,
            username: source.username().to_string(),
            source_id: source.id.clone(),
        }
    }
}

/// Timeouts and thresholds of the connection manager.
///
/// # Fields Overview
///
/// - `connect_timeout`: bound on a single connect attempt
/// - `operation_timeout`: bound on a single list/stat/read
/// - `health_timeout`: bound on the working-directory probe
/// - `idle_timeout`: pooled sessions unused for longer are evicted
/// - `lease_ttl`: leases older than this are reclaimed
/// - `long_operation_threshold`: leased operations running longer are logged
/// - `retry`: backoff policy for connects and reads
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub health_timeout: Duration,
    pub idle_timeout: Duration,
    pub lease_ttl: Duration,
    pub long_operation_threshold: Duration,
    pub retry: RetryPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            lease_ttl: Duration::from_secs(300),
            long_operation_threshold: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Counters exposed to operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub pooled_sessions: usize,
    pub live_leases: usize,
    pub total_connects: u64,
    pub failed_connects: u64,
    pub reclaimed_leases: u64,
    pub evicted_sessions: u64,
}

/// What one maintenance cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub evicted_idle: usize,
    pub evicted_dead: usize,
    pub reclaimed_leases: usize,
}
