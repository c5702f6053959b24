use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::connection_management::{ConnectionSettings, RetryPolicy};
use crate::ingestion::IngestSettings;
use crate::remote::{Credentials, Endpoint, SourceDescriptor};
use crate::storage::types::StorageBackend;

/// `[ingest]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestSection {
    pub tick_interval_secs: u64,
    pub scan_timeout_secs: u64,
    pub max_read_bytes: Option<u64>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            scan_timeout_secs: 300,
            max_read_bytes: None,
        }
    }
}

impl IngestSection {
    pub fn to_settings(&self) -> IngestSettings {
        IngestSettings {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            scan_timeout: Duration::from_secs(self.scan_timeout_secs),
            max_read_bytes: self.max_read_bytes,
        }
    }
}

/// `[connection]` section. Durations are in seconds, retry delays in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    pub connect_timeout_secs: u64,
    pub operation_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub lease_ttl_secs: u64,
    pub long_operation_secs: u64,
    pub maintenance_interval_secs: u64,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            operation_timeout_secs: 60,
            health_timeout_secs: 5,
            idle_timeout_secs: 300,
            lease_ttl_secs: 300,
            long_operation_secs: 30,
            maintenance_interval_secs: 60,
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl ConnectionSection {
    pub fn to_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
            health_timeout: Duration::from_secs(self.health_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            lease_ttl: Duration::from_secs(self.lease_ttl_secs),
            long_operation_threshold: Duration::from_secs(self.long_operation_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_delay: Duration::from_millis(self.initial_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                jitter: self.jitter,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// Base directory of the file backend, or the SQLite file of the
    /// database backend. Defaults to the working directory.
    pub path: Option<PathBuf>,
}

/// `[web]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebSection {
    pub enabled: bool,
    pub port: u16,
    pub local_only: bool,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
            local_only: true,
        }
    }
}

/// Transport used to reach every source.
///
/// Variants:
/// - `Sftp`: SFTP servers, needs the `sftp` cargo feature
/// - `Local`: a local mirror directory standing in for the remote root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Sftp,
    Local,
}

/// `[transport]` section.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSection {
    pub kind: TransportKind,
    /// Mirror directory of the local transport.
    pub root: Option<PathBuf>,
}

/// One `[[sources]]` entry.
///
/// # Fields Overview
///
/// - `id`: stable source identifier
/// - `host` / `port`: file endpoint
/// - `username` / `password`: credentials; a source without both starts
///   disabled
/// - `password_env`: name of an environment variable holding the password,
///   read when `password` is absent
/// - `alt_id`: identifier used in remote path construction instead of `id`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    pub id: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default)]
    pub alt_id: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl SourceEntry {
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.as_ref()?;
        let password = match &self.password {
            Some(password) => password.clone(),
            None => std::env::var(self.password_env.as_ref()?).ok()?,
        };
        Some(Credentials::new(username.clone(), password))
    }

    pub fn to_descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            alt_id: self.alt_id.clone(),
            ..SourceDescriptor::new(
                self.id.clone(),
                Endpoint::new(self.host.clone(), self.port),
                self.credentials(),
            )
        }
    }
}
