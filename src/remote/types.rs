use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uniform stat answer of every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

impl FileInfo {
    pub fn file(size: u64, mod_time: Option<DateTime<Utc>>) -> Self {
        Self {
            size,
            mod_time,
            is_dir: false,
        }
    }

    pub fn dir() -> Self {
        Self {
            size: 0,
            mod_time: None,
            is_dir: true,
        }
    }
}

/// One entry of a directory listing. `name` is the bare child name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub info: FileInfo,
}

/// Network address of a game-server file endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host with any `:port` suffix removed; used for remote path
    /// construction.
    pub fn bare_host(&self) -> &str {
        match self.host.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => &self.host,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bare_host(), self.port)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A registered remote game server.
///
/// # Fields Overview
///
/// - `id`: stable source identifier; keys the pool, watermarks and events
/// - `endpoint`: transport address
/// - `credentials`: `None` until the directory provides them
/// - `alt_id`: optional identifier used only in remote path construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub alt_id: Option<String>,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, endpoint: Endpoint, credentials: Option<Credentials>) -> Self {
        Self {
            id: id.into(),
            endpoint,
            credentials,
            alt_id: None,
        }
    }

    /// Identifier used for the canonical remote root.
    pub fn path_id(&self) -> &str {
        match self.alt_id.as_deref() {
            Some(alt) if !alt.trim().is_empty() => alt,
            _ => &self.id,
        }
    }

    pub fn username(&self) -> &str {
        self.credentials
            .as_ref()
            .map(|c| c.username.as_str())
            .unwrap_or("")
    }
}
