//! Scripted in-memory transport.
//!
//! Holds a file tree in memory and lets callers inject failures: failed
//! connects, rejected credentials, failed reads and failed health probes. It
//! also counts connect attempts and open sessions so pool behaviour can be
//! observed.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::transport::{RemoteFs, RemoteSession, Transport};
use super::types::{Credentials, DirEntry, Endpoint, FileInfo};
use crate::error_handling::types::TransportError;

/// 2025-05-09T00:00:00Z; the memory clock counts seconds from here.
const CLOCK_BASE: i64 = 1_746_748_800;

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    mod_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, MemoryFile>,
    dirs: BTreeSet<String>,
    clock: i64,
    connect_failures: VecDeque<TransportError>,
    rejected_password: Option<String>,
    read_failures: VecDeque<TransportError>,
    failing_health: bool,
    partial_reads: bool,
    connect_delay: Option<Duration>,
    read_delay: Option<Duration>,
    connect_attempts: u32,
    successful_connects: u32,
    open_sessions: u32,
    reads: u32,
}

impl MemoryState {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp(CLOCK_BASE + self.clock, 0).unwrap_or_default()
    }

    fn is_dir(&self, path: &str) -> bool {
        if path == "/" || self.dirs.contains(path) {
            return true;
        }
        let prefix = format!("{}/", path);
        self.files.keys().any(|k| k.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// In-memory transport. Clones share the same tree and scripts.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let state = MemoryState {
            partial_reads: true,
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates or replaces a file and bumps its modification time.
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let mut state = self.state();
        let mod_time = state.tick();
        state.files.insert(
            normalize(path),
            MemoryFile {
                content: content.into(),
                mod_time,
            },
        );
    }

    /// Appends to a file, creating it when missing.
    pub fn append(&self, path: &str, content: &[u8]) {
        let mut state = self.state();
        let mod_time = state.tick();
        let file = state
            .files
            .entry(normalize(path))
            .or_insert_with(|| MemoryFile {
                content: Vec::new(),
                mod_time,
            });
        file.content.extend_from_slice(content);
        file.mod_time = mod_time;
    }

    pub fn create_dir(&self, path: &str) {
        self.state().dirs.insert(normalize(path));
    }

    pub fn remove(&self, path: &str) {
        self.state().files.remove(&normalize(path));
    }

    /// Fails the next `n` connect attempts with `error`.
    pub fn fail_next_connects(&self, n: usize, error: TransportError) {
        let mut state = self.state();
        for _ in 0..n {
            state.connect_failures.push_back(error.clone());
        }
    }

    /// Rejects every connect whose password equals `password`.
    pub fn reject_password(&self, password: &str) {
        self.state().rejected_password = Some(password.to_string());
    }

    /// Fails the next `n` ranged reads with `error`.
    pub fn fail_next_reads(&self, n: usize, error: TransportError) {
        let mut state = self.state();
        for _ in 0..n {
            state.read_failures.push_back(error.clone());
        }
    }

    pub fn set_failing_health(&self, failing: bool) {
        self.state().failing_health = failing;
    }

    pub fn set_partial_reads(&self, enabled: bool) {
        self.state().partial_reads = enabled;
    }

    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state().connect_delay = delay;
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state().read_delay = delay;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state().connect_attempts
    }

    pub fn successful_connects(&self) -> u32 {
        self.state().successful_connects
    }

    pub fn open_sessions(&self) -> u32 {
        self.state().open_sessions
    }

    pub fn reads(&self) -> u32 {
        self.state().reads
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, TransportError> {
        let delay = {
            let mut state = self.state();
            state.connect_attempts += 1;
            state.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.rejected_password.as_deref() == Some(credentials.password.as_str()) {
            return Err(TransportError::AuthenticationFailed(format!(
                "password rejected for {}",
                credentials.username
            )));
        }
        if let Some(err) = state.connect_failures.pop_front() {
            return Err(err);
        }
        state.successful_connects += 1;
        state.open_sessions += 1;
        Ok(Arc::new(MemorySession {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::ConnectionReset("session closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteFs for MemorySession {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        self.check_open()?;
        let state = self.state();
        let dir = normalize(path);
        if !state.is_dir(&dir) {
            return Err(TransportError::NotFound(dir));
        }
        let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };

        let mut children: BTreeMap<String, FileInfo> = BTreeMap::new();
        for (file_path, file) in &state.files {
            if let Some(rest) = file_path.strip_prefix(&prefix) {
                match rest.split_once('/') {
                    Some((child, _)) => {
                        children.insert(child.to_string(), FileInfo::dir());
                    }
                    None => {
                        children.insert(
                            rest.to_string(),
                            FileInfo::file(file.content.len() as u64, Some(file.mod_time)),
                        );
                    }
                }
            }
        }
        for d in &state.dirs {
            if let Some(rest) = d.strip_prefix(&prefix) {
                let child = rest.split('/').next().unwrap_or(rest);
                if !child.is_empty() {
                    children.entry(child.to_string()).or_insert_with(FileInfo::dir);
                }
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, info)| DirEntry { name, info })
            .collect())
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, TransportError> {
        self.check_open()?;
        let state = self.state();
        let path = normalize(path);
        if let Some(file) = state.files.get(&path) {
            return Ok(FileInfo::file(file.content.len() as u64, Some(file.mod_time)));
        }
        if state.is_dir(&path) {
            return Ok(FileInfo::dir());
        }
        Err(TransportError::NotFound(path))
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> Result<Vec<u8>, TransportError> {
        self.check_open()?;
        let delay = self.state().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.reads += 1;
        if let Some(err) = state.read_failures.pop_front() {
            return Err(err);
        }
        let path = normalize(path);
        let file = state
            .files
            .get(&path)
            .ok_or_else(|| TransportError::NotFound(path.clone()))?;

        let offset = if state.partial_reads { offset } else { 0 };
        let start = (offset as usize).min(file.content.len());
        let end = match max_len {
            Some(len) => start.saturating_add(len as usize).min(file.content.len()),
            None => file.content.len(),
        };
        Ok(file.content[start..end].to_vec())
    }

    async fn working_dir(&self) -> Result<String, TransportError> {
        self.check_open()?;
        if self.state().failing_health {
            return Err(TransportError::Timeout("health probe".to_string()));
        }
        Ok("/".to_string())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let mut state = self.state();
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
    }

    fn supports_partial_reads(&self) -> bool {
        self.state().partial_reads
    }
}
