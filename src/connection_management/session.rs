use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, trace};
use uuid::Uuid;

use super::types::PoolKey;
use crate::error_handling::types::TransportError;
use crate::remote::{DirEntry, FileInfo, RemoteFs, RemoteSession};

/// A pooled remote session.
///
/// Every operation is bounded by the operation timeout, bumps the operation
/// counter and refreshes the last-activity time. A transient failure marks
/// the session dead; the manager evicts dead sessions on the next acquire or
/// maintenance cycle.
pub struct Session {
    pub id: Uuid,
    pub key: PoolKey,
    pub created_at: DateTime<Utc>,
    remote: Arc<dyn RemoteSession>,
    last_activity: Mutex<Instant>,
    operations: AtomicU64,
    healthy: AtomicBool,
    operation_timeout: Duration,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("source_id", &self.key.source_id)
            .field("healthy", &self.is_healthy())
            .field("operations", &self.operations())
            .finish()
    }
}

impl Session {
    pub fn new(key: PoolKey, remote: Arc<dyn RemoteSession>, operation_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            created_at: Utc::now(),
            remote,
            last_activity: Mutex::new(Instant::now()),
            operations: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            operation_timeout,
        }
    }

    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        if self.healthy.swap(false, Ordering::SeqCst) {
            debug!("Session {} for source {} marked dead", self.id, self.key.source_id);
        }
    }

    /// Number of operations issued through this session.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn supports_partial_reads(&self) -> bool {
        self.remote.supports_partial_reads()
    }

    async fn timed<T, F>(&self, label: &str, path: &str, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>> + Send,
    {
        let seq = self.operations.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Session {} op #{} {} {}", self.id, seq, label, path);
        self.touch();

        let result = match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "{} {} exceeded {:?}",
                label, path, self.operation_timeout
            ))),
        };
        if let Err(e) = &result {
            if e.is_transient() {
                self.mark_dead();
            }
        }
        self.touch();
        result
    }

    pub async fn read_range(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> Result<Vec<u8>, TransportError> {
        self.timed("read", path, self.remote.read_range(path, offset, max_len))
            .await
    }

    /// Working-directory probe bounded by `timeout` instead of the operation
    /// timeout.
    pub async fn probe(&self, timeout: Duration) -> Result<String, TransportError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let result = match tokio::time::timeout(timeout, self.remote.working_dir()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!("health probe exceeded {:?}", timeout))),
        };
        if result.is_err() {
            self.mark_dead();
        } else {
            self.touch();
        }
        result
    }

    pub async fn close(&self) {
        self.mark_dead();
        self.remote.close().await;
        debug!(
            "Closed session {} for source {} after {} operation(s)",
            self.id,
            self.key.source_id,
            self.operations()
        );
    }
}

#[async_trait]
impl RemoteFs for Session {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        self.timed("list", path, self.remote.list(path)).await
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, TransportError> {
        self.timed("stat", path, self.remote.stat(path)).await
    }
}
