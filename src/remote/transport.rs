use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Credentials, DirEntry, Endpoint, FileInfo};
use crate::error_handling::types::TransportError;

/// Minimal remote filesystem view used by path discovery.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, TransportError>;

    async fn stat(&self, path: &str) -> Result<FileInfo, TransportError>;

    async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(TransportError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// A live connection to one remote endpoint.
#[async_trait]
pub trait RemoteSession: RemoteFs {
    /// Reads up to `max_len` bytes starting at `offset`; `None` reads to the
    /// end of the file.
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> Result<Vec<u8>, TransportError>;

    /// Cheap liveness probe.
    async fn working_dir(&self) -> Result<String, TransportError>;

    async fn close(&self);

    /// Whether `read_range` honours non-zero offsets. Sessions that cannot
    /// seek force full re-reads.
    fn supports_partial_reads(&self) -> bool {
        true
    }
}

/// Opens sessions for a transport kind.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, TransportError>;

    fn name(&self) -> &'static str;
}
