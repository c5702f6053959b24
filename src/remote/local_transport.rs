use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::transport::{RemoteFs, RemoteSession, Transport};
use super::types::{Credentials, DirEntry, Endpoint, FileInfo};
use crate::error_handling::types::TransportError;

/// Serves remote paths out of a local directory. Remote `/a/b` maps to
/// `<root>/a/b`; endpoint and credentials are accepted as-is.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, TransportError> {
        let meta = tokio::fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(TransportError::NotFound(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        debug!(
            "Opened local session on {} for {}@{}",
            self.root.display(),
            credentials.username,
            endpoint
        );
        Ok(Arc::new(LocalSession {
            root: self.root.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[derive(Debug)]
pub struct LocalSession {
    root: PathBuf,
}

impl LocalSession {
    fn local_path(&self, remote: &str) -> Result<PathBuf, TransportError> {
        let relative = Path::new(remote.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(TransportError::PermissionDenied(format!(
                "path {} leaves the served directory",
                remote
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn file_info(meta: &std::fs::Metadata) -> FileInfo {
    FileInfo {
        size: if meta.is_dir() { 0 } else { meta.len() },
        mod_time: meta.modified().ok().map(DateTime::<Utc>::from),
        is_dir: meta.is_dir(),
    }
}

#[async_trait]
impl RemoteFs for LocalSession {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        let dir = self.local_path(path)?;
        let mut reader = tokio::fs::read_dir(&dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                info: file_info(&meta),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, TransportError> {
        let meta = tokio::fs::metadata(self.local_path(path)?).await?;
        Ok(file_info(&meta))
    }
}

#[async_trait]
impl RemoteSession for LocalSession {
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut file = tokio::fs::File::open(self.local_path(path)?).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = Vec::new();
        match max_len {
            Some(len) => {
                file.take(len).read_to_end(&mut buf).await?;
            }
            None => {
                file.read_to_end(&mut buf).await?;
            }
        }
        Ok(buf)
    }

    async fn working_dir(&self) -> Result<String, TransportError> {
        tokio::fs::metadata(&self.root).await?;
        Ok("/".to_string())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn session(dir: &TempDir) -> Arc<dyn RemoteSession> {
        LocalTransport::new(dir.path())
            .connect(&Endpoint::new("localhost", 22), &Credentials::new("u", "p"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn list_stat_and_ranged_read() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("h_1/Logs")).unwrap();
        std::fs::write(dir.path().join("h_1/Logs/Deadside.log"), b"0123456789").unwrap();

        let s = session(&dir).await;
        let entries = s.list("/h_1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Logs");
        assert!(entries[0].info.is_dir);

        let info = s.stat("/h_1/Logs/Deadside.log").await.unwrap();
        assert_eq!(info.size, 10);
        assert!(info.mod_time.is_some());

        assert_eq!(s.read_range("/h_1/Logs/Deadside.log", 4, Some(3)).await.unwrap(), b"456");
        assert_eq!(s.read_range("/h_1/Logs/Deadside.log", 8, None).await.unwrap(), b"89");
    }

    #[tokio::test]
    async fn missing_paths_are_not_found() {
        let dir = TempDir::new().unwrap();
        let s = session(&dir).await;
        assert!(matches!(s.stat("/nope").await, Err(TransportError::NotFound(_))));
        assert!(!s.exists("/nope").await.unwrap());
    }

    #[tokio::test]
    async fn parent_segments_are_refused() {
        let dir = TempDir::new().unwrap();
        let s = session(&dir).await;
        assert!(matches!(
            s.stat("/../etc/passwd").await,
            Err(TransportError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn connect_fails_on_missing_root() {
        let dir = TempDir::new().unwrap();
        let transport = LocalTransport::new(dir.path().join("absent"));
        let result = transport
            .connect(&Endpoint::new("localhost", 22), &Credentials::new("u", "p"))
            .await;
        assert!(matches!(result, Err(TransportError::NotFound(_))));
    }
}
