use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;

use crate::error_handling::types::StorageError;
use crate::events::{DedupKey, Event};
use crate::storage::storage_trait::{EventSink, WatermarkStore};
use crate::storage::types::{sanitize_component, WatermarkRecord};

/// Filesystem backend.
///
/// Layout under `base_path`:
/// - `events/<source>.jsonl`: one JSON event per line, appended
/// - `watermarks/<source>.json`: the last saved [`WatermarkRecord`]
pub struct FileStorage {
    base_path: PathBuf,
    keys: Mutex<HashSet<DedupKey>>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        for dir in [base_path.join("events"), base_path.join("watermarks")] {
            fs::create_dir_all(&dir).map_err(|e| {
                error!("Failed to create storage dir {}: {}", dir.display(), e);
                StorageError::WriteFailed
            })?;
        }
        let storage = Self {
            base_path,
            keys: Mutex::new(HashSet::new()),
        };
        let known = storage.index_existing()?;
        info!(
            "FileStorage initialized at {} ({} stored event(s))",
            storage.base_path.display(),
            known
        );
        Ok(storage)
    }

    /// Uses `KILLFEED_DATA_DIR` when set, otherwise the current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var("KILLFEED_DATA_DIR") {
            info!("Using FileStorage from KILLFEED_DATA_DIR: {}", dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::ReadFailed
        })?;
        Self::new(cwd)
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<DedupKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn events_path(&self, source_id: &str) -> PathBuf {
        self.base_path
            .join("events")
            .join(format!("{}.jsonl", sanitize_component(source_id)))
    }

    fn watermark_path(&self, source_id: &str) -> PathBuf {
        self.base_path
            .join("watermarks")
            .join(format!("{}.json", sanitize_component(source_id)))
    }

    /// Rebuilds the dedup key set from the event files already on disk.
    fn index_existing(&self) -> Result<usize, StorageError> {
        let dir = self.base_path.join("events");
        let entries = fs::read_dir(&dir).map_err(|e| {
            error!("Failed to read events dir {}: {}", dir.display(), e);
            StorageError::ReadFailed
        })?;
        let mut keys = self.keys();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| {
                error!("Failed to read {}: {}", path.display(), e);
                StorageError::ReadFailed
            })?;
            for event in parse_lines(&content, &path) {
                keys.insert(event.dedup_key());
            }
        }
        Ok(keys.len())
    }

    /// Every stored event of `source_id` in delivery order.
    pub async fn load_events(&self, source_id: &str) -> Result<Vec<Event>, StorageError> {
        let path = self.events_path(source_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(parse_lines(&content, &path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                Err(StorageError::ReadFailed)
            }
        }
    }
}

fn parse_lines(content: &str, path: &Path) -> Vec<Event> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Event>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Ignoring unreadable event line in {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl EventSink for FileStorage {
    async fn persist(&self, events: &[Event]) -> Result<(), StorageError> {
        // Group by source so each file is opened once per batch.
        let mut batches: HashMap<&str, (String, Vec<DedupKey>)> = HashMap::new();
        {
            let known = self.keys();
            let mut pending: HashSet<DedupKey> = HashSet::new();
            for event in events {
                let key = event.dedup_key();
                if known.contains(&key) || pending.contains(&key) {
                    continue;
                }
                let line = serde_json::to_string(event).map_err(|e| {
                    error!("Failed to serialize event: {}", e);
                    StorageError::WriteFailed
                })?;
                let (buf, keys) = batches.entry(event.source_id.as_str()).or_default();
                buf.push_str(&line);
                buf.push('\n');
                keys.push(key.clone());
                pending.insert(key);
            }
        }

        for (source_id, (buf, keys)) in batches {
            let path = self.events_path(source_id);
            let mut f = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| {
                    error!("Open append failed {}: {}", path.display(), e);
                    StorageError::WriteFailed
                })?;
            f.write_all(buf.as_bytes()).await.map_err(|e| {
                error!("Write failed {}: {}", path.display(), e);
                StorageError::WriteFailed
            })?;
            f.flush().await.map_err(|_| StorageError::WriteFailed)?;
            debug!("Appended {} event(s) to {}", keys.len(), path.display());
            self.keys().extend(keys);
        }
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for FileStorage {
    async fn load(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let path = self.watermark_path(source_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return Err(StorageError::ReadFailed);
            }
        };
        let record: WatermarkRecord = serde_json::from_str(&content).map_err(|e| {
            error!("Invalid watermark file {}: {}", path.display(), e);
            StorageError::ReadFailed
        })?;
        Ok(Some(record.watermark))
    }

    async fn save(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<(), StorageError> {
        let path = self.watermark_path(source_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&WatermarkRecord::new(source_id, watermark))
            .map_err(|_| StorageError::WriteFailed)?;
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            error!("Write failed {}: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            error!("Rename failed {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        debug!("Saved watermark {} for {}", watermark, source_id);
        Ok(())
    }
}
