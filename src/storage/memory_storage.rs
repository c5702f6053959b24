use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use crate::error_handling::types::StorageError;
use crate::events::{DedupKey, Event};
use crate::storage::storage_trait::{EventSink, WatermarkStore};

#[derive(Debug, Default)]
struct MemoryContents {
    events: Vec<Event>,
    keys: HashSet<DedupKey>,
    watermarks: HashMap<String, DateTime<Utc>>,
    failing_writes: usize,
}

/// Process-local storage. Redelivered events (same dedup key) are ignored.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: Mutex<MemoryContents>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> MutexGuard<'_, MemoryContents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored events in delivery order.
    pub fn events(&self) -> Vec<Event> {
        self.contents().events.clone()
    }

    pub fn events_for(&self, source_id: &str) -> Vec<Event> {
        self.contents()
            .events
            .iter()
            .filter(|e| e.source_id == source_id)
            .cloned()
            .collect()
    }

    /// Makes the next `n` calls to `persist` fail.
    pub fn fail_next_writes(&self, n: usize) {
        self.contents().failing_writes = n;
    }
}

#[async_trait]
impl EventSink for MemoryStorage {
    async fn persist(&self, events: &[Event]) -> Result<(), StorageError> {
        let mut contents = self.contents();
        if contents.failing_writes > 0 {
            contents.failing_writes -= 1;
            return Err(StorageError::WriteFailed);
        }
        let mut stored = 0;
        for event in events {
            if contents.keys.insert(event.dedup_key()) {
                contents.events.push(event.clone());
                stored += 1;
            }
        }
        debug!("Stored {} of {} event(s) in memory", stored, events.len());
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for MemoryStorage {
    async fn load(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.contents().watermarks.get(source_id).copied())
    }

    async fn save(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<(), StorageError> {
        self.contents()
            .watermarks
            .insert(source_id.to_string(), watermark);
        Ok(())
    }
}
