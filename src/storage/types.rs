use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted watermark of one source, as written by the file backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    pub source_id: String,
    pub watermark: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatermarkRecord {
    pub fn new(source_id: &str, watermark: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.to_string(),
            watermark,
            updated_at: Utc::now(),
        }
    }
}

/// Storage backend selected in the configuration file.
///
/// Variants:
/// - `Memory`: process-local, lost on exit
/// - `File`: JSON lines per source under a base directory
/// - `Database`: SQLite file through SeaORM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Database,
}

/// Turns a source id into a safe file name component.
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
