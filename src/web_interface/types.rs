use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::connection_management::PoolStats;
use crate::ingestion::SourceStatus;

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceStatus>,
    pub pool: PoolStats,
}

#[derive(Debug, Serialize)]
pub struct ReprocessResponse {
    pub source_id: String,
    pub minutes: i64,
    pub watermark: DateTime<Utc>,
}
