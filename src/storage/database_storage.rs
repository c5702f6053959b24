use std::env;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Schema,
};

use crate::error_handling::types::StorageError;
use crate::events::{Event, EventKind};
use crate::storage::db_entities::{events, watermarks};
use crate::storage::storage_trait::{EventSink, WatermarkStore};

/// SQLite backend through SeaORM.
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    /// Default database filename used in the application's working directory
    const DEFAULT_DB_FILE: &'static str = "killfeed.sqlite3";

    /// Create or open the database in the current working directory with the default filename
    pub async fn new() -> Result<Self, StorageError> {
        let cwd = env::current_dir().map_err(|_| StorageError::ConnectionFailed)?;
        Self::new_file(cwd.join(Self::DEFAULT_DB_FILE)).await
    }

    pub async fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|_| StorageError::WriteFailed)?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = Database::connect(&url).await.map_err(|e| {
            error!("Failed to open database {}: {}", path.display(), e);
            StorageError::ConnectionFailed
        })?;
        let storage = Self { db };
        storage.create_schema().await?;
        info!("DatabaseStorage initialized at {}", path.display());
        Ok(storage)
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut events_table = schema.create_table_from_entity(events::Entity);
        events_table.if_not_exists();
        let mut watermarks_table = schema.create_table_from_entity(watermarks::Entity);
        watermarks_table.if_not_exists();

        for stmt in [backend.build(&events_table), backend.build(&watermarks_table)] {
            self.db.execute(stmt).await.map_err(|e| {
                error!("Failed to create schema: {}", e);
                StorageError::WriteFailed
            })?;
        }
        Ok(())
    }

    /// Every stored event of `source_id`, oldest first.
    pub async fn load_events(&self, source_id: &str) -> Result<Vec<Event>, StorageError> {
        let rows = events::Entity::find()
            .filter(events::Column::SourceId.eq(source_id))
            .order_by_asc(events::Column::TimestampMs)
            .order_by_asc(events::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to load events of {}: {}", source_id, e);
                StorageError::ReadFailed
            })?;
        Ok(rows.into_iter().filter_map(into_event).collect())
    }
}

fn to_active(event: &Event) -> events::ActiveModel {
    events::ActiveModel {
        id: NotSet,
        dedup_key: Set(event.dedup_key().as_str().to_string()),
        source_id: Set(event.source_id.clone()),
        kind: Set(event.kind.as_str().to_string()),
        timestamp_ms: Set(event.timestamp.timestamp_millis()),
        actor_name: Set(event.actor_name.clone()),
        actor_id: Set(event.actor_id.clone()),
        victim_name: Set(event.victim_name.clone()),
        victim_id: Set(event.victim_id.clone()),
        weapon: Set(event.weapon.clone()),
        distance: Set(event.distance),
        platform: Set(event.platform.clone()),
        victim_platform: Set(event.victim_platform.clone()),
        location: Set(event.location.clone()),
        detail: Set(event.detail.clone()),
        origin_file: Set(event.origin_file.clone()),
        origin_line: Set(event.origin_line as i64),
        timestamp_estimated: Set(event.timestamp_estimated),
    }
}

fn into_event(row: events::Model) -> Option<Event> {
    let Some(kind) = EventKind::parse(&row.kind) else {
        warn!("Ignoring stored event {} with unknown kind {}", row.id, row.kind);
        return None;
    };
    let timestamp = DateTime::<Utc>::from_timestamp_millis(row.timestamp_ms)?;
    let mut event = Event::new(
        kind,
        timestamp,
        row.source_id,
        row.origin_file,
        row.origin_line.max(0) as usize,
    );
    event.actor_name = row.actor_name;
    event.actor_id = row.actor_id;
    event.victim_name = row.victim_name;
    event.victim_id = row.victim_id;
    event.weapon = row.weapon;
    event.distance = row.distance;
    event.platform = row.platform;
    event.victim_platform = row.victim_platform;
    event.location = row.location;
    event.detail = row.detail;
    event.timestamp_estimated = row.timestamp_estimated;
    Some(event)
}

#[async_trait]
impl EventSink for DatabaseStorage {
    async fn persist(&self, events: &[Event]) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }
        let inserted = events::Entity::insert_many(events.iter().map(to_active))
            .on_conflict(
                OnConflict::column(events::Column::DedupKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to insert {} event(s): {}", events.len(), e);
                StorageError::WriteFailed
            })?;
        debug!("Inserted {} of {} event(s)", inserted, events.len());
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for DatabaseStorage {
    async fn load(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row = watermarks::Entity::find_by_id(source_id.to_string())
            .one(&self.db)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        Ok(row.and_then(|r| DateTime::<Utc>::from_timestamp_millis(r.timestamp_ms)))
    }

    async fn save(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<(), StorageError> {
        let model = watermarks::ActiveModel {
            source_id: Set(source_id.to_string()),
            timestamp_ms: Set(watermark.timestamp_millis()),
            updated_at: Set(Utc::now().to_rfc3339()),
        };
        watermarks::Entity::insert(model)
            .on_conflict(
                OnConflict::column(watermarks::Column::SourceId)
                    .update_columns([watermarks::Column::TimestampMs, watermarks::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }
}
