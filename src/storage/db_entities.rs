//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the SQLite tables created by `database_storage`:
//! - `events`: normalized events, unique on their dedup key
//! - `watermarks`: one row per source

/// Events table entity models.
pub mod events {
    use sea_orm::entity::prelude::*;

    /// One normalized event. Timestamps are stored as Unix milliseconds.
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "events")]
    pub struct Model {
        /// Auto-increment row id, also the delivery order
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub dedup_key: String,
        pub source_id: String,
        /// `EventKind` as its lowercase name
        pub kind: String,
        pub timestamp_ms: i64,
        pub actor_name: Option<String>,
        pub actor_id: Option<String>,
        pub victim_name: Option<String>,
        pub victim_id: Option<String>,
        pub weapon: Option<String>,
        pub distance: Option<f64>,
        pub platform: Option<String>,
        pub victim_platform: Option<String>,
        pub location: Option<String>,
        pub detail: Option<String>,
        pub origin_file: String,
        pub origin_line: i64,
        /// Row carried no timestamp; `timestamp_ms` is the ingestion time
        pub timestamp_estimated: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Watermarks table entity models.
pub mod watermarks {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "watermarks")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub source_id: String,
        pub timestamp_ms: i64,
        /// RFC3339 time of the last save
        pub updated_at: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
