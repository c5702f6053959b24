pub mod configuration;
pub mod connection_management;
pub mod controller;
pub mod error_handling;
pub mod events;
pub mod ingestion;
pub mod parsing;
pub mod path_resolution;
pub mod remote;
pub mod storage;
pub mod web_interface;

pub use controller::Controller;
pub use events::{Event, EventKind};
pub use ingestion::Coordinator;
