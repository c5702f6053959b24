//! Process wiring and lifecycle.

/// Submodule for the `Controller` driving the coordinator.
pub mod controller_handler;

pub use controller_handler::Controller;
