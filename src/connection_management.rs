//! Connection management core module.
//!
//! Owns the pooled remote sessions of every source, the retry/backoff policy
//! used when opening them, and the registry of in-progress remote operations.
//! Nothing here is process-global: the controller creates one
//! [`connection_manager::ConnectionManager`] and hands it to the coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Submodule for the session pool, health checks and maintenance.
pub mod connection_manager;
/// Submodule for operation leases and their guards.
pub mod lease;
/// Submodule for the connect/read retry policy.
pub mod retry;
/// Submodule for the pooled session wrapper.
pub mod session;
/// Submodule for pool keys, settings and statistics.
pub mod types;

pub use connection_manager::ConnectionManager;
pub use lease::{LeaseGuard, LeaseRegistry};
pub use retry::RetryPolicy;
pub use session::Session;
pub use types::{ConnectionSettings, MaintenanceReport, PoolKey, PoolStats};

/// Kind of remote operation guarded by a lease.
///
/// Variants:
/// - `List`: directory listing
/// - `Stat`: metadata lookup
/// - `Read`: incremental or full read of one target
/// - `Resolve`: path discovery for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    List,
    Stat,
    Read,
    Resolve,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::List => "list",
            OperationKind::Stat => "stat",
            OperationKind::Read => "read",
            OperationKind::Resolve => "resolve",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
