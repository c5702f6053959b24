use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::OperationKind;
use crate::error_handling::types::ConnectionError;

/// Identity of an in-progress remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    pub source_id: String,
    pub kind: OperationKind,
    pub path: String,
}

#[derive(Debug)]
struct Lease {
    id: u64,
    started: Instant,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct LeaseState {
    leases: HashMap<LeaseKey, Lease>,
    next_id: u64,
    reclaimed: u64,
}

/// Registry of live operation leases.
///
/// A key can be held by one guard at a time. Leases past their time-to-live
/// are reclaimed, either by the next acquirer or by maintenance, and every
/// reclamation is logged.
#[derive(Debug)]
pub struct LeaseRegistry {
    state: Mutex<LeaseState>,
    ttl: Duration,
}

impl LeaseRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LeaseState::default()),
            ttl,
        }
    }

    fn state(&self) -> MutexGuard<'_, LeaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the lease for `key` or fails with `OperationInProgress` while a
    /// live lease holds it.
    pub fn try_acquire(self: &Arc<Self>, key: LeaseKey) -> Result<LeaseGuard, ConnectionError> {
        let now = Instant::now();
        let mut state = self.state();

        if let Some(existing) = state.leases.get(&key) {
            if existing.expires_at > now {
                debug!(
                    "Lease conflict on {} {} for source {}",
                    key.kind, key.path, key.source_id
                );
                return Err(ConnectionError::OperationInProgress {
                    source_id: key.source_id,
                    operation: key.kind.to_string(),
                    path: key.path,
                });
            }
            warn!(
                "Reclaiming expired {} lease on {} for source {} (held {:?})",
                key.kind,
                key.path,
                key.source_id,
                now.duration_since(existing.started)
            );
            state.reclaimed += 1;
        }

        state.next_id += 1;
        let id = state.next_id;
        state.leases.insert(
            key.clone(),
            Lease {
                id,
                started: now,
                expires_at: now + self.ttl,
            },
        );

        Ok(LeaseGuard {
            registry: Arc::clone(self),
            key,
            id,
            started: now,
        })
    }

    /// Drops every lease past its time-to-live. Returns how many were removed.
    pub fn reclaim_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state();
        let expired: Vec<LeaseKey> = state
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            if let Some(lease) = state.leases.remove(key) {
                warn!(
                    "Reclaimed expired {} lease on {} for source {} (held {:?})",
                    key.kind,
                    key.path,
                    key.source_id,
                    now.duration_since(lease.started)
                );
            }
        }
        state.reclaimed += expired.len() as u64;
        expired.len()
    }

    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        self.state()
            .leases
            .values()
            .filter(|lease| lease.expires_at > now)
            .count()
    }

    pub fn reclaimed_total(&self) -> u64 {
        self.state().reclaimed
    }

    /// Removes the lease only when `id` still owns it; a reclaimed lease's
    /// late guard must not release its successor.
    fn release(&self, key: &LeaseKey, id: u64) {
        let mut state = self.state();
        if state.leases.get(key).map(|l| l.id) == Some(id) {
            state.leases.remove(key);
        }
    }
}

/// Holds a lease until dropped.
#[derive(Debug)]
pub struct LeaseGuard {
    registry: Arc<LeaseRegistry>,
    key: LeaseKey,
    id: u64,
    started: Instant,
}

impl LeaseGuard {
    pub fn key(&self) -> &LeaseKey {
        &self.key
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.id);
    }
}
