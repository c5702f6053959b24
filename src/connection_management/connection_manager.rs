use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::lease::{LeaseGuard, LeaseKey, LeaseRegistry};
use super::session::Session;
use super::types::{ConnectionSettings, MaintenanceReport, PoolKey, PoolStats};
use super::OperationKind;
use crate::error_handling::types::{ConnectionError, TransportError};
use crate::remote::{SourceDescriptor, Transport};

/// The structure related to remote connection management
///
/// This structure keeps one pooled session per source, opens new ones through
/// the configured transport with retry and backoff, and tracks in-progress
/// operations so that no two tasks work on the same remote path at once.
///
/// # Fields Overview
///
/// - `transport`: opens remote sessions
/// - `settings`: timeouts, thresholds and retry policy
/// - `pool`: live sessions by pool key, guarded by one lock never held across I/O
/// - `leases`: registry of in-progress operations
/// - counters for operator statistics
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    settings: ConnectionSettings,
    pool: Mutex<HashMap<PoolKey, Arc<Session>>>,
    leases: Arc<LeaseRegistry>,
    total_connects: AtomicU64,
    failed_connects: AtomicU64,
    evicted_sessions: AtomicU64,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, settings: ConnectionSettings) -> Self {
        let leases = Arc::new(LeaseRegistry::new(settings.lease_ttl));
        Self {
            transport,
            settings,
            pool: Mutex::new(HashMap::new()),
            leases,
            total_connects: AtomicU64::new(0),
            failed_connects: AtomicU64::new(0),
            evicted_sessions: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn pool(&self) -> MutexGuard<'_, HashMap<PoolKey, Arc<Session>>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the pooled healthy session of `source`, or opens a new one.
    ///
    /// With `force_new` the pool lookup is skipped; the new session still
    /// replaces (and closes) any pooled one.
    pub async fn acquire(
        &self,
        source: &SourceDescriptor,
        force_new: bool,
    ) -> Result<Arc<Session>, ConnectionError> {
        let credentials = source.credentials.as_ref().ok_or_else(|| {
            ConnectionError::AuthenticationFailed(format!("no credentials for source {}", source.id))
        })?;
        let key = PoolKey::for_source(source);

        if !force_new {
            let stale = {
                let mut pool = self.pool();
                if let Some(session) = pool.get(&key).filter(|s| s.is_healthy()).cloned() {
                    session.touch();
                    return Ok(session);
                }
                pool.remove(&key)
            };
            if let Some(stale) = stale {
                debug!("Dropping dead session {} for source {}", stale.id, source.id);
                self.evicted_sessions.fetch_add(1, Ordering::SeqCst);
                stale.close().await;
            }
        }

        let label = format!("connect {} ({})", source.endpoint, source.id);
        let connect_timeout = self.settings.connect_timeout;
        let transport = &self.transport;
        let endpoint = &source.endpoint;
        let failed = &self.failed_connects;
        let total = &self.total_connects;

        let remote = self
            .settings
            .retry
            .run(&label, move |attempt| async move {
                total.fetch_add(1, Ordering::SeqCst);
                debug!("Connecting to {} (attempt {})", endpoint, attempt);
                let result = match tokio::time::timeout(
                    connect_timeout,
                    transport.connect(endpoint, credentials),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(format!(
                        "connect to {} exceeded {:?}",
                        endpoint, connect_timeout
                    ))),
                };
                if result.is_err() {
                    failed.fetch_add(1, Ordering::SeqCst);
                }
                result
            })
            .await?;

        let session = Arc::new(Session::new(
            key.clone(),
            remote,
            self.settings.operation_timeout,
        ));
        let replaced = self.pool().insert(key, session.clone());
        if let Some(previous) = replaced {
            if previous.id != session.id {
                debug!(
                    "Replacing session {} with {} for source {}",
                    previous.id, session.id, source.id
                );
                previous.close().await;
            }
        }
        info!(
            "Opened session {} to {} for source {}",
            session.id, source.endpoint, source.id
        );
        Ok(session)
    }

    /// Marks activity on a session; it stays pooled.
    pub fn release(&self, session: &Session) {
        session.touch();
    }

    /// Removes `session` from the pool when it is still the pooled one, and
    /// closes it.
    pub async fn invalidate(&self, session: &Arc<Session>) {
        session.mark_dead();
        let removed = {
            let mut pool = self.pool();
            let pooled = pool
                .get(&session.key)
                .map(|p| p.id == session.id)
                .unwrap_or(false);
            if pooled {
                pool.remove(&session.key)
            } else {
                None
            }
        };
        if removed.is_some() {
            self.evicted_sessions.fetch_add(1, Ordering::SeqCst);
        }
        session.close().await;
    }

    /// Tears down every pooled session of `source_id`. Returns how many were
    /// closed.
    pub async fn disconnect(&self, source_id: &str) -> usize {
        let removed: Vec<Arc<Session>> = {
            let mut pool = self.pool();
            let keys: Vec<PoolKey> = pool
                .keys()
                .filter(|k| k.source_id == source_id)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| pool.remove(k)).collect()
        };
        for session in &removed {
            session.close().await;
        }
        if !removed.is_empty() {
            info!("Disconnected source {}", source_id);
        }
        removed.len()
    }

    /// Takes the lease for `(source, kind, path)`.
    pub fn lease(
        &self,
        source_id: &str,
        kind: OperationKind,
        path: &str,
    ) -> Result<LeaseGuard, ConnectionError> {
        self.leases.try_acquire(LeaseKey {
            source_id: source_id.to_string(),
            kind,
            path: path.to_string(),
        })
    }

    /// Runs `operation` under a lease. Fails with `OperationInProgress` when a
    /// live lease already holds the key. Operations running past the
    /// long-operation threshold are logged, not aborted.
    pub async fn with_lease<T, F, Fut>(
        &self,
        source_id: &str,
        kind: OperationKind,
        path: &str,
        operation: F,
    ) -> Result<T, ConnectionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ConnectionError>>,
    {
        let guard = self.lease(source_id, kind, path)?;
        let result = operation().await;
        let elapsed = guard.elapsed();
        if elapsed > self.settings.long_operation_threshold {
            warn!(
                "Long {} operation on {} for source {} took {:?}",
                kind, path, source_id, elapsed
            );
        }
        drop(guard);
        result
    }

    /// Reads a byte range, retrying transient failures through the retry
    /// policy with a fresh session for each further attempt.
    pub async fn read_range(
        &self,
        source: &SourceDescriptor,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> Result<Vec<u8>, ConnectionError> {
        let policy = &self.settings.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let session = self.acquire(source, false).await?;
            match session.read_range(path, offset, max_len).await {
                Ok(bytes) => {
                    self.release(&session);
                    return Ok(bytes);
                }
                Err(e) if !e.is_transient() => return Err(e.into()),
                Err(e) => {
                    self.invalidate(&session).await;
                    if attempt >= max_attempts {
                        return Err(ConnectionError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Read of {} for source {} failed (attempt {}/{}): {}, retrying in {:?}",
                        path, source.id, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Working-directory probe under the health timeout. A failed probe
    /// removes the session from the pool.
    pub async fn check_health(&self, session: &Arc<Session>) -> bool {
        match session.probe(self.settings.health_timeout).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    "Health check failed for session {} (source {}): {}",
                    session.id, session.key.source_id, e
                );
                self.invalidate(session).await;
                false
            }
        }
    }

    /// Evicts idle and dead sessions and reclaims expired leases. Per-session
    /// failures are logged and never abort the cycle.
    pub async fn run_maintenance_cycle(&self) -> MaintenanceReport {
        let idle_timeout = self.settings.idle_timeout;
        let mut report = MaintenanceReport::default();

        let evicted: Vec<(Arc<Session>, bool)> = {
            let mut pool = self.pool();
            let keys: Vec<(PoolKey, bool)> = pool
                .iter()
                .filter_map(|(key, session)| {
                    if !session.is_healthy() {
                        Some((key.clone(), false))
                    } else if session.idle_for() > idle_timeout {
                        Some((key.clone(), true))
                    } else {
                        None
                    }
                })
                .collect();
            keys.into_iter()
                .filter_map(|(key, idle)| pool.remove(&key).map(|s| (s, idle)))
                .collect()
        };

        for (session, idle) in evicted {
            if idle {
                report.evicted_idle += 1;
                debug!(
                    "Evicting idle session {} for source {} (idle {:?})",
                    session.id,
                    session.key.source_id,
                    session.idle_for()
                );
            } else {
                report.evicted_dead += 1;
                debug!(
                    "Evicting dead session {} for source {}",
                    session.id, session.key.source_id
                );
            }
            self.evicted_sessions.fetch_add(1, Ordering::SeqCst);
            let closing = session.clone();
            if let Err(e) = tokio::spawn(async move { closing.close().await }).await {
                error!("Closing session {} panicked: {}", session.id, e);
            }
        }

        report.reclaimed_leases = self.leases.reclaim_expired();
        if report != MaintenanceReport::default() {
            info!(
                "Maintenance: {} idle and {} dead session(s) evicted, {} lease(s) reclaimed",
                report.evicted_idle, report.evicted_dead, report.reclaimed_leases
            );
        }
        report
    }

    /// Runs [`Self::run_maintenance_cycle`] every `interval` until `shutdown`
    /// turns true.
    pub fn spawn_maintenance(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        manager.run_maintenance_cycle().await;
                        debug!("Maintenance cycle took {:?}", started.elapsed());
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Maintenance task stopped");
        })
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            pooled_sessions: self.pool().len(),
            live_leases: self.leases.live_count(),
            total_connects: self.total_connects.load(Ordering::SeqCst),
            failed_connects: self.failed_connects.load(Ordering::SeqCst),
            reclaimed_leases: self.leases.reclaimed_total(),
            evicted_sessions: self.evicted_sessions.load(Ordering::SeqCst),
        }
    }

    /// Closes every pooled session.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self.pool().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_management::RetryPolicy;
    use crate::remote::{Credentials, Endpoint, MemoryTransport};

    fn source(id: &str) -> SourceDescriptor {
        SourceDescriptor::new(
            id,
            Endpoint::new("10.0.0.1", 8822),
            Some(Credentials::new("admin", "secret")),
        )
    }

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            retry: RetryPolicy::immediate(3),
            ..ConnectionSettings::default()
        }
    }

    fn manager(t: &MemoryTransport, settings: ConnectionSettings) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(Arc::new(t.clone()), settings))
    }

    #[tokio::test]
    async fn acquire_reuses_pooled_session() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        let a = m.acquire(&source("s1"), false).await.unwrap();
        let b = m.acquire(&source("s1"), false).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(t.connect_attempts(), 1);

        let other = m.acquire(&source("s2"), false).await.unwrap();
        assert_ne!(a.id, other.id);
        assert_eq!(m.pool_stats().pooled_sessions, 2);
    }

    #[tokio::test]
    async fn force_new_replaces_and_closes_previous() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        let a = m.acquire(&source("s1"), false).await.unwrap();
        let b = m.acquire(&source("s1"), true).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(!a.is_healthy());
        assert_eq!(t.open_sessions(), 1);
        assert_eq!(m.pool_stats().pooled_sessions, 1);
    }

    #[tokio::test]
    async fn authentication_failure_is_attempted_once() {
        let t = MemoryTransport::new();
        t.reject_password("secret");
        let m = manager(&t, settings());
        let err = m.acquire(&source("s1"), false).await.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(t.connect_attempts(), 1);
        assert_eq!(m.pool_stats().failed_connects, 1);
    }

    #[tokio::test]
    async fn missing_credentials_never_connect() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        let mut s = source("s1");
        s.credentials = None;
        assert!(m.acquire(&s, false).await.unwrap_err().is_authentication());
        assert_eq!(t.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_max_attempts() {
        let t = MemoryTransport::new();
        t.fail_next_connects(5, TransportError::ConnectionReset("reset".into()));
        let m = manager(&t, settings());
        match m.acquire(&source("s1"), false).await {
            Err(ConnectionError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected {:?}", other.map(|s| s.id)),
        }
        assert_eq!(t.connect_attempts(), 3);

        // Two scripted failures remain; the third attempt succeeds.
        assert!(m.acquire(&source("s1"), false).await.is_ok());
        let stats = m.pool_stats();
        assert_eq!(stats.total_connects, 6);
        assert_eq!(stats.failed_connects, 5);
    }

    #[tokio::test]
    async fn connect_timeout_counts_as_transient() {
        let t = MemoryTransport::new();
        t.set_connect_delay(Some(Duration::from_millis(200)));
        let m = manager(
            &t,
            ConnectionSettings {
                connect_timeout: Duration::from_millis(20),
                retry: RetryPolicy::immediate(2),
                ..ConnectionSettings::default()
            },
        );
        match m.acquire(&source("s1"), false).await {
            Err(ConnectionError::RetriesExhausted { last_error, .. }) => {
                assert!(matches!(last_error, TransportError::Timeout(_)))
            }
            other => panic!("unexpected {:?}", other.map(|s| s.id)),
        }
        assert_eq!(t.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn lease_conflict_reports_operation_in_progress() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        let _held = m.lease("s1", OperationKind::Read, "/a.csv").unwrap();
        let result = m
            .with_lease("s1", OperationKind::Read, "/a.csv", || async { Ok(1) })
            .await;
        assert!(matches!(
            result,
            Err(ConnectionError::OperationInProgress { .. })
        ));
        let ok = m
            .with_lease("s1", OperationKind::Read, "/b.csv", || async { Ok(2) })
            .await;
        assert_eq!(ok.unwrap(), 2);
        assert_eq!(m.pool_stats().live_leases, 1);
    }

    #[tokio::test]
    async fn maintenance_evicts_idle_sessions_and_reclaims_leases() {
        let t = MemoryTransport::new();
        let m = manager(
            &t,
            ConnectionSettings {
                idle_timeout: Duration::from_millis(10),
                lease_ttl: Duration::from_millis(10),
                retry: RetryPolicy::immediate(1),
                ..ConnectionSettings::default()
            },
        );
        m.acquire(&source("s1"), false).await.unwrap();
        let _stuck = m.lease("s1", OperationKind::Read, "/a.csv").unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let report = m.run_maintenance_cycle().await;
        assert_eq!(report.evicted_idle, 1);
        assert_eq!(report.reclaimed_leases, 1);
        assert_eq!(t.open_sessions(), 0);
        assert_eq!(m.pool_stats().pooled_sessions, 0);
    }

    #[tokio::test]
    async fn failed_health_check_removes_session() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        let session = m.acquire(&source("s1"), false).await.unwrap();
        assert!(m.check_health(&session).await);

        t.set_failing_health(true);
        assert!(!m.check_health(&session).await);
        assert_eq!(m.pool_stats().pooled_sessions, 0);

        t.set_failing_health(false);
        let fresh = m.acquire(&source("s1"), false).await.unwrap();
        assert_ne!(fresh.id, session.id);
    }

    #[tokio::test]
    async fn read_retries_on_a_fresh_session() {
        let t = MemoryTransport::new();
        t.put_file("/h/a.csv", "payload");
        t.fail_next_reads(1, TransportError::ConnectionReset("reset".into()));
        let m = manager(&t, settings());

        let bytes = m.read_range(&source("s1"), "/h/a.csv", 0, None).await.unwrap();
        assert_eq!(bytes, b"payload");
        assert_eq!(t.successful_connects(), 2);
        assert_eq!(t.reads(), 2);
    }

    #[tokio::test]
    async fn disconnect_closes_source_sessions() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        m.acquire(&source("s1"), false).await.unwrap();
        m.acquire(&source("s2"), false).await.unwrap();
        assert_eq!(m.disconnect("s1").await, 1);
        assert_eq!(t.open_sessions(), 1);
        assert_eq!(m.disconnect("s1").await, 0);
    }

    #[tokio::test]
    async fn maintenance_task_stops_on_shutdown() {
        let t = MemoryTransport::new();
        let m = manager(&t, settings());
        let (tx, rx) = watch::channel(false);
        let handle = m.spawn_maintenance(Duration::from_millis(5), rx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
