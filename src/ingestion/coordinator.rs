use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use super::dedup::{admit, DedupWindow};
use super::normalizer::{kill_event, log_event};
use super::target::{complete_lines, Observation, TargetCursor};
use super::types::{
    describe_failure, is_disabling, IngestSettings, SkipReason, SourceStatus, TargetKind,
    TargetReport, TargetStatus, TickReport, TickSummary,
};
use super::SourceState;
use crate::connection_management::{ConnectionManager, OperationKind, Session};
use crate::error_handling::types::{ConnectionError, IngestError, ResolveError};
use crate::events::Event;
use crate::parsing::delimiter::sample_lines;
use crate::parsing::row_parser::decode;
use crate::parsing::{detect_delimiter, parse_content, parse_log_content, parse_rows};
use crate::path_resolution::{PathResolver, Resolution, TimeWindow};
use crate::remote::{Credentials, RemoteFs, SourceDescriptor};
use crate::storage::storage_trait::{EventSink, SourceDirectory, WatermarkStore};

/// Read state of one source, owned by whichever task is ticking it.
#[derive(Debug, Default)]
struct SourceWork {
    cursors: HashMap<String, TargetCursor>,
    dedup: DedupWindow,
    /// Lower bound for targets seen for the first time: the persisted
    /// watermark at registration, or the last operator override.
    floor: Option<DateTime<Utc>>,
    /// Start of a pending `reprocess_last` window. The next scan re-reads
    /// only the data files that may hold events after it.
    reprocess_from: Option<DateTime<Utc>>,
}

impl SourceWork {
    fn lowest_target_watermark(&self) -> Option<DateTime<Utc>> {
        self.cursors.values().filter_map(|c| c.watermark).min()
    }
}

struct SourceSlot {
    descriptor: SourceDescriptor,
    state: SourceState,
    status: String,
    watermark: Option<DateTime<Utc>>,
    last_tick: Option<TickReport>,
    active: Arc<AtomicBool>,
    work: Arc<AsyncMutex<SourceWork>>,
}

impl SourceSlot {
    fn status(&self) -> SourceStatus {
        SourceStatus {
            source_id: self.descriptor.id.clone(),
            state: self.state,
            status: self.status.clone(),
            watermark: self.watermark,
            last_tick: self.last_tick.clone(),
        }
    }
}

struct ScanResult {
    report: TickReport,
    events: Vec<Event>,
    error: Option<IngestError>,
}

/// The structure related to polling and deduplication
///
/// This structure keeps the registered sources with their watermarks, read
/// cursors and dedup windows, and runs ticks that turn new remote content
/// into events delivered to the sink.
///
/// # Fields Overview
///
/// - `manager`: pooled sessions, leases and ranged reads
/// - `resolver`: locates log and data files under each source root
/// - `sink` / `watermarks`: storage collaborators
/// - `directory`: optional source lookup used by [`Coordinator::register_id`]
/// - `sources`: registry of sources; the lock is never held across I/O
/// - `ticks`: tick counter, also the key of the resolver's per-tick cache
pub struct Coordinator {
    manager: Arc<ConnectionManager>,
    resolver: Arc<PathResolver>,
    sink: Arc<dyn EventSink>,
    watermarks: Arc<dyn WatermarkStore>,
    directory: Option<Arc<dyn SourceDirectory>>,
    settings: IngestSettings,
    sources: Mutex<HashMap<String, SourceSlot>>,
    ticks: AtomicU64,
}

impl Coordinator {
    pub fn new(
        manager: Arc<ConnectionManager>,
        resolver: Arc<PathResolver>,
        sink: Arc<dyn EventSink>,
        watermarks: Arc<dyn WatermarkStore>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            manager,
            resolver,
            sink,
            watermarks,
            directory: None,
            settings,
            sources: Mutex::new(HashMap::new()),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn SourceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    fn sources(&self) -> MutexGuard<'_, HashMap<String, SourceSlot>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `source`, loading its persisted watermark. Registering an
    /// existing id refreshes its descriptor and keeps its read state.
    pub async fn register(&self, source: SourceDescriptor) -> Result<(), IngestError> {
        let loaded = self.watermarks.load(&source.id).await?;
        let (state, status) = if source.credentials.is_none() {
            let err = IngestError::MissingCredentials(source.id.clone());
            warn!("[{}] registered without credentials; disabled", source.id);
            (SourceState::Disabled, describe_failure(&err))
        } else {
            (SourceState::Idle, "registered".to_string())
        };

        let mut sources = self.sources();
        match sources.get_mut(&source.id) {
            Some(slot) => {
                debug!("[{}] re-registered", source.id);
                slot.descriptor = source;
                slot.state = state;
                slot.status = status;
            }
            None => {
                info!(
                    "[{}] registered {} (watermark {:?})",
                    source.id, source.endpoint, loaded
                );
                let work = SourceWork {
                    floor: loaded,
                    ..SourceWork::default()
                };
                sources.insert(
                    source.id.clone(),
                    SourceSlot {
                        descriptor: source,
                        state,
                        status,
                        watermark: loaded,
                        last_tick: None,
                        active: Arc::new(AtomicBool::new(true)),
                        work: Arc::new(AsyncMutex::new(work)),
                    },
                );
            }
        }
        Ok(())
    }

    /// Registers a source by id through the source directory.
    pub async fn register_id(&self, source_id: &str) -> Result<(), IngestError> {
        let descriptor = self
            .directory
            .as_ref()
            .and_then(|d| d.lookup(source_id))
            .ok_or_else(|| IngestError::UnknownSource(source_id.to_string()))?;
        self.register(descriptor).await
    }

    /// Removes a source. An in-flight tick finishes its current target and
    /// starts no new one; the session is torn down once it has exited.
    pub async fn deregister(&self, source_id: &str) -> bool {
        let removed = self.sources().remove(source_id);
        let Some(slot) = removed else {
            return false;
        };
        slot.active.store(false, Ordering::SeqCst);
        let _idle = slot.work.lock().await;
        self.manager.disconnect(source_id).await;
        self.resolver.clear_cache(source_id);
        info!("[{}] deregistered", source_id);
        true
    }

    /// Replaces the credentials and alternate id of a source and re-enables
    /// it. Existing sessions, opened with the old credentials, are closed.
    pub async fn update_credentials(
        &self,
        source_id: &str,
        credentials: Credentials,
        alt_id: Option<String>,
    ) -> Result<(), IngestError> {
        {
            let mut sources = self.sources();
            let slot = sources
                .get_mut(source_id)
                .ok_or_else(|| IngestError::UnknownSource(source_id.to_string()))?;
            slot.descriptor.credentials = Some(credentials);
            slot.descriptor.alt_id = alt_id;
            if slot.state == SourceState::Disabled {
                slot.state = SourceState::Idle;
            }
            slot.status = "credentials updated".to_string();
        }
        self.manager.disconnect(source_id).await;
        self.resolver.clear_cache(source_id);
        info!("[{}] credentials updated", source_id);
        Ok(())
    }

    pub fn current_watermark(&self, source_id: &str) -> Option<DateTime<Utc>> {
        self.sources().get(source_id).and_then(|s| s.watermark)
    }

    /// Operator override: replaces the watermark, possibly with an earlier
    /// bound. Waits for an in-flight tick, then drops every per-target cache
    /// and the dedup window so the lowered range is read again.
    pub async fn set_watermark(
        &self,
        source_id: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        self.override_watermark(source_id, watermark, false).await
    }

    /// Lowers the watermark to `minutes` before now. Returns the new bound.
    ///
    /// Unlike [`Self::set_watermark`], cursors are dropped on the next scan
    /// and only for the log and the data files whose names fall in the
    /// reprocessed window (plus the file open when it started).
    pub async fn reprocess_last(
        &self,
        source_id: &str,
        minutes: i64,
    ) -> Result<DateTime<Utc>, IngestError> {
        let watermark = Utc::now() - chrono::Duration::minutes(minutes.max(0));
        self.override_watermark(source_id, watermark, true).await?;
        Ok(watermark)
    }

    async fn override_watermark(
        &self,
        source_id: &str,
        watermark: DateTime<Utc>,
        windowed: bool,
    ) -> Result<(), IngestError> {
        let work = self
            .sources()
            .get(source_id)
            .map(|s| s.work.clone())
            .ok_or_else(|| IngestError::UnknownSource(source_id.to_string()))?;

        let mut work = work.lock().await;
        if windowed {
            work.reprocess_from = Some(watermark);
        } else {
            work.cursors.clear();
            work.reprocess_from = None;
        }
        work.dedup.clear();
        work.floor = Some(watermark);
        if let Some(slot) = self.sources().get_mut(source_id) {
            slot.watermark = Some(watermark);
            slot.status = format!("watermark set to {}", watermark.to_rfc3339());
        }
        self.resolver.clear_cache(source_id);
        info!("[{}] watermark overridden to {}", source_id, watermark);
        self.watermarks.save(source_id, watermark).await?;
        Ok(())
    }

    pub fn source_statuses(&self) -> Vec<SourceStatus> {
        let mut statuses: Vec<SourceStatus> =
            self.sources().values().map(SourceSlot::status).collect();
        statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        statuses
    }

    pub fn source_status(&self, source_id: &str) -> Option<SourceStatus> {
        self.sources().get(source_id).map(SourceSlot::status)
    }

    /// One pass over every registered source, one task per source. Sources
    /// whose previous tick is still running, and disabled sources, are
    /// skipped.
    pub async fn run_tick(self: &Arc<Self>) -> TickSummary {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let mut summary = TickSummary::default();

        let candidates: Vec<(String, SourceState, Arc<AsyncMutex<SourceWork>>)> = self
            .sources()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.state, slot.work.clone()))
            .collect();

        let mut tasks = JoinSet::new();
        for (source_id, state, work) in candidates {
            if state == SourceState::Disabled {
                summary.skipped.push((source_id, SkipReason::Disabled));
                continue;
            }
            match work.try_lock_owned() {
                Ok(mut guard) => {
                    let coordinator = Arc::clone(self);
                    tasks.spawn(async move {
                        coordinator
                            .scan_source(&source_id, &mut guard, tick)
                            .await
                            .map(|r| r.report)
                    });
                }
                Err(_) => {
                    debug!("[{}] previous tick still in flight; skipping", source_id);
                    summary.skipped.push((source_id, SkipReason::InFlight));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(report)) => summary.reports.push(report),
                Ok(None) => {}
                Err(e) => error!("Source tick task failed: {}", e),
            }
        }
        summary.reports.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        summary.skipped.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(
            "Tick {}: {} source(s) scanned, {} skipped, {} event(s)",
            tick,
            summary.reports.len(),
            summary.skipped.len(),
            summary.emitted()
        );
        summary
    }

    /// One on-demand pass over `source_id`, returning the delivered events.
    /// Waits for an in-flight tick of the same source.
    pub async fn ingest(&self, source_id: &str) -> Result<Vec<Event>, IngestError> {
        let (state, status, work) = self
            .sources()
            .get(source_id)
            .map(|s| (s.state, s.status.clone(), s.work.clone()))
            .ok_or_else(|| IngestError::UnknownSource(source_id.to_string()))?;
        if state == SourceState::Disabled {
            return Err(IngestError::SourceDisabled(status));
        }

        let mut work = work.lock().await;
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self
            .scan_source(source_id, &mut work, tick)
            .await
            .ok_or_else(|| IngestError::UnknownSource(source_id.to_string()))?;
        match result.error {
            Some(e) => Err(e),
            None => Ok(result.events),
        }
    }

    /// Calls [`Self::run_tick`] every `interval` until `shutdown` turns true.
    pub async fn run(self: &Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Coordinator running every {:?}", interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.run_tick().await;
                    if summary.emitted() > 0 {
                        info!("Tick delivered {} event(s)", summary.emitted());
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Coordinator stopped");
    }

    fn set_state(&self, source_id: &str, state: SourceState) {
        if let Some(slot) = self.sources().get_mut(source_id) {
            slot.state = state;
            slot.status = state.as_str().to_string();
        }
    }

    /// Raises the source watermark; returns the new value when it moved.
    fn raise_watermark(&self, source_id: &str, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut sources = self.sources();
        let slot = sources.get_mut(source_id)?;
        if slot.watermark.map(|w| ts > w).unwrap_or(true) {
            slot.watermark = Some(ts);
            Some(ts)
        } else {
            None
        }
    }

    async fn scan_source(
        &self,
        source_id: &str,
        work: &mut SourceWork,
        tick: u64,
    ) -> Option<ScanResult> {
        let (descriptor, active) = {
            let sources = self.sources();
            let slot = sources.get(source_id)?;
            (slot.descriptor.clone(), slot.active.clone())
        };
        let started_at = Utc::now();
        self.set_state(source_id, SourceState::Scanning);

        let mut targets = Vec::new();
        let mut events = Vec::new();
        let scan_timeout = self.settings.scan_timeout;
        let outcome = match tokio::time::timeout(
            scan_timeout,
            self.scan(&descriptor, work, tick, &active, &mut targets, &mut events),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(IngestError::TimedOut(format!(
                "source {} exceeded {:?}",
                source_id, scan_timeout
            ))),
        };

        let (state, status, error) = match outcome {
            Ok(()) => (SourceState::Idle, summarize(&targets, events.len()), None),
            Err(e) => {
                let text = describe_failure(&e);
                let state = if is_disabling(&e) {
                    warn!("[{}] disabled: {}", source_id, e);
                    SourceState::Disabled
                } else {
                    warn!("[{}] tick {} failed: {}", source_id, tick, e);
                    SourceState::Idle
                };
                (state, text, Some(e))
            }
        };

        let report = TickReport {
            source_id: source_id.to_string(),
            tick,
            started_at,
            finished_at: Utc::now(),
            targets,
            emitted: events.len(),
            error: error.as_ref().map(|e| e.to_string()),
        };
        if let Some(slot) = self.sources().get_mut(source_id) {
            slot.state = state;
            slot.status = status;
            slot.last_tick = Some(report.clone());
        }
        Some(ScanResult {
            report,
            events,
            error,
        })
    }

    async fn scan(
        &self,
        source: &SourceDescriptor,
        work: &mut SourceWork,
        tick: u64,
        active: &AtomicBool,
        reports: &mut Vec<TargetReport>,
        delivered: &mut Vec<Event>,
    ) -> Result<(), IngestError> {
        if source.credentials.is_none() {
            return Err(IngestError::MissingCredentials(source.id.clone()));
        }
        let mut session = self.manager.acquire(source, false).await?;
        if !self.manager.check_health(&session).await {
            session = self.manager.acquire(source, true).await?;
        }

        let window = work
            .reprocess_from
            .map(|start| TimeWindow::new(start, Utc::now()));
        let data = self
            .resolver
            .resolve_data_files_for_tick(session.as_ref(), source, tick, window.as_ref())
            .await;
        let log = self.resolver.resolve_log_path(session.as_ref(), source).await;
        let targets = collect_targets(&source.id, data, log)?;
        if let Some(start) = work.reprocess_from.take() {
            for (path, _) in &targets {
                work.cursors.remove(path);
            }
            info!(
                "[{}] reprocessing {} target(s) from {}",
                source.id,
                targets.len(),
                start
            );
        }

        self.set_state(&source.id, SourceState::Parsing);
        for (path, kind) in targets {
            if !active.load(Ordering::SeqCst) {
                debug!("[{}] deregistered; leaving {} for good", source.id, path);
                reports.push(TargetReport::new(&path, kind, TargetStatus::Skipped));
                continue;
            }
            if !session.is_healthy() {
                session = self.manager.acquire(source, false).await?;
            }

            let session_ref = &session;
            let work_ref = &mut *work;
            let delivered_ref = &mut *delivered;
            let target = path.as_str();
            let outcome = self
                .manager
                .with_lease(&source.id, OperationKind::Read, target, move || async move {
                    Ok(self
                        .process_target(source, session_ref, work_ref, target, kind, delivered_ref)
                        .await)
                })
                .await;

            let report = match outcome {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => {
                    warn!("[{}] target {} failed: {}", source.id, path, e);
                    TargetReport::failed(&path, kind, e.to_string())
                }
                Err(ConnectionError::OperationInProgress { .. }) => {
                    debug!("[{}] {} is busy; skipped this tick", source.id, path);
                    TargetReport::new(&path, kind, TargetStatus::Skipped)
                }
                Err(e) => {
                    warn!("[{}] target {} failed: {}", source.id, path, e);
                    TargetReport::failed(&path, kind, e.to_string())
                }
            };
            reports.push(report);
        }
        self.manager.release(&session);
        Ok(())
    }

    /// Reads what is new in one target, parses it, filters it and delivers
    /// it. The cursor, dedup window and watermarks are committed only after
    /// the sink accepted the batch.
    async fn process_target(
        &self,
        source: &SourceDescriptor,
        session: &Arc<Session>,
        work: &mut SourceWork,
        path: &str,
        kind: TargetKind,
        delivered: &mut Vec<Event>,
    ) -> Result<TargetReport, IngestError> {
        let info = session
            .stat(path)
            .await
            .map_err(|e| IngestError::Connection(e.into()))?;

        let floor = work.floor;
        let cursor = work
            .cursors
            .entry(path.to_string())
            .or_insert_with(|| TargetCursor::starting_at(floor));
        match cursor.observe(&info) {
            Observation::Unchanged => {
                return Ok(TargetReport::new(path, kind, TargetStatus::Unchanged));
            }
            Observation::Reset => {
                info!(
                    "[{}] {} was truncated or rewritten; reading from the start",
                    source.id, path
                );
            }
            Observation::Grown => {}
        }
        let start = cursor.offset;
        let line_offset = cursor.lines;
        let delimiter = cursor.delimiter;
        let target_floor = cursor.watermark;
        let was_settled = cursor.is_settled(&info);

        // Without partial reads the transport always reads from 0, so the
        // cap has to cover the consumed prefix as well.
        let full_reread = !session.supports_partial_reads();
        let max_len = self.settings.max_read_bytes;
        let (read_from, read_len) = if full_reread {
            (0, max_len.map(|m| start.saturating_add(m)))
        } else {
            (start, max_len)
        };
        let bytes = self
            .manager
            .read_range(source, path, read_from, read_len)
            .await?;
        let fresh: &[u8] = if full_reread {
            bytes.get(start as usize..).unwrap_or(&[])
        } else {
            &bytes
        };
        let capped = max_len.map(|m| fresh.len() as u64 >= m).unwrap_or(false);
        let chunk = complete_lines(fresh, was_settled && !capped);
        if capped && chunk.bytes.is_empty() {
            warn!(
                "[{}] {}: no complete line within the {} byte read cap at offset {}",
                source.id,
                path,
                max_len.unwrap_or_default(),
                start
            );
        }

        let at_start = start == 0;
        let ingested_at = Utc::now();
        let (events, skipped, detected) = match kind {
            TargetKind::Data => {
                let outcome = match delimiter {
                    Some(d) => parse_rows(chunk.bytes, d, path, line_offset, at_start),
                    None if at_start => parse_content(chunk.bytes, path),
                    None => {
                        let text = decode(chunk.bytes);
                        let d = detect_delimiter(&sample_lines(&text));
                        parse_rows(chunk.bytes, d, path, line_offset, false)
                    }
                };
                let events: Vec<Event> = outcome
                    .records
                    .iter()
                    .map(|r| kill_event(r, &source.id, ingested_at))
                    .collect();
                (events, outcome.skipped, outcome.delimiter.or(delimiter))
            }
            TargetKind::Log => {
                let outcome = parse_log_content(chunk.bytes, path, line_offset);
                let events: Vec<Event> = outcome
                    .records
                    .iter()
                    .map(|r| log_event(r, &source.id))
                    .collect();
                (events, outcome.skipped, None)
            }
        };

        let admission = admit(events, target_floor, &work.dedup);
        if admission.below_watermark + admission.duplicates > 0 {
            debug!(
                "[{}] {}: {} below watermark, {} duplicate(s)",
                source.id, path, admission.below_watermark, admission.duplicates
            );
        }
        if !admission.events.is_empty() {
            self.set_state(&source.id, SourceState::Emitting);
            self.sink.persist(&admission.events).await?;
        }

        let newest = admission.events.last().map(|e| e.timestamp);
        if let Some(cursor) = work.cursors.get_mut(path) {
            cursor.advance(&chunk, &info);
            if detected.is_some() {
                cursor.delimiter = detected;
            }
            if let Some(ts) = newest {
                cursor.raise_watermark(ts);
            }
        }
        for event in &admission.events {
            work.dedup.insert(event.dedup_key(), event.timestamp);
        }
        if let Some(low) = work.lowest_target_watermark() {
            work.dedup.prune_older_than(low);
        }
        if let Some(raised) = newest.and_then(|ts| self.raise_watermark(&source.id, ts)) {
            if let Err(e) = self.watermarks.save(&source.id, raised).await {
                warn!("[{}] could not persist watermark {}: {}", source.id, raised, e);
            }
        }

        let emitted = admission.events.len();
        let status = if emitted > 0 {
            TargetStatus::Processed
        } else if skipped > 0 {
            warn!(
                "[{}] {}: no event from {} consumed line(s), {} row(s) skipped",
                source.id, path, chunk.lines, skipped
            );
            TargetStatus::Suspect
        } else if chunk.bytes.is_empty() {
            TargetStatus::Unchanged
        } else {
            TargetStatus::Processed
        };
        if emitted > 0 {
            info!("[{}] {}: {} new event(s)", source.id, path, emitted);
        }
        delivered.extend(admission.events);

        Ok(TargetReport {
            emitted,
            skipped_rows: skipped,
            ..TargetReport::new(path, kind, status)
        })
    }
}

/// Data files first, then the log. A miss on one kind is not an error as
/// long as the other found something.
fn collect_targets(
    source_id: &str,
    data: Result<Resolution, ResolveError>,
    log: Result<Resolution, ResolveError>,
) -> Result<Vec<(String, TargetKind)>, IngestError> {
    let mut targets = Vec::new();
    let mut attempted = Vec::new();
    for (result, kind) in [(data, TargetKind::Data), (log, TargetKind::Log)] {
        match result {
            Ok(resolution) => {
                targets.extend(resolution.paths.into_iter().map(|p| (p, kind)));
            }
            Err(ResolveError::NotFound { attempted: tried }) => {
                debug!("[{}] no {:?} target found", source_id, kind);
                attempted.extend(tried);
            }
            Err(e) => return Err(e.into()),
        }
    }
    if targets.is_empty() {
        return Err(ResolveError::NotFound { attempted }.into());
    }
    Ok(targets)
}

fn summarize(targets: &[TargetReport], emitted: usize) -> String {
    let mut text = format!("ok: {} event(s) from {} target(s)", emitted, targets.len());
    for (status, label) in [
        (TargetStatus::Suspect, "suspect"),
        (TargetStatus::Failed, "failed"),
        (TargetStatus::Skipped, "skipped"),
    ] {
        let n = targets.iter().filter(|t| t.status == status).count();
        if n > 0 {
            text.push_str(&format!(", {} {}", n, label));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_management::{ConnectionSettings, RetryPolicy};
    use crate::error_handling::types::TransportError;
    use crate::events::EventKind;
    use crate::path_resolution::RemoteLayout;
    use crate::remote::{Endpoint, MemoryTransport};
    use crate::storage::memory_storage::MemoryStorage;
    use chrono::TimeZone;

    const DATA: &str = "/10.0.0.1_1/actual1/deathlogs/world_0/2025.05.09-00.00.00.csv";
    const LOG: &str = "/10.0.0.1_1/Logs/Deadside.log";
    const ROW_A: &str = "2025.05.09-11.58.37,TestKiller,12345,TestVictim,67890,AK47,100,PC\n";
    const ROW_LATE: &str = "2025.05.09-12.05.00,Late,1,Victim,2,M4,20,PC\n";

    struct Harness {
        transport: MemoryTransport,
        storage: Arc<MemoryStorage>,
        manager: Arc<ConnectionManager>,
        coordinator: Arc<Coordinator>,
    }

    fn harness() -> Harness {
        harness_with(IngestSettings::default())
    }

    fn harness_with(settings: IngestSettings) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let transport = MemoryTransport::new();
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(transport.clone()),
            ConnectionSettings {
                retry: RetryPolicy::immediate(2),
                ..ConnectionSettings::default()
            },
        ));
        let resolver = Arc::new(PathResolver::new(RemoteLayout::default()));
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(Coordinator::new(
            manager.clone(),
            resolver,
            storage.clone(),
            storage.clone(),
            settings,
        ));
        Harness {
            transport,
            storage,
            manager,
            coordinator,
        }
    }

    fn source(id: &str) -> SourceDescriptor {
        SourceDescriptor::new(
            id,
            Endpoint::new("10.0.0.1", 8822),
            Some(Credentials::new("admin", "secret")),
        )
    }

    fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 9, h, m, s).unwrap()
    }

    async fn registered(content: &str) -> Harness {
        let h = harness();
        h.transport.put_file(DATA, content);
        h.coordinator.register(source("1")).await.unwrap();
        h
    }

    fn target_status(h: &Harness, path: &str) -> TargetStatus {
        h.coordinator
            .source_status("1")
            .and_then(|s| s.last_tick)
            .and_then(|t| t.targets.into_iter().find(|r| r.path == path))
            .map(|r| r.status)
            .unwrap()
    }

    #[tokio::test]
    async fn scenario_a_comma_row_becomes_one_kill() {
        let h = registered(ROW_A).await;
        let events = h.coordinator.ingest("1").await.unwrap();

        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, EventKind::Kill);
        assert_eq!(e.actor_name.as_deref(), Some("TestKiller"));
        assert_eq!(e.actor_id.as_deref(), Some("12345"));
        assert_eq!(e.victim_name.as_deref(), Some("TestVictim"));
        assert_eq!(e.victim_id.as_deref(), Some("67890"));
        assert_eq!(e.weapon.as_deref(), Some("AK47"));
        assert_eq!(e.distance, Some(100.0));
        assert_eq!(e.origin_line, 1);
        assert_eq!(h.storage.events(), events);
        assert_eq!(h.coordinator.current_watermark("1"), Some(ts(11, 58, 37)));
        assert_eq!(target_status(&h, DATA), TargetStatus::Processed);
    }

    #[tokio::test]
    async fn scenario_b_semicolon_row_gives_the_same_event() {
        let comma = registered(ROW_A).await.coordinator.ingest("1").await.unwrap();
        let semicolon = registered(&ROW_A.replace(',', ";"))
            .await
            .coordinator
            .ingest("1")
            .await
            .unwrap();
        assert_eq!(comma, semicolon);
    }

    #[tokio::test]
    async fn scenario_c_empty_file_yields_nothing() {
        let h = registered("").await;
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        let status = h.coordinator.source_status("1").unwrap();
        assert_eq!(status.state, SourceState::Idle);
        assert!(status.last_tick.unwrap().error.is_none());
        assert_eq!(target_status(&h, DATA), TargetStatus::Unchanged);
    }

    #[tokio::test]
    async fn scenario_d_three_fields_default_to_ingestion_time() {
        let h = registered("TestKiller,TestVictim,AK47\n").await;
        let before = Utc::now();
        let events = h.coordinator.ingest("1").await.unwrap();
        let after = Utc::now();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_name.as_deref(), Some("TestKiller"));
        assert_eq!(events[0].victim_name.as_deref(), Some("TestVictim"));
        assert_eq!(events[0].weapon.as_deref(), Some("AK47"));
        assert!(events[0].timestamp >= before && events[0].timestamp <= after);
    }

    #[tokio::test]
    async fn scenario_e_missing_root_leaves_source_idle() {
        let h = harness();
        h.transport.put_file("/somewhere_else/Logs/Deadside.log", "x");
        h.coordinator.register(source("1")).await.unwrap();

        let err = h.coordinator.ingest("1").await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Resolve(ResolveError::NotFound { ref attempted }) if !attempted.is_empty()
        ));
        let status = h.coordinator.source_status("1").unwrap();
        assert_eq!(status.state, SourceState::Idle);
        assert!(status.status.contains("path(s) tried"));
        let recorded = status.last_tick.unwrap().error.unwrap();
        assert!(recorded.contains("/10.0.0.1_1/actual1/deathlogs"));
    }

    #[tokio::test]
    async fn reingesting_unchanged_or_rewritten_content_is_idempotent() {
        let content = format!("{}{}", ROW_A, ROW_LATE);
        let h = registered(&content).await;
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 2);
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(target_status(&h, DATA), TargetStatus::Unchanged);

        // Same bytes, new mtime: read again from the start, all suppressed.
        h.transport.put_file(DATA, content.clone());
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(h.storage.events().len(), 2);
    }

    #[tokio::test]
    async fn appended_rows_are_read_incrementally_with_file_line_numbers() {
        let header = "timestamp,killer,killer_id,victim,victim_id,weapon,distance,platform\n";
        let h = registered(&format!("{}{}", header, ROW_A)).await;
        let first = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].origin_line, 2);

        let reads = h.transport.reads();
        h.transport.append(DATA, ROW_LATE.as_bytes());
        let second = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].actor_name.as_deref(), Some("Late"));
        assert_eq!(second[0].origin_line, 3);
        assert_eq!(h.transport.reads(), reads + 1);
    }

    #[tokio::test]
    async fn unterminated_tail_waits_until_the_file_settles() {
        let h = registered(&format!("{}{}", ROW_A, ROW_LATE.trim_end())).await;
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);

        let second = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].actor_name.as_deref(), Some("Late"));
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn growing_tail_is_held_again() {
        let h = registered(&format!("{}2025.05.09-12.05", ROW_A)).await;
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);
        h.transport.append(DATA, b".00,Late,1,Victim,2,M4,20,PC\n");
        let second = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].timestamp, ts(12, 5, 0));
    }

    #[tokio::test]
    async fn truncated_file_is_read_from_the_start() {
        let h = registered(&format!("{}{}", ROW_A, ROW_LATE)).await;
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 2);

        h.transport
            .put_file(DATA, "2025.05.09-13.00.00,New,3,Other,4,SVD,300,PC\n");
        let events = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_name.as_deref(), Some("New"));
        assert_eq!(events[0].origin_line, 1);
    }

    #[tokio::test]
    async fn full_reread_mode_only_emits_new_rows() {
        let h = registered(ROW_A).await;
        h.transport.set_partial_reads(false);
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);

        h.transport.append(DATA, b"Solo,Other,Knife\n");
        let events = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_name.as_deref(), Some("Solo"));
        assert_eq!(events[0].origin_line, 2);
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn capped_full_reread_keeps_advancing() {
        let h = harness_with(IngestSettings {
            max_read_bytes: Some(ROW_A.len() as u64),
            ..IngestSettings::default()
        });
        h.transport.put_file(DATA, ROW_A);
        h.transport.set_partial_reads(false);
        h.coordinator.register(source("1")).await.unwrap();
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);

        h.transport.append(DATA, ROW_LATE.as_bytes());
        let events = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_name.as_deref(), Some("Late"));

        h.transport.append(DATA, b"2025.05.09-12.10.00,Third,5,Victim,6,M4,20,PC\n");
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);
        assert_eq!(h.storage.events().len(), 3);
    }

    #[tokio::test]
    async fn rewritten_rows_without_timestamp_are_not_emitted_twice() {
        let content = "TestKiller,TestVictim,AK47\n";
        let h = registered(content).await;
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);

        h.transport.put_file(DATA, content);
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(h.storage.events().len(), 1);
    }

    #[tokio::test]
    async fn watermark_never_decreases_without_override() {
        let h = registered(ROW_LATE).await;
        h.coordinator.ingest("1").await.unwrap();
        let wm = h.coordinator.current_watermark("1");
        assert_eq!(wm, Some(ts(12, 5, 0)));

        h.transport.append(DATA, ROW_A.as_bytes());
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(h.coordinator.current_watermark("1"), wm);
        assert_eq!(h.storage.load("1").await.unwrap(), wm);
    }

    #[tokio::test]
    async fn override_reprocesses_from_the_lowered_bound() {
        let h = registered(&format!("{}{}", ROW_A, ROW_LATE)).await;
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 2);
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());

        h.coordinator.set_watermark("1", ts(12, 0, 0)).await.unwrap();
        assert_eq!(h.coordinator.current_watermark("1"), Some(ts(12, 0, 0)));
        assert_eq!(h.storage.load("1").await.unwrap(), Some(ts(12, 0, 0)));

        let again = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].actor_name.as_deref(), Some("Late"));
        assert_eq!(h.coordinator.current_watermark("1"), Some(ts(12, 5, 0)));
    }

    #[tokio::test]
    async fn reprocess_last_lowers_relative_to_now() {
        let h = registered(ROW_A).await;
        let before = Utc::now();
        let bound = h.coordinator.reprocess_last("1", 30).await.unwrap();
        assert!(bound <= before - chrono::Duration::minutes(29));
        assert_eq!(h.coordinator.current_watermark("1"), Some(bound));
        assert!(matches!(
            h.coordinator.reprocess_last("nope", 5).await,
            Err(IngestError::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn reprocess_last_rereads_only_files_in_the_window() {
        let dir = "/10.0.0.1_1/actual1/deathlogs/world_0";
        let stamp = |t: DateTime<Utc>| t.format("%Y.%m.%d-%H.%M.%S").to_string();
        let now = Utc::now();
        let recent = format!("{}/{}.csv", dir, stamp(now - chrono::Duration::minutes(30)));

        let h = harness();
        h.transport.put_file(
            &format!("{}/2025.05.08-00.00.00.csv", dir),
            "2025.05.08-10.00.00,Old,7,Victim,8,M4,20,PC\n",
        );
        h.transport.put_file(DATA, ROW_A);
        h.transport.put_file(
            &recent,
            format!(
                "{},Recent,9,Victim,10,M4,20,PC\n",
                stamp(now - chrono::Duration::minutes(20))
            ),
        );
        h.coordinator.register(source("1")).await.unwrap();
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 3);

        h.coordinator.reprocess_last("1", 60).await.unwrap();
        let reads = h.transport.reads();
        let again = h.coordinator.ingest("1").await.unwrap();
        // The file open when the window started and the one named inside it.
        assert_eq!(h.transport.reads() - reads, 2);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].actor_name.as_deref(), Some("Recent"));
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persisted_watermark_is_the_restart_floor() {
        let h = harness();
        h.transport.put_file(DATA, format!("{}{}", ROW_A, ROW_LATE));
        h.storage.save("1", ts(12, 0, 0)).await.unwrap();
        h.coordinator.register(source("1")).await.unwrap();

        let events = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_name.as_deref(), Some("Late"));
    }

    #[tokio::test]
    async fn file_with_only_skipped_rows_is_suspect() {
        let h = registered("only,two\nstill,two\nnot-a-row\n").await;
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(target_status(&h, DATA), TargetStatus::Suspect);
        let status = h.coordinator.source_status("1").unwrap();
        assert!(status.status.contains("1 suspect"));
        let report = status.last_tick.unwrap();
        assert_eq!(report.targets[0].skipped_rows, 3);
    }

    #[tokio::test]
    async fn sink_failure_leaves_the_target_uncommitted() {
        let h = registered(ROW_A).await;
        h.storage.fail_next_writes(1);
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(target_status(&h, DATA), TargetStatus::Failed);
        assert_eq!(h.coordinator.current_watermark("1"), None);

        let retried = h.coordinator.ingest("1").await.unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(h.storage.events().len(), 1);
    }

    #[tokio::test]
    async fn authentication_failure_disables_until_credentials_change() {
        let h = registered(ROW_A).await;
        h.transport.reject_password("secret");

        let err = h.coordinator.ingest("1").await.unwrap_err();
        assert!(matches!(err, IngestError::Connection(ref e) if e.is_authentication()));
        assert_eq!(h.transport.connect_attempts(), 1);
        let status = h.coordinator.source_status("1").unwrap();
        assert_eq!(status.state, SourceState::Disabled);
        assert!(status.status.contains("authentication failed"));

        let summary = h.coordinator.run_tick().await;
        assert_eq!(summary.skipped, vec![("1".to_string(), SkipReason::Disabled)]);
        assert!(matches!(
            h.coordinator.ingest("1").await,
            Err(IngestError::SourceDisabled(_))
        ));

        h.coordinator
            .update_credentials("1", Credentials::new("admin", "rotated"), None)
            .await
            .unwrap();
        assert_eq!(h.coordinator.source_status("1").unwrap().state, SourceState::Idle);
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn source_without_credentials_starts_disabled() {
        let h = harness();
        let mut s = source("1");
        s.credentials = None;
        h.coordinator.register(s).await.unwrap();
        let status = h.coordinator.source_status("1").unwrap();
        assert_eq!(status.state, SourceState::Disabled);
        assert!(status.status.contains("missing credentials"));
        assert_eq!(h.transport.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn transient_connect_failures_leave_the_source_enabled() {
        let h = registered(ROW_A).await;
        h.transport
            .fail_next_connects(2, TransportError::ConnectionReset("peer".into()));
        let err = h.coordinator.ingest("1").await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Connection(ConnectionError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(h.coordinator.source_status("1").unwrap().state, SourceState::Idle);
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leased_target_is_skipped_this_tick() {
        let h = registered(ROW_A).await;
        let guard = h.manager.lease("1", OperationKind::Read, DATA).unwrap();
        assert!(h.coordinator.ingest("1").await.unwrap().is_empty());
        assert_eq!(target_status(&h, DATA), TargetStatus::Skipped);

        drop(guard);
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_tick_for_the_same_source_is_skipped() {
        let h = registered(ROW_A).await;
        h.transport.set_read_delay(Some(Duration::from_secs(10)));

        let coordinator = h.coordinator.clone();
        let slow = tokio::spawn(async move { coordinator.ingest("1").await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let summary = h.coordinator.run_tick().await;
        assert_eq!(summary.skipped, vec![("1".to_string(), SkipReason::InFlight)]);
        assert!(summary.reports.is_empty());
        assert_eq!(slow.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deregistration_mid_tick_finishes_the_current_target_only() {
        let second = "/10.0.0.1_1/actual1/deathlogs/world_0/2025.05.10-00.00.00.csv";
        let h = registered(ROW_A).await;
        h.transport.put_file(second, ROW_LATE);
        h.transport.set_read_delay(Some(Duration::from_secs(10)));

        let coordinator = h.coordinator.clone();
        let tick = tokio::spawn(async move { coordinator.run_tick().await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let coordinator = h.coordinator.clone();
        let leaving = tokio::spawn(async move { coordinator.deregister("1").await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let summary = tick.await.unwrap();
        let report = summary.report("1").unwrap();
        assert_eq!(report.targets.len(), 2);
        assert_eq!(report.targets[0].path, DATA);
        assert_eq!(report.targets[0].status, TargetStatus::Processed);
        assert_eq!(report.targets[1].path, second);
        assert_eq!(report.targets[1].status, TargetStatus::Skipped);

        assert!(leaving.await.unwrap());
        assert_eq!(h.storage.events().len(), 1);
        assert_eq!(h.transport.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_timeout_leaves_the_source_idle_for_the_next_tick() {
        let h = harness_with(IngestSettings {
            scan_timeout: Duration::from_secs(5),
            ..IngestSettings::default()
        });
        h.transport.put_file(DATA, ROW_A);
        h.coordinator.register(source("1")).await.unwrap();
        h.transport.set_read_delay(Some(Duration::from_secs(10)));

        assert!(matches!(
            h.coordinator.ingest("1").await,
            Err(IngestError::TimedOut(_))
        ));
        let status = h.coordinator.source_status("1").unwrap();
        assert_eq!(status.state, SourceState::Idle);
        assert!(status.status.starts_with("scan timed out"));
        assert!(h.storage.events().is_empty());

        h.transport.set_read_delay(None);
        assert_eq!(h.coordinator.ingest("1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failing_source_does_not_stop_the_others() {
        let h = registered(ROW_A).await;
        let mut broken = source("2");
        broken.endpoint = Endpoint::new("10.0.0.2", 8822);
        h.coordinator.register(broken).await.unwrap();

        let summary = h.coordinator.run_tick().await;
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.report("1").unwrap().emitted, 1);
        assert!(summary.report("1").unwrap().error.is_none());
        assert!(summary.report("2").unwrap().error.is_some());
        assert_eq!(summary.emitted(), 1);
    }

    #[tokio::test]
    async fn log_file_yields_connection_and_world_events() {
        let h = harness();
        h.transport.put_file(
            LOG,
            "[2025.05.09-11.58.38:000][  8]LogSFPS: [ASFPSGameSession::OnLogin] Login = Survivor, ID = |0002b1c3\n\
             [2025.05.09-11.59.00:500][ 12]LogSFPS: Mission GA_Mis_1 switched to READY\n\
             [2025.05.09-11.59.03:000][ 15]LogSFPS: Something unrelated happened\n",
        );
        h.coordinator.register(source("1")).await.unwrap();

        let events = h.coordinator.ingest("1").await.unwrap();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Connection, EventKind::WorldEvent]);
        assert_eq!(events[1].location.as_deref(), Some("GA_Mis_1"));
        assert_eq!(target_status(&h, LOG), TargetStatus::Processed);
    }

    #[tokio::test]
    async fn world_events_at_the_same_instant_stay_distinct() {
        let h = harness();
        h.transport.put_file(
            LOG,
            "[2025.05.09-11.59.00:500][ 12]LogSFPS: Mission GA_Mis_1 switched to READY\n\
             [2025.05.09-11.59.00:500][ 12]LogSFPS: Mission GA_Mis_2 switched to READY\n",
        );
        h.coordinator.register(source("1")).await.unwrap();

        let events = h.coordinator.ingest("1").await.unwrap();
        let missions: Vec<&str> = events.iter().filter_map(|e| e.location.as_deref()).collect();
        assert_eq!(missions, vec!["GA_Mis_1", "GA_Mis_2"]);
        assert_eq!(h.storage.events().len(), 2);
    }

    #[tokio::test]
    async fn deregistration_tears_down_the_session() {
        let h = registered(ROW_A).await;
        h.coordinator.ingest("1").await.unwrap();
        assert_eq!(h.transport.open_sessions(), 1);

        assert!(h.coordinator.deregister("1").await);
        assert!(!h.coordinator.deregister("1").await);
        assert_eq!(h.transport.open_sessions(), 0);
        assert!(h.coordinator.source_statuses().is_empty());
        assert!(h.coordinator.run_tick().await.reports.is_empty());
    }

    #[tokio::test]
    async fn register_by_id_uses_the_directory() {
        use crate::storage::source_directory::StaticSourceDirectory;

        let transport = MemoryTransport::new();
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(transport),
            ConnectionSettings::default(),
        ));
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Coordinator::new(
            manager,
            Arc::new(PathResolver::new(RemoteLayout::default())),
            storage.clone(),
            storage,
            IngestSettings::default(),
        )
        .with_directory(Arc::new(StaticSourceDirectory::new(vec![source("7")])));

        coordinator.register_id("7").await.unwrap();
        assert!(coordinator.source_status("7").is_some());
        assert!(matches!(
            coordinator.register_id("8").await,
            Err(IngestError::UnknownSource(_))
        ));
    }
}
