use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::strategies::{default_data_strategies, default_log_strategies, ResolveStrategy};
use super::types::{CanonicalRoot, RemoteLayout, Resolution, ResolutionContext, TimeWindow};
use crate::error_handling::types::ResolveError;
use crate::parsing::parse_timestamp;
use crate::remote::{file_name, RemoteFs, SourceDescriptor};

/// Ordered-strategy path resolver.
///
/// # Fields Overview
///
/// - `layout`: canonical subpaths, alternates and search limits
/// - `log_strategies` / `data_strategies`: tried in order, first hit wins
/// - `tick_cache`: last data resolution per source, reused within one tick
pub struct PathResolver {
    layout: RemoteLayout,
    log_strategies: Vec<Box<dyn ResolveStrategy>>,
    data_strategies: Vec<Box<dyn ResolveStrategy>>,
    tick_cache: Mutex<HashMap<String, (u64, Resolution)>>,
}

impl PathResolver {
    pub fn new(layout: RemoteLayout) -> Self {
        Self::with_strategies(layout, default_log_strategies(), default_data_strategies())
    }

    pub fn with_strategies(
        layout: RemoteLayout,
        log_strategies: Vec<Box<dyn ResolveStrategy>>,
        data_strategies: Vec<Box<dyn ResolveStrategy>>,
    ) -> Self {
        Self {
            layout,
            log_strategies,
            data_strategies,
            tick_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, (u64, Resolution)>> {
        self.tick_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locates the server log of `source`.
    pub async fn resolve_log_path(
        &self,
        fs: &dyn RemoteFs,
        source: &SourceDescriptor,
    ) -> Result<Resolution, ResolveError> {
        self.run(fs, source, &self.log_strategies, "log").await
    }

    /// Locates the data files of `source`, sorted by path and optionally
    /// filtered to the files that may hold events of `window`: those named
    /// inside it, plus the newest file of each directory named before it.
    pub async fn resolve_data_files(
        &self,
        fs: &dyn RemoteFs,
        source: &SourceDescriptor,
        window: Option<&TimeWindow>,
    ) -> Result<Resolution, ResolveError> {
        let mut resolution = self.run(fs, source, &self.data_strategies, "data").await?;
        resolution.paths.sort();
        resolution.paths.dedup();
        if let Some(window) = window {
            let before = resolution.paths.len();
            resolution.paths = within_window(&resolution.paths, window);
            if resolution.paths.len() != before {
                debug!(
                    "[{}] window kept {} of {} data file(s)",
                    source.id,
                    resolution.paths.len(),
                    before
                );
            }
        }
        Ok(resolution)
    }

    /// Like [`Self::resolve_data_files`] but reuses the result computed for
    /// the same `tick` of the same source.
    pub async fn resolve_data_files_for_tick(
        &self,
        fs: &dyn RemoteFs,
        source: &SourceDescriptor,
        tick: u64,
        window: Option<&TimeWindow>,
    ) -> Result<Resolution, ResolveError> {
        if let Some((cached_tick, resolution)) = self.cache().get(&source.id) {
            if *cached_tick == tick {
                debug!("[{}] reusing data resolution of tick {}", source.id, tick);
                return Ok(resolution.clone());
            }
        }
        let resolution = self.resolve_data_files(fs, source, window).await?;
        self.cache()
            .insert(source.id.clone(), (tick, resolution.clone()));
        Ok(resolution)
    }

    pub fn clear_cache(&self, source_id: &str) {
        self.cache().remove(source_id);
    }

    async fn run(
        &self,
        fs: &dyn RemoteFs,
        source: &SourceDescriptor,
        strategies: &[Box<dyn ResolveStrategy>],
        what: &str,
    ) -> Result<Resolution, ResolveError> {
        let root = CanonicalRoot::for_source(source)?;
        let mut ctx = ResolutionContext::new(fs, root, &self.layout, &source.id);

        for strategy in strategies {
            let paths = strategy.try_resolve(&mut ctx).await?;
            if let Some(escaped) = paths.iter().find(|p| !ctx.root.contains(p)) {
                return Err(ResolveError::Traversal(escaped.clone()));
            }
            if !paths.is_empty() {
                info!(
                    "[{}] resolved {} {} target(s) via {}",
                    source.id,
                    paths.len(),
                    what,
                    strategy.name()
                );
                return Ok(Resolution {
                    paths,
                    strategy: strategy.name().to_string(),
                    attempted: ctx.into_attempted(),
                });
            }
            debug!("[{}] {} strategy {} found nothing", source.id, what, strategy.name());
        }

        let attempted = ctx.into_attempted();
        warn!(
            "[{}] no {} target found; attempted: {}",
            source.id,
            what,
            attempted.join(", ")
        );
        Err(ResolveError::NotFound { attempted })
    }
}

fn name_timestamp(path: &str) -> Option<DateTime<Utc>> {
    let name = file_name(path);
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    parse_timestamp(stem).ok()
}

/// Files whose stem is not a timestamp are always kept. The newest file of a
/// directory named before `window.start` was still written to when the
/// window opened, so it is kept too.
fn within_window(paths: &[String], window: &TimeWindow) -> Vec<String> {
    let mut open_at_start: HashMap<&str, (DateTime<Utc>, &str)> = HashMap::new();
    for path in paths {
        let Some(ts) = name_timestamp(path) else {
            continue;
        };
        if ts >= window.start {
            continue;
        }
        let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        let newer = open_at_start.get(dir).map(|(t, _)| ts > *t).unwrap_or(true);
        if newer {
            open_at_start.insert(dir, (ts, path.as_str()));
        }
    }
    let carried: HashSet<&str> = open_at_start.values().map(|(_, p)| *p).collect();

    paths
        .iter()
        .filter(|p| match name_timestamp(p) {
            Some(ts) => window.contains(ts) || carried.contains(p.as_str()),
            None => true,
        })
        .cloned()
        .collect()
}
