use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error_handling::types::{ResolveError, TransportError};
use crate::remote::{join_path, DirEntry, FileInfo, RemoteFs, SourceDescriptor};

/// Where a server keeps its files, relative to the canonical root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteLayout {
    pub log_subpath: String,
    pub alternate_log_subpaths: Vec<String>,
    pub data_subdir: String,
    pub alternate_data_subdirs: Vec<String>,
    pub data_extension: String,
    /// Partition directory names accepted besides those containing "world"
    /// or "map".
    pub partition_names: Vec<String>,
    /// Depth cap of recursive searches below the canonical root.
    pub search_depth: usize,
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            log_subpath: "Logs/Deadside.log".to_string(),
            alternate_log_subpaths: vec![
                "logs/Deadside.log".to_string(),
                "Logs/deadside.log".to_string(),
                "Deadside/Saved/Logs/Deadside.log".to_string(),
                "actual1/Logs/Deadside.log".to_string(),
            ],
            data_subdir: "actual1/deathlogs".to_string(),
            alternate_data_subdirs: vec![
                "deathlogs".to_string(),
                "actual/deathlogs".to_string(),
                "Deathlogs".to_string(),
            ],
            data_extension: "csv".to_string(),
            partition_names: [
                "world_0", "world0", "world_1", "world1", "map_0", "map0", "main", "default",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            search_depth: 5,
        }
    }
}

/// Hard limit on recursive search depth, whatever the layout asks for.
pub const MAX_SEARCH_DEPTH: usize = 10;

impl RemoteLayout {
    /// Rejects subpaths that could leave the canonical root.
    pub fn validate(&self) -> Result<(), ResolveError> {
        validate_subpath(&self.log_subpath)?;
        validate_subpath(&self.data_subdir)?;
        for p in self
            .alternate_log_subpaths
            .iter()
            .chain(self.alternate_data_subdirs.iter())
        {
            validate_subpath(p)?;
        }
        validate_segment(&self.data_extension)?;
        Ok(())
    }

    pub fn log_file_name(&self) -> &str {
        crate::remote::file_name(&self.log_subpath)
    }

    pub fn is_data_file(&self, name: &str) -> bool {
        name.rsplit_once('.')
            .map(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(&self.data_extension))
            .unwrap_or(false)
    }

    pub fn is_partition(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.contains("world")
            || lower.contains("map")
            || self.partition_names.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    pub fn effective_depth(&self) -> usize {
        self.search_depth.min(MAX_SEARCH_DEPTH)
    }
}

/// A single path segment: non-empty, not `.` or `..`, no separators.
pub fn validate_segment(segment: &str) -> Result<(), ResolveError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('\0')
    {
        return Err(ResolveError::Traversal(segment.to_string()));
    }
    Ok(())
}

/// A relative subpath is acceptable when every `/`-separated segment is a
/// plain name.
pub fn validate_subpath(subpath: &str) -> Result<(), ResolveError> {
    if subpath.starts_with('/') || subpath.contains('\\') {
        return Err(ResolveError::Traversal(subpath.to_string()));
    }
    for segment in subpath.split('/') {
        validate_segment(segment).map_err(|_| ResolveError::Traversal(subpath.to_string()))?;
    }
    Ok(())
}

/// Per-source remote root, `/{host-without-port}_{altId or id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRoot(String);

impl CanonicalRoot {
    pub fn for_source(source: &SourceDescriptor) -> Result<Self, ResolveError> {
        let segment = format!("{}_{}", source.endpoint.bare_host(), source.path_id());
        validate_segment(&segment)?;
        validate_segment(source.path_id())?;
        Ok(CanonicalRoot(format!("/{}", segment)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins a validated relative subpath onto the root.
    pub fn join(&self, subpath: &str) -> Result<String, ResolveError> {
        validate_subpath(subpath)?;
        Ok(join_path(&self.0, subpath))
    }

    /// True when `path` is the root or lies below it without any `.`/`..`
    /// segment.
    pub fn contains(&self, path: &str) -> bool {
        let below = path == self.0
            || path
                .strip_prefix(&self.0)
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false);
        below
            && !path.contains('\\')
            && path
                .split('/')
                .skip(1)
                .all(|s| !s.is_empty() && s != "." && s != "..")
    }
}

/// Inclusive time window used to filter data files by the timestamp in their
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub paths: Vec<String>,
    pub strategy: String,
    pub attempted: Vec<String>,
}

/// State shared by the strategies of one resolution run.
pub struct ResolutionContext<'a> {
    pub fs: &'a dyn RemoteFs,
    pub root: CanonicalRoot,
    pub layout: &'a RemoteLayout,
    pub source_id: &'a str,
    attempted: Vec<String>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        fs: &'a dyn RemoteFs,
        root: CanonicalRoot,
        layout: &'a RemoteLayout,
        source_id: &'a str,
    ) -> Self {
        Self {
            fs,
            root,
            layout,
            source_id,
            attempted: Vec::new(),
        }
    }

    pub fn attempted(&self) -> &[String] {
        &self.attempted
    }

    pub fn into_attempted(self) -> Vec<String> {
        self.attempted
    }

    fn record(&mut self, path: &str) {
        debug!("[{}] trying {}", self.source_id, path);
        self.attempted.push(path.to_string());
    }

    /// Stats a path, recording the attempt. Missing or forbidden paths are
    /// `None`; transient transport failures propagate.
    pub async fn probe(&mut self, path: &str) -> Result<Option<FileInfo>, ResolveError> {
        if !self.root.contains(path) {
            return Err(ResolveError::Traversal(path.to_string()));
        }
        self.record(path);
        match self.fs.stat(path).await {
            Ok(info) => Ok(Some(info)),
            Err(e) => absorb(self.source_id, path, e),
        }
    }

    /// Lists a directory, recording the attempt. Entries named `.`/`..` or
    /// containing separators are dropped.
    pub async fn list(&mut self, dir: &str) -> Result<Option<Vec<DirEntry>>, ResolveError> {
        if !self.root.contains(dir) {
            return Err(ResolveError::Traversal(dir.to_string()));
        }
        self.record(dir);
        match self.fs.list(dir).await {
            Ok(entries) => Ok(Some(
                entries
                    .into_iter()
                    .filter(|e| validate_segment(&e.name).is_ok())
                    .collect(),
            )),
            Err(e) => absorb(self.source_id, dir, e),
        }
    }
}

fn absorb<T>(source_id: &str, path: &str, err: TransportError) -> Result<Option<T>, ResolveError> {
    match err {
        TransportError::NotFound(_) => Ok(None),
        TransportError::PermissionDenied(_) => {
            warn!("[{}] permission denied on {}", source_id, path);
            Ok(None)
        }
        e if e.is_transient() => Err(ResolveError::Transport(e)),
        e => {
            warn!("[{}] probing {} failed: {}", source_id, path, e);
            Ok(None)
        }
    }
}
