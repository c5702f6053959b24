use std::collections::VecDeque;

use async_trait::async_trait;
use log::trace;

use super::types::ResolutionContext;
use crate::error_handling::types::ResolveError;
use crate::remote::join_path;

/// Upper bound on directories listed by one recursive search.
const MAX_SEARCHED_DIRS: usize = 256;

/// One way of locating remote targets.
///
/// Returns the paths it found; an empty vector means "not here, try the next
/// strategy". Errors are reserved for traversal violations and transport
/// failures that make further probing pointless.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError>;
}

/// The log file at its canonical subpath.
pub struct CanonicalLogPath;

#[async_trait]
impl ResolveStrategy for CanonicalLogPath {
    fn name(&self) -> &'static str {
        "canonical_log"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let path = ctx.root.join(&ctx.layout.log_subpath)?;
        Ok(existing_file(ctx, path).await?.into_iter().collect())
    }
}

/// Casing and nesting variants of the log subpath.
pub struct AlternateLogPaths;

#[async_trait]
impl ResolveStrategy for AlternateLogPaths {
    fn name(&self) -> &'static str {
        "alternate_log"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let layout = ctx.layout;
        for subpath in &layout.alternate_log_subpaths {
            let path = ctx.root.join(subpath)?;
            if let Some(found) = existing_file(ctx, path).await? {
                return Ok(vec![found]);
            }
        }
        Ok(Vec::new())
    }
}

/// Bounded breadth-first search for the log file name.
pub struct LogSearch;

#[async_trait]
impl ResolveStrategy for LogSearch {
    fn name(&self) -> &'static str {
        "log_search"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let wanted = ctx.layout.log_file_name().to_lowercase();
        let found = search(ctx, |name| name.to_lowercase() == wanted, true).await?;
        Ok(found.into_iter().take(1).collect())
    }
}

/// Data files directly inside the canonical data directory.
pub struct CanonicalDataDir;

#[async_trait]
impl ResolveStrategy for CanonicalDataDir {
    fn name(&self) -> &'static str {
        "canonical_data_dir"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let dir = ctx.root.join(&ctx.layout.data_subdir)?;
        data_files_in(ctx, &dir).await
    }
}

/// Data files directly inside one of the alternate data directories. The
/// first directory holding any wins.
pub struct AlternateDataDirs;

#[async_trait]
impl ResolveStrategy for AlternateDataDirs {
    fn name(&self) -> &'static str {
        "alternate_data_dir"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let layout = ctx.layout;
        for subdir in &layout.alternate_data_subdirs {
            let dir = ctx.root.join(subdir)?;
            let files = data_files_in(ctx, &dir).await?;
            if !files.is_empty() {
                return Ok(files);
            }
        }
        Ok(Vec::new())
    }
}

/// Data files inside partition subdirectories (`world_0`, `map1`, `main`, ...)
/// of the canonical and alternate data directories.
pub struct PartitionListing;

#[async_trait]
impl ResolveStrategy for PartitionListing {
    fn name(&self) -> &'static str {
        "partition_listing"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let layout = ctx.layout;
        let bases = std::iter::once(&layout.data_subdir).chain(layout.alternate_data_subdirs.iter());
        for base in bases {
            let base_dir = ctx.root.join(base)?;
            let Some(entries) = ctx.list(&base_dir).await? else {
                continue;
            };
            let mut files = Vec::new();
            for entry in entries {
                if entry.info.is_dir && layout.is_partition(&entry.name) {
                    let partition = join_path(&base_dir, &entry.name);
                    files.extend(data_files_in(ctx, &partition).await?);
                }
            }
            if !files.is_empty() {
                return Ok(files);
            }
        }
        Ok(Vec::new())
    }
}

/// Bounded breadth-first search for data files below the canonical root.
pub struct DataSearch;

#[async_trait]
impl ResolveStrategy for DataSearch {
    fn name(&self) -> &'static str {
        "data_search"
    }

    async fn try_resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Vec<String>, ResolveError> {
        let layout = ctx.layout;
        search(ctx, |name| layout.is_data_file(name), false).await
    }
}

pub fn default_log_strategies() -> Vec<Box<dyn ResolveStrategy>> {
    vec![
        Box::new(CanonicalLogPath),
        Box::new(AlternateLogPaths),
        Box::new(LogSearch),
    ]
}

pub fn default_data_strategies() -> Vec<Box<dyn ResolveStrategy>> {
    vec![
        Box::new(CanonicalDataDir),
        Box::new(AlternateDataDirs),
        Box::new(PartitionListing),
        Box::new(DataSearch),
    ]
}

async fn existing_file(
    ctx: &mut ResolutionContext<'_>,
    path: String,
) -> Result<Option<String>, ResolveError> {
    match ctx.probe(&path).await? {
        Some(info) if !info.is_dir => Ok(Some(path)),
        _ => Ok(None),
    }
}

async fn data_files_in(ctx: &mut ResolutionContext<'_>, dir: &str) -> Result<Vec<String>, ResolveError> {
    let layout = ctx.layout;
    let Some(entries) = ctx.list(dir).await? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter(|e| !e.info.is_dir && layout.is_data_file(&e.name))
        .map(|e| join_path(dir, &e.name))
        .collect())
}

/// Breadth-first walk from the canonical root, at most
/// `layout.effective_depth()` levels deep and [`MAX_SEARCHED_DIRS`]
/// directories wide. With `first_only` the walk stops at the first match.
async fn search<P>(
    ctx: &mut ResolutionContext<'_>,
    matches: P,
    first_only: bool,
) -> Result<Vec<String>, ResolveError>
where
    P: Fn(&str) -> bool + Send + Sync,
{
    let max_depth = ctx.layout.effective_depth();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((ctx.root.as_str().to_string(), 0));
    let mut found = Vec::new();
    let mut listed = 0usize;

    while let Some((dir, depth)) = queue.pop_front() {
        if listed >= MAX_SEARCHED_DIRS {
            trace!("[{}] search stopped after {} directories", ctx.source_id, listed);
            break;
        }
        listed += 1;
        let Some(entries) = ctx.list(&dir).await? else {
            continue;
        };
        for entry in entries {
            let path = join_path(&dir, &entry.name);
            if !ctx.root.contains(&path) {
                continue;
            }
            if entry.info.is_dir {
                if depth + 1 < max_depth {
                    queue.push_back((path, depth + 1));
                }
            } else if matches(&entry.name) {
                found.push(path);
                if first_only {
                    return Ok(found);
                }
            }
        }
    }
    Ok(found)
}
