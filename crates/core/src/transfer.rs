//! Bulk transfers between a local tree and a key prefix
//!
//! Every batch runs through [`run_batch`]: items execute with bounded
//! concurrency, failures are collected per item instead of aborting the
//! batch, and a shared tracker drives the optional progress observer.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use glob::Pattern;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, ItemFailure, Result};
use crate::listing;
use crate::path::{RemotePath, key_to_local, local_to_key, normalize_prefix};
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::traits::ObjectStore;

/// Default number of items in flight per batch
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Knobs shared by every batch operation
#[derive(Clone)]
pub struct TransferOptions {
    /// Maximum items in flight (values below 1 are treated as 1)
    pub concurrency: usize,
    /// Once cancelled, no new item starts
    pub cancel: CancellationToken,
    pub observer: Option<Arc<dyn ProgressObserver>>,
    /// Glob patterns matched against paths relative to the upload root
    pub exclude: Vec<String>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
            observer: None,
            exclude: Vec::new(),
        }
    }
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("concurrency", &self.concurrency)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("observer", &self.observer.is_some())
            .field("exclude", &self.exclude)
            .finish()
    }
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Same options without a progress observer
    pub(crate) fn silent(&self) -> Self {
        Self {
            observer: None,
            ..self.clone()
        }
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    /// Every item succeeded (including empty batches)
    Complete,
    /// Some items succeeded, some failed
    Partial,
    /// Every item failed
    Failed,
}

/// Result of a batch operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub items_total: usize,
    pub items_done: usize,
    pub bytes_total: u64,
    pub bytes_done: u64,
    /// Items that completed, sorted
    pub succeeded: Vec<String>,
    /// Items that failed, sorted by item
    pub failures: Vec<ItemFailure>,
}

impl TransferReport {
    pub fn outcome(&self) -> TransferOutcome {
        if self.failures.is_empty() {
            TransferOutcome::Complete
        } else if self.succeeded.is_empty() {
            TransferOutcome::Failed
        } else {
            TransferOutcome::Partial
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn any item failure into [`Error::PartialTransferFailure`]
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::PartialTransferFailure(self.failures))
        }
    }
}

/// One unit of batch work
pub(crate) struct WorkItem<T> {
    /// Key or path reported in progress and failures
    pub name: String,
    /// Declared payload size used for progress totals
    pub bytes: u64,
    pub payload: T,
}

/// Run `op` over `items` with bounded concurrency
pub(crate) async fn run_batch<T, F, Fut>(
    items: Vec<WorkItem<T>>,
    options: &TransferOptions,
    op: F,
) -> TransferReport
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let items_total = items.len();
    let bytes_total = items.iter().map(|i| i.bytes).sum();
    let tracker = ProgressTracker::new(items_total, bytes_total, options.observer.clone());

    let tracker = &tracker;
    let cancel = &options.cancel;
    let op = &op;
    let mut results: Vec<(String, Result<()>)> = stream::iter(items)
        .map(|item| async move {
            let WorkItem {
                name,
                bytes,
                payload,
            } = item;
            let result = if cancel.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                op(payload).await
            };
            tracker.record(&name, bytes, result.is_ok());
            (name, result)
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    for (name, result) in results {
        match result {
            Ok(()) => succeeded.push(name),
            Err(Error::Cancelled) => failures.push(ItemFailure::new(name, "cancelled")),
            Err(e) => {
                warn!(item = %name, error = %e, "item failed");
                failures.push(ItemFailure::new(name, e.to_string()));
            }
        }
    }

    let counters = tracker.snapshot();
    TransferReport {
        items_total,
        items_done: counters.items_done,
        bytes_total,
        bytes_done: counters.bytes_done,
        succeeded,
        failures,
    }
}

enum Upload {
    Marker(RemotePath),
    File { source: PathBuf, dest: RemotePath },
    /// Entry found during the walk that could not be read
    Unreadable(std::io::Error),
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| Error::Config(format!("Invalid exclude pattern '{p}': {e}")))
        })
        .collect()
}

fn is_excluded(excludes: &[Pattern], relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    excludes
        .iter()
        .any(|p| p.matches(relative) || p.matches(name))
}

/// Guess a content type from the file extension
pub fn guess_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Walk `root` depth-first in sorted order, building upload work
///
/// Only the root must be readable. Entries below it that cannot be listed
/// or stat'ed become [`Upload::Unreadable`] items and fail in the batch.
async fn collect_uploads(
    root: &Path,
    bucket: &str,
    prefix: &str,
    excludes: &[Pattern],
) -> Result<Vec<WorkItem<Upload>>> {
    let mut items: Vec<WorkItem<Upload>> = Vec::new();
    // Directory to read, plus the index of its marker item (none for the root)
    let mut stack: Vec<(PathBuf, Option<usize>)> = vec![(root.to_path_buf(), None)];

    while let Some((dir, marker)) = stack.pop() {
        let entries = match read_sorted(&dir).await {
            Ok(entries) => entries,
            Err(e) => match marker {
                None => return Err(e.into()),
                Some(index) => {
                    debug!(path = %dir.display(), error = %e, "directory unreadable");
                    items[index].payload = Upload::Unreadable(e);
                    continue;
                }
            },
        };

        let mut subdirs = Vec::new();
        for path in entries {
            let relative = match local_to_key(root, &path, "") {
                Ok(relative) => relative,
                Err(e) => {
                    items.push(WorkItem {
                        name: path.display().to_string(),
                        bytes: 0,
                        payload: Upload::Unreadable(std::io::Error::other(e.to_string())),
                    });
                    continue;
                }
            };
            if is_excluded(excludes, &relative) {
                debug!(path = %path.display(), "excluded");
                continue;
            }

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    items.push(WorkItem {
                        name: format!("{prefix}{relative}"),
                        bytes: 0,
                        payload: Upload::Unreadable(e),
                    });
                    continue;
                }
            };
            if metadata.is_dir() {
                let key = format!("{prefix}{relative}/");
                subdirs.push((path, Some(items.len())));
                items.push(WorkItem {
                    name: key.clone(),
                    bytes: 0,
                    payload: Upload::Marker(RemotePath::new(bucket, key)),
                });
            } else if metadata.is_file() {
                let key = format!("{prefix}{relative}");
                items.push(WorkItem {
                    name: key.clone(),
                    bytes: metadata.len(),
                    payload: Upload::File {
                        source: path,
                        dest: RemotePath::new(bucket, key),
                    },
                });
            }
        }

        stack.extend(subdirs.into_iter().rev());
    }

    Ok(items)
}

async fn read_sorted(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Upload everything under `local_root` to `dest_prefix`
///
/// Sub-directories become marker objects so empty directories survive a
/// round trip. The root itself gets no marker.
pub async fn upload_folder(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    local_root: &Path,
    dest_prefix: &str,
    options: &TransferOptions,
) -> Result<TransferReport> {
    let metadata = tokio::fs::metadata(local_root).await.map_err(|e| {
        Error::InvalidPath(format!("'{}': {e}", local_root.display()))
    })?;
    if !metadata.is_dir() {
        return Err(Error::InvalidPath(format!(
            "'{}' is not a directory",
            local_root.display()
        )));
    }

    let prefix = normalize_prefix(dest_prefix)?;
    let excludes = compile_excludes(&options.exclude)?;
    let items = collect_uploads(local_root, bucket, &prefix, &excludes).await?;
    debug!(bucket, prefix = %prefix, items = items.len(), "uploading folder");

    let report = run_batch(items, options, |upload| {
        let store = Arc::clone(store);
        async move {
            match upload {
                Upload::Marker(dest) => {
                    store.put_object(&dest, Vec::new(), None).await?;
                }
                Upload::File { source, dest } => {
                    let data = tokio::fs::read(&source).await?;
                    store
                        .put_object(&dest, data, guess_content_type(&source))
                        .await?;
                }
                Upload::Unreadable(e) => return Err(Error::Io(e)),
            }
            Ok::<(), Error>(())
        }
    })
    .await;

    Ok(report)
}

/// Download everything under `prefix` into `local_root`
///
/// The listing happens up front and fails fast; only per-object work is
/// collected as item failures. A key that would land outside `local_root`
/// fails on its own without stopping the others.
pub async fn download_folder(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    prefix: &str,
    local_root: &Path,
    options: &TransferOptions,
) -> Result<TransferReport> {
    let prefix = normalize_prefix(prefix)?;
    let objects = listing::list_recursive(store.as_ref(), bucket, &prefix).await?;

    let mut items = Vec::with_capacity(objects.len());
    for object in objects {
        if object.key == prefix {
            continue;
        }
        let target = key_to_local(local_root, &prefix, &object.key);
        items.push(WorkItem {
            name: object.key.clone(),
            bytes: object.size(),
            payload: (RemotePath::new(bucket, object.key.as_str()), target),
        });
    }

    tokio::fs::create_dir_all(local_root).await?;
    debug!(bucket, prefix = %prefix, items = items.len(), "downloading folder");

    let report = run_batch(items, options, |(source, target): (RemotePath, Result<PathBuf>)| {
        let store = Arc::clone(store);
        async move {
            let target = target?;
            if source.is_dir {
                tokio::fs::create_dir_all(&target).await?;
                return Ok::<(), Error>(());
            }
            let data = store.get_object(&source).await?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, data).await?;
            Ok(())
        }
    })
    .await;

    Ok(report)
}

/// Delete every object under `prefix`, markers included
pub async fn delete_prefix(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    prefix: &str,
    options: &TransferOptions,
) -> Result<TransferReport> {
    let objects = listing::list_recursive(store.as_ref(), bucket, prefix).await?;
    let items = objects
        .into_iter()
        .map(|object| WorkItem {
            bytes: object.size(),
            payload: RemotePath::new(bucket, object.key.as_str()),
            name: object.key,
        })
        .collect();

    let report = run_batch(items, options, |path: RemotePath| {
        let store = Arc::clone(store);
        async move { store.delete_object(&path).await }
    })
    .await;

    Ok(report)
}

/// Upload a single local file to `dest`
pub async fn upload_file(
    store: &dyn ObjectStore,
    source: &Path,
    dest: &RemotePath,
    observer: Option<&Arc<dyn ProgressObserver>>,
) -> Result<u64> {
    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| Error::InvalidPath(format!("'{}': {e}", source.display())))?;
    if !metadata.is_file() {
        return Err(Error::InvalidPath(format!(
            "'{}' is not a file",
            source.display()
        )));
    }

    let data = tokio::fs::read(source).await?;
    let size = data.len() as u64;
    store
        .put_object(dest, data, guess_content_type(source))
        .await?;

    ProgressTracker::new(1, size, observer.cloned()).record(&dest.key, size, true);
    Ok(size)
}

/// Download a single object to `target`, creating parent directories
pub async fn download_file(
    store: &dyn ObjectStore,
    source: &RemotePath,
    target: &Path,
    observer: Option<&Arc<dyn ProgressObserver>>,
) -> Result<u64> {
    let data = store.get_object(source).await?;
    let size = data.len() as u64;
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, data).await?;

    ProgressTracker::new(1, size, observer.cloned()).record(&source.key, size, true);
    Ok(size)
}
