//! Batch organize over directory trees.
//!
//! A blocking walker feeds paths through a bounded channel (the working
//! set), and a dispatcher hands each one to at most one worker. Worker
//! concurrency is capped by a semaphore.

use super::dispatch::CancelFlag;
use super::pipeline::Pipeline;
use crate::config::PerformanceConfig;
use crate::models::{BatchSummary, FailedFile, OrganizeOutcome};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use walkdir::WalkDir;

/// Suffixes of files that are still being downloaded or written
const PARTIAL_SUFFIXES: [&str; 4] = [".tmp", ".crdownload", ".part", ".download"];

/// Hidden files and in-progress downloads are never organized
pub fn is_ignored_name(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    let lower = name.to_lowercase();
    PARTIAL_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

pub struct BatchRunner {
    pipeline: Pipeline,
    batch_size: usize,
    worker_count: usize,
    cancel: CancelFlag,
    /// Directories never descended into (destinations inside a source)
    excluded: Vec<PathBuf>,
    filter: Option<PathFilter>,
}

impl BatchRunner {
    pub fn new(pipeline: Pipeline, performance: &PerformanceConfig, cancel: CancelFlag) -> Self {
        Self {
            pipeline,
            batch_size: performance.batch_size.max(1),
            worker_count: performance.worker_count.max(1),
            cancel,
            excluded: Vec::new(),
            filter: None,
        }
    }

    pub fn excluding(mut self, dirs: Vec<PathBuf>) -> Self {
        self.excluded = dirs
            .into_iter()
            .map(|d| d.canonicalize().unwrap_or(d))
            .collect();
        self
    }

    /// Only files accepted by `filter` are dispatched
    pub fn with_filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Organize every file under `roots`. Per-file failures are collected
    /// in the summary; they never stop the run.
    pub async fn run(&self, roots: &[PathBuf]) -> BatchSummary {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(self.batch_size);

        let walker = {
            let roots = roots.to_vec();
            let excluded = self.excluded.clone();
            let filter = self.filter.clone();
            let cancel = self.cancel.clone();
            tokio::task::spawn_blocking(move || walk(&roots, &excluded, filter, &cancel, tx))
        };

        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut in_flight = FuturesUnordered::new();
        let mut summary = BatchSummary::default();

        while let Some(path) = rx.recv().await {
            if self.cancel.is_cancelled() {
                break;
            }

            let Some(claim) = self.pipeline.claim(&path) else {
                summary.record(&OrganizeOutcome::Skipped {
                    path,
                    reason: "already being processed".to_string(),
                });
                continue;
            };

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            let pipeline = self.pipeline.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                pipeline.process_claimed(claim).await
            });
            in_flight.push(async move { (path, handle.await) });

            // bound the working set
            while in_flight.len() >= self.batch_size {
                if let Some(done) = in_flight.next().await {
                    record_joined(&mut summary, done);
                }
            }
        }

        // stops the walker if we left early
        drop(rx);

        while let Some(done) = in_flight.next().await {
            record_joined(&mut summary, done);
        }

        if let Err(e) = walker.await {
            tracing::error!(error = %e, "Directory walker failed");
        }

        summary.cancelled = self.cancel.is_cancelled();
        tracing::info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "Batch complete"
        );
        summary
    }
}

fn record_joined(
    summary: &mut BatchSummary,
    (path, joined): (PathBuf, Result<OrganizeOutcome, tokio::task::JoinError>),
) {
    match joined {
        Ok(outcome) => summary.record(&outcome),
        Err(e) => summary.failed.push(FailedFile {
            path,
            reason: format!("worker failed: {}", e),
        }),
    }
}

fn walk(
    roots: &[PathBuf],
    excluded: &[PathBuf],
    filter: Option<PathFilter>,
    cancel: &CancelFlag,
    tx: mpsc::Sender<PathBuf>,
) {
    for root in roots {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.file_type().is_dir() {
                    let hidden = entry.file_name().to_string_lossy().starts_with('.');
                    let path = entry.path();
                    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
                    return !hidden && !excluded.iter().any(|d| *d == canonical);
                }
                true
            });

        for entry in walker {
            if cancel.is_cancelled() {
                return;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if is_ignored_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            if let Some(filter) = &filter {
                if !filter(entry.path()) {
                    continue;
                }
            }

            // receiver gone: the dispatcher stopped
            if tx.blocking_send(entry.into_path()).is_err() {
                return;
            }
        }
    }
}
