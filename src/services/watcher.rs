use crate::error::{FlowError, Result};
use crate::models::{OrganizeOutcome, WatcherPhase, WatcherStatus};
use crate::organize::batch::is_ignored_name;
use crate::organize::Pipeline;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

/// Quiet period before a burst of events on one file is delivered
pub const DEBOUNCE: Duration = Duration::from_millis(500);

type FlowDebouncer = Debouncer<RecommendedWatcher, RecommendedCache>;

#[derive(Default)]
struct WatcherInner {
    phase: WatcherPhase,
    started_at: Option<Instant>,
    debouncer: Option<FlowDebouncer>,
    paths: Vec<PathBuf>,
}

/// Lifecycle owner for the filesystem observer.
///
/// All transitions go through one mutex; the lock is never held while
/// files are classified or moved, so `status` stays responsive.
#[derive(Clone, Default)]
pub struct WatchCoordinator {
    inner: Arc<Mutex<WatcherInner>>,
}

impl WatchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WatcherInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Watcher state mutex was poisoned, recovering...");
            poisoned.into_inner()
        })
    }

    /// Start observing `paths` (non-recursively). Detected files are
    /// handed to `pipeline` on the current tokio runtime.
    pub fn start(&self, paths: Vec<PathBuf>, pipeline: Pipeline, worker_count: usize) -> Result<()> {
        self.start_with(paths, worker_count, move || Ok(pipeline))
    }

    /// Like [`start`](Self::start), but the pipeline is only built once
    /// this call has claimed the watcher, so a rejected start does no work.
    pub fn start_with<F>(&self, paths: Vec<PathBuf>, worker_count: usize, build: F) -> Result<()>
    where
        F: FnOnce() -> Result<Pipeline>,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FlowError::Runtime(format!("watcher needs a tokio runtime: {}", e)))?;

        {
            let mut state = self.lock();
            if state.phase != WatcherPhase::Stopped {
                return Err(FlowError::WatcherAlreadyRunning);
            }
            state.phase = WatcherPhase::Starting;
        }

        let setup = build().and_then(|pipeline| {
            build_debouncer(&paths).map(|(debouncer, events)| (debouncer, events, pipeline))
        });

        match setup {
            Ok((debouncer, events, pipeline)) => {
                runtime.spawn(dispatch(events, pipeline, worker_count.max(1)));

                let mut state = self.lock();
                state.phase = WatcherPhase::Running;
                state.started_at = Some(Instant::now());
                state.debouncer = Some(debouncer);
                state.paths = paths;
                tracing::info!(paths = ?state.paths, "Watcher started");
                Ok(())
            }
            Err(e) => {
                *self.lock() = WatcherInner::default();
                tracing::error!(error = %e, "Watcher failed to start");
                Err(e)
            }
        }
    }

    /// Detach the observer. Returns once no more events can be
    /// delivered; files already dispatched finish on their own.
    pub fn stop(&self) -> Result<()> {
        let debouncer = {
            let mut state = self.lock();
            if state.phase != WatcherPhase::Running {
                return Err(FlowError::WatcherNotRunning);
            }
            state.phase = WatcherPhase::Stopping;
            state.debouncer.take()
        };

        // joins the debouncer thread; drops the event sender with it
        if let Some(debouncer) = debouncer {
            debouncer.stop();
        }

        *self.lock() = WatcherInner::default();
        tracing::info!("Watcher stopped");
        Ok(())
    }

    pub fn status(&self) -> WatcherStatus {
        let state = self.lock();
        let running = state.phase == WatcherPhase::Running;
        WatcherStatus {
            phase: state.phase,
            running,
            uptime_seconds: state
                .started_at
                .filter(|_| running)
                .map(|t| t.elapsed().as_secs_f64()),
            watching_paths: state.paths.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().phase == WatcherPhase::Running
    }
}

fn build_debouncer(paths: &[PathBuf]) -> Result<(FlowDebouncer, mpsc::UnboundedReceiver<PathBuf>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let watched: Vec<PathBuf> = paths
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();

    let mut debouncer = new_debouncer(
        DEBOUNCE,
        None,
        move |result: std::result::Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
            Ok(events) => {
                for event in events {
                    for path in accepted_paths(&event, &watched) {
                        // receiver gone: the watcher is shutting down
                        let _ = tx.send(path);
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(error = %error, "Watcher error");
                }
            }
        },
    )?;

    for path in paths {
        debouncer.watch(path, RecursiveMode::NonRecursive)?;
    }

    Ok((debouncer, rx))
}

/// Paths worth organizing from one debounced event
fn accepted_paths(event: &DebouncedEvent, watched: &[PathBuf]) -> Vec<PathBuf> {
    let candidates: Vec<&PathBuf> = match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Access(AccessKind::Close(AccessMode::Write)) => event.paths.iter().collect(),
        // rename within view: only the new name matters
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last().into_iter().collect(),
        _ => return Vec::new(),
    };

    candidates
        .into_iter()
        .filter(|path| is_organizable(path, watched))
        .cloned()
        .collect()
}

fn is_organizable(path: &Path, watched: &[PathBuf]) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.is_empty() || is_ignored_name(&name) {
        return false;
    }

    // symlink_metadata so links are never followed
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };
    if metadata.file_type().is_symlink() || !metadata.is_file() {
        return false;
    }
    // still being written
    if metadata.len() == 0 {
        return false;
    }

    match path.canonicalize() {
        Ok(canonical) => {
            let inside = watched.iter().any(|root| canonical.starts_with(root));
            if !inside {
                tracing::warn!(path = %path.display(), "Skipping file outside watched folder");
            }
            inside
        }
        Err(_) => false,
    }
}

/// Hand each detected file to a worker without waiting for it
async fn dispatch(mut events: mpsc::UnboundedReceiver<PathBuf>, pipeline: Pipeline, worker_count: usize) {
    let semaphore = Arc::new(Semaphore::new(worker_count));

    while let Some(path) = events.recv().await {
        let Some(claim) = pipeline.claim(&path) else {
            tracing::debug!(path = %path.display(), "Already being processed");
            continue;
        };

        let pipeline = pipeline.clone();
        let semaphore = Arc::clone(&semaphore);
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            log_outcome(&pipeline.process_claimed(claim).await);
        });
    }

    tracing::debug!("Watcher dispatch loop finished");
}

fn log_outcome(outcome: &OrganizeOutcome) {
    match outcome {
        // destination names the split folder
        OrganizeOutcome::Moved {
            from,
            to,
            is_sensitive: true,
            ..
        } => {
            tracing::debug!(from = %from.display(), to = %to.display(), "Organized new file");
        }
        OrganizeOutcome::Moved { from, to, .. } => {
            tracing::info!(from = %from.display(), to = %to.display(), "Organized new file");
        }
        OrganizeOutcome::Skipped { path, reason } => {
            tracing::debug!(path = %path.display(), reason = %reason, "Skipped");
        }
        OrganizeOutcome::Failed { path, reason } => {
            tracing::warn!(path = %path.display(), reason = %reason, "Failed to organize");
        }
    }
}
