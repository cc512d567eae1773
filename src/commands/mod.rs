//! Inbound operations for the CLI, REST and UI layers.
//!
//! Every operation validates its configuration (and any paths it was
//! given) before a single file is touched.

pub mod organize;
pub mod watcher;

pub use organize::{cancel_batch, organize_once, organize_single, reorganize};
pub use watcher::{get_watcher_status, start_watcher, stop_watcher, subscribe_moves};

use crate::classify::{Classifier, MemoryCache, ResultCache};
use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::events::{self, MoveNotifier};
use crate::models::MoveEvent;
use crate::organize::{BatchRegistry, DispatchLedger, Organizer, Pipeline, PipelineMode};
use crate::services::watcher::WatchCoordinator;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// System directories that are never organized or watched
#[cfg(target_os = "macos")]
const FORBIDDEN_PREFIXES: &[&str] = &[
    "/System",
    "/Library",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/private/etc",
    "/dev",
    "/cores",
];

#[cfg(target_os = "windows")]
const FORBIDDEN_PREFIXES: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const FORBIDDEN_PREFIXES: &[&str] = &[
    "/usr", "/bin", "/sbin", "/lib", "/lib64", "/etc", "/dev", "/proc", "/sys", "/boot",
];

/// Validate that a directory is safe to organize from or watch
pub fn validate_source_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(FlowError::config(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(FlowError::config(format!(
            "Path is not a directory: {}",
            path.display()
        )));
    }

    // Resolve symlinks before comparing
    let canonical = path
        .canonicalize()
        .map_err(|e| FlowError::config(format!("Cannot resolve path: {}", e)))?;

    if canonical.parent().is_none() {
        return Err(FlowError::config("Cannot use the root directory"));
    }

    for forbidden in FORBIDDEN_PREFIXES {
        if canonical.starts_with(forbidden) {
            return Err(FlowError::config(format!(
                "Cannot use system directory: {}",
                forbidden
            )));
        }
    }

    Ok(canonical)
}

fn validate_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| validate_source_dir(p)).collect()
}

/// Process-wide state shared by every inbound operation.
///
/// Batch runs and the watcher share the verdict cache, the dispatch
/// ledger and the move-event channel. Each batch run gets its own
/// cancel flag.
pub struct FlowState {
    watcher: WatchCoordinator,
    cache: Arc<MemoryCache>,
    ledger: DispatchLedger,
    events: broadcast::Sender<MoveEvent>,
    batches: BatchRegistry,
    /// Classification-relevant settings the cache was filled under
    cache_basis: Mutex<Option<String>>,
}

impl FlowState {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            watcher: WatchCoordinator::new(),
            cache: Arc::new(MemoryCache::new(
                config.performance.cache_capacity,
                config.performance.cache_max_age_secs,
            )),
            ledger: DispatchLedger::new(),
            events: events::channel(),
            batches: BatchRegistry::new(),
            cache_basis: Mutex::new(None),
        }
    }

    pub fn watcher(&self) -> &WatchCoordinator {
        &self.watcher
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    pub fn ledger(&self) -> &DispatchLedger {
        &self.ledger
    }

    /// Batch runs in progress
    pub fn batches(&self) -> &BatchRegistry {
        &self.batches
    }

    /// Drop cached verdicts made under different classification settings
    fn sync_cache(&self, config: &FlowConfig) {
        let basis = serde_json::to_string(&(&config.classification, &config.file_types)).ok();

        let mut current = self.cache_basis.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Cache basis mutex was poisoned, recovering...");
            poisoned.into_inner()
        });

        if current.is_some() && *current != basis {
            match self.cache.clear() {
                Ok(()) => tracing::info!("Classification settings changed, cache cleared"),
                Err(e) => tracing::warn!(error = %e, "Failed to clear cache"),
            }
        }
        *current = basis;
    }

    /// Wire a pipeline for one configuration
    pub(crate) fn pipeline(&self, config: Arc<FlowConfig>, mode: PipelineMode) -> Result<Pipeline> {
        self.sync_cache(&config);

        let cache: Arc<dyn ResultCache> = self.cache.clone();
        let classifier = Classifier::from_config(Arc::clone(&config), Some(cache));
        let organizer = Arc::new(Organizer::new(Arc::clone(&config))?);
        let notifier = MoveNotifier::new(self.events.clone(), &config);

        Ok(Pipeline::new(
            classifier,
            organizer,
            notifier,
            self.ledger.clone(),
            mode,
        ))
    }
}
