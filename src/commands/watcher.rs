use super::{validate_sources, FlowState};
use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::models::{MoveEvent, WatcherStatus};
use crate::organize::PipelineMode;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Start the watcher on `source_dirs` (the configured sources when empty)
pub async fn start_watcher(
    state: &FlowState,
    source_dirs: &[PathBuf],
    config: &FlowConfig,
) -> Result<()> {
    config.validate()?;

    let sources = if source_dirs.is_empty() {
        config.source_directories.as_slice()
    } else {
        source_dirs
    };
    if sources.is_empty() {
        return Err(FlowError::config("No source directories to watch"));
    }
    let sources = validate_sources(sources)?;

    let config = Arc::new(config.clone());
    state
        .watcher()
        .start_with(sources, config.performance.worker_count, || {
            state.pipeline(Arc::clone(&config), PipelineMode::Organize)
        })
}

/// Stop the watcher; returns after the observer is detached
pub async fn stop_watcher(state: &FlowState) -> Result<()> {
    let watcher = state.watcher().clone();
    tokio::task::spawn_blocking(move || watcher.stop())
        .await
        .map_err(|e| FlowError::Runtime(format!("stop task failed: {}", e)))?
}

pub fn get_watcher_status(state: &FlowState) -> WatcherStatus {
    state.watcher().status()
}

/// Receive a [`MoveEvent`] for every move made through this state
pub fn subscribe_moves(state: &FlowState) -> broadcast::Receiver<MoveEvent> {
    state.events.subscribe()
}
