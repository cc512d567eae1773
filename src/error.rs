//! Error taxonomy for the classification and organization core.
//!
//! Per-file problems (an extractor that cannot read a file, a move that
//! fails) are folded into outcomes and summaries. Only operation-level
//! failures travel through [`FlowError`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Malformed rule tables, thresholds out of range, bad source paths.
    /// Raised before any file is touched.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Watcher is already running")]
    WatcherAlreadyRunning,

    #[error("Watcher is not running")]
    WatcherNotRunning,

    /// The source file is still at its original path.
    #[error("Failed to move {}: {reason}", path.display())]
    MoveFailed { path: PathBuf, reason: String },

    #[error("Source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl FlowError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigInvalid(message.into())
    }

    pub fn move_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MoveFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
