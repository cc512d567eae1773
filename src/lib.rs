//! Classify new files by type and sensitivity and move them into an
//! organized folder tree, once or continuously from watched drop folders.

pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod media;
pub mod models;
pub mod organize;
pub mod services;
pub mod signals;

pub use classify::{Aggregator, Classifier, MemoryCache, ResultCache};
pub use commands::{
    cancel_batch, get_watcher_status, organize_once, organize_single, reorganize,
    start_watcher, stop_watcher, subscribe_moves, FlowState,
};
pub use config::FlowConfig;
pub use error::{FlowError, Result};
pub use models::{
    BatchSummary, ClassificationResult, FileRecord, MoveEvent, OrganizeOutcome, SignalScore,
    SignalSource, WatcherPhase, WatcherStatus,
};
pub use organize::{BatchRunner, Organizer};
pub use services::WatchCoordinator;
pub use signals::{ExtractorSet, SignalExtractor};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; the default keeps dependencies at warn and this
/// crate at info (job summaries visible). Use `RUST_LOG=debug` for
/// per-file decisions. Calling twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,fileflow=info")),
        )
        .try_init();
}
