use super::{validate_source_dir, validate_sources, FlowState};
use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::models::{BatchSummary, OrganizeOutcome};
use crate::organize::{BatchRunner, PipelineMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Organize every file under `source_dirs` (the configured sources when
/// empty). `dest_root` replaces the configured destinations for this run.
pub async fn organize_once(
    state: &FlowState,
    source_dirs: &[PathBuf],
    dest_root: Option<&Path>,
    config: &FlowConfig,
) -> Result<BatchSummary> {
    config.validate()?;

    let config = Arc::new(match dest_root {
        Some(root) => config.with_destination_root(root),
        None => config.clone(),
    });
    let sources = if source_dirs.is_empty() {
        config.source_directories.as_slice()
    } else {
        source_dirs
    };
    let sources = validate_sources(sources)?;

    let pipeline = state.pipeline(Arc::clone(&config), PipelineMode::Organize)?;
    // destinations may live inside a source folder
    let excluded = pipeline.organizer().destination_dirs();

    let registration = state.batches().register();
    tracing::info!(sources = ?sources, "Organizing");
    let summary = BatchRunner::new(pipeline, &config.performance, registration.flag())
        .excluding(excluded)
        .run(&sources)
        .await;
    Ok(summary)
}

/// Re-run sensitivity classification over already organized media and
/// move files whose verdict changed into the other split folder.
pub async fn reorganize(
    state: &FlowState,
    target_dirs: &[PathBuf],
    config: &FlowConfig,
) -> Result<BatchSummary> {
    config.validate()?;

    if !config.classification.enabled {
        tracing::info!("Classification disabled, nothing to reorganize");
        return Ok(BatchSummary::default());
    }

    let targets = if target_dirs.is_empty() {
        // configured destinations of split categories that exist
        config
            .split_categories
            .iter()
            .map(|category| config.category_destination(category))
            .filter(|dir| dir.is_dir())
            .collect::<Vec<_>>()
    } else {
        target_dirs.to_vec()
    };
    let targets = validate_sources(&targets)?;

    let config = Arc::new(config.clone());
    let pipeline = state.pipeline(Arc::clone(&config), PipelineMode::Reorganize)?;

    let categories = config.category_table();
    let media_only = {
        let config = Arc::clone(&config);
        move |path: &Path| {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            config.is_split_category(&categories.resolve(&ext))
        }
    };

    let registration = state.batches().register();
    tracing::info!(targets = ?targets, "Reorganizing");
    let summary = BatchRunner::new(pipeline, &config.performance, registration.flag())
        .with_filter(media_only)
        .run(&targets)
        .await;
    Ok(summary)
}

/// Classify and place one file
pub async fn organize_single(
    state: &FlowState,
    path: &Path,
    dest_root: Option<&Path>,
    config: &FlowConfig,
) -> Result<OrganizeOutcome> {
    config.validate()?;

    if !path.exists() {
        return Err(FlowError::SourceMissing(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(FlowError::config(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        validate_source_dir(parent)?;
    }

    let config = Arc::new(match dest_root {
        Some(root) => config.with_destination_root(root),
        None => config.clone(),
    });
    let pipeline = state.pipeline(config, PipelineMode::Organize)?;
    Ok(pipeline.process(path).await)
}

/// Ask running batches to stop after the files they are moving. Runs
/// started later are unaffected.
pub fn cancel_batch(state: &FlowState) {
    let cancelled = state.batches().cancel_all();
    tracing::info!(runs = cancelled, "Batch cancellation requested");
}
