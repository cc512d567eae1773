//! Data carried through the classify -> organize pipeline.

use crate::fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One file under consideration. Built once per discovery and dropped
/// after the organizer is done with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: PathBuf,
    pub content_fingerprint: String,
    /// Lowercase, no dot; empty when the name has no extension
    pub extension: String,
    pub size_bytes: u64,
    pub modified_time: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Stat and fingerprint a file on disk
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        if metadata.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }

        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        Ok(Self {
            content_fingerprint: fingerprint::fingerprint_file(&path, &metadata),
            extension: extension_of(&path),
            size_bytes: metadata.len(),
            modified_time: metadata.modified().ok().map(DateTime::<Utc>::from),
            path,
        })
    }

    /// Record for content that is not on disk (tests, previews)
    pub fn synthetic(path: impl Into<PathBuf>, fingerprint: &str, size_bytes: u64) -> Self {
        let path = path.into();
        Self {
            extension: extension_of(&path),
            content_fingerprint: fingerprint.to_string(),
            size_bytes,
            modified_time: Some(DateTime::<Utc>::from(SystemTime::UNIX_EPOCH)),
            path,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Evidence source of a [`SignalScore`]. Declaration order is the
/// order the aggregator walks scores in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Filename,
    Visual,
    Metadata,
    Properties,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Filename => "filename",
            SignalSource::Visual => "visual",
            SignalSource::Metadata => "metadata",
            SignalSource::Properties => "properties",
        }
    }
}

/// Why an extractor declined to score a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Abstain {
    Disabled,
    UnsupportedType,
    CapabilityMissing,
    NoMetadata,
    Unreadable,
}

/// One extractor's opinion of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalScore {
    pub source: SignalSource,
    /// [0, 1], higher = more likely sensitive; ignored when confidence is 0
    pub sensitivity_score: f64,
    pub category_hint: Option<String>,
    /// [0, 1]; 0 means the extractor abstained
    pub confidence: f64,
    /// Filename matched a safe keyword; forces a non-sensitive verdict
    pub safe_override: bool,
    pub abstained: Option<Abstain>,
    /// Short human-readable trace of what drove the score
    pub detail: String,
}

impl SignalScore {
    pub fn new(source: SignalSource, sensitivity_score: f64, confidence: f64) -> Self {
        Self {
            source,
            sensitivity_score: sensitivity_score.clamp(0.0, 1.0),
            category_hint: None,
            confidence: confidence.clamp(0.0, 1.0),
            safe_override: false,
            abstained: None,
            detail: String::new(),
        }
    }

    /// Zero-confidence score; the aggregator treats it as absent
    pub fn abstain(source: SignalSource, reason: Abstain) -> Self {
        Self {
            source,
            sensitivity_score: 0.0,
            category_hint: None,
            confidence: 0.0,
            safe_override: false,
            abstained: Some(reason),
            detail: format!("{:?}", reason),
        }
    }

    pub fn with_hint(mut self, category: impl Into<String>) -> Self {
        self.category_hint = Some(category.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn contributes(&self) -> bool {
        self.confidence > 0.0
    }
}

/// Aggregated verdict; the unit stored in the result cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub category: String,
    pub is_sensitive: bool,
    pub overall_confidence: f64,
    /// Weighted sensitivity before the threshold was applied
    pub weighted_sensitivity: f64,
    pub computed_at: DateTime<Utc>,
}

impl ClassificationResult {
    pub fn split_label(&self) -> &'static str {
        if self.is_sensitive {
            "NSFW"
        } else {
            "SFW"
        }
    }
}

/// Result of organizing one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrganizeOutcome {
    #[serde(rename_all = "camelCase")]
    Moved {
        from: PathBuf,
        to: PathBuf,
        category: String,
        is_sensitive: bool,
        /// Destination name got a numeric suffix
        renamed: bool,
    },
    #[serde(rename_all = "camelCase")]
    Skipped { path: PathBuf, reason: String },
    /// Source is untouched at `path`
    #[serde(rename_all = "camelCase")]
    Failed { path: PathBuf, reason: String },
}

/// Move notification for UI/notification layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEvent {
    pub path: PathBuf,
    pub destination: PathBuf,
    pub category: String,
    pub is_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary returned from batch operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<FailedFile>,
    /// Moves that landed in an NSFW folder
    pub sensitive: usize,
    /// Moves that needed a numeric suffix
    pub renamed: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &OrganizeOutcome) {
        match outcome {
            OrganizeOutcome::Moved {
                is_sensitive,
                renamed,
                ..
            } => {
                self.succeeded += 1;
                if *is_sensitive {
                    self.sensitive += 1;
                }
                if *renamed {
                    self.renamed += 1;
                }
            }
            OrganizeOutcome::Skipped { .. } => self.skipped += 1,
            OrganizeOutcome::Failed { path, reason } => self.failed.push(FailedFile {
                path: path.clone(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn merge(&mut self, other: BatchSummary) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.sensitive += other.sensitive;
        self.renamed += other.renamed;
        self.failed.extend(other.failed);
        self.cancelled |= other.cancelled;
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }
}

/// Watcher lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherPhase {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Watcher status response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStatus {
    pub phase: WatcherPhase,
    pub running: bool,
    pub uptime_seconds: Option<f64>,
    pub watching_paths: Vec<PathBuf>,
}
