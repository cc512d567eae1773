//! Configuration consumed by the core.
//!
//! Loading and saving is plain JSON; the shape mirrors what the settings
//! UI and REST layer write. Every inbound operation calls
//! [`FlowConfig::validate`] before touching a file.

mod defaults;

use crate::error::{FlowError, Result};
use crate::organize::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub use defaults::OTHER_CATEGORY;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct FlowConfig {
    /// Drop folders scanned by batch runs and observed by the watcher
    pub source_directories: Vec<PathBuf>,
    /// `{destination_root}/{category}` unless overridden per category
    pub destination_root: PathBuf,
    /// Explicit destination per category name
    pub destination_overrides: BTreeMap<String, PathBuf>,
    /// Category name -> extensions (with or without leading dot)
    pub file_types: BTreeMap<String, Vec<String>>,
    /// Categories that get an SFW/NSFW subdirectory
    pub split_categories: Vec<String>,
    pub classification: ClassificationConfig,
    /// Ordered custom filename rules, first match wins
    pub pattern_rules: Vec<PatternRule>,
    pub performance: PerformanceConfig,
    pub notify_on_move: bool,
    pub notify_sensitive_moves: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct ClassificationConfig {
    pub enabled: bool,
    /// Skip extractors for categories that are not split
    pub classify_media_only: bool,
    /// Weighted sensitivity strictly above this is sensitive
    pub threshold: f64,
    pub signals: SignalToggles,
    pub weights: SignalWeights,
    pub sensitive_keywords: Vec<String>,
    /// Safe keywords win over sensitive ones in the same name
    pub safe_keywords: Vec<String>,
    pub visual: VisualTuning,
    pub metadata: MetadataTuning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct SignalToggles {
    pub filename: bool,
    pub visual: bool,
    pub metadata: bool,
    pub properties: bool,
}

/// Per-source multipliers applied on top of each score's own confidence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct SignalWeights {
    pub filename: f64,
    pub visual: f64,
    pub metadata: f64,
    pub properties: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct VisualTuning {
    /// Skin-pixel ratio tiers (fractions of the frame)
    pub skin_low: f64,
    pub skin_mid: f64,
    pub skin_high: f64,
    /// Frames are downscaled to fit this box before analysis
    pub max_dimension: u32,
    /// Frames sampled per video when ffmpeg is installed
    pub video_frame_samples: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct MetadataTuning {
    pub sensitive_keywords: Vec<String>,
    pub safe_keywords: Vec<String>,
    pub editing_software: Vec<String>,
    pub smartphone_makers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct PerformanceConfig {
    /// Files listed and dispatched per working set
    pub batch_size: usize,
    /// Concurrent classify+move workers
    pub worker_count: usize,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub cache_max_age_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    Glob,
    Regex,
}

/// Custom filename rule; matched against the file name only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PatternRule {
    pub pattern: String,
    #[serde(default)]
    pub kind: PatternKind,
    /// Relative destinations are joined onto the destination root
    pub destination: PathBuf,
    /// Append SFW/NSFW below the rule destination
    #[serde(default)]
    pub split_sensitivity: bool,
}

impl FlowConfig {
    /// Default config file location (`~/.config/fileflow/config.json` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fileflow").join("config.json"))
    }

    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            FlowError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (or the default location); writes defaults if absent
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if path.exists() {
            return Self::load(&path);
        }

        let config = Self::default();
        if let Err(e) = config.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Could not write default config");
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FlowError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Copy with every category sent below `root` (ad-hoc `--dest` runs)
    pub fn with_destination_root(&self, root: &Path) -> Self {
        let mut config = self.clone();
        config.destination_root = root.to_path_buf();
        config.destination_overrides.clear();
        config
    }

    /// Extension -> category lookup built from `file_types`
    pub fn category_table(&self) -> CategoryTable {
        CategoryTable::from_file_types(&self.file_types)
    }

    /// Directory a category lands in, before any SFW/NSFW split
    pub fn category_destination(&self, category: &str) -> PathBuf {
        self.destination_overrides
            .get(category)
            .cloned()
            .unwrap_or_else(|| self.destination_root.join(category))
    }

    pub fn is_split_category(&self, category: &str) -> bool {
        self.split_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    /// Reject anything that would make a run misbehave
    pub fn validate(&self) -> Result<()> {
        let c = &self.classification;

        if !c.threshold.is_finite() || !(0.0..=1.0).contains(&c.threshold) {
            return Err(FlowError::config(format!(
                "sensitivity threshold must be within [0, 1], got {}",
                c.threshold
            )));
        }

        let weights = [
            ("filename", c.weights.filename),
            ("visual", c.weights.visual),
            ("metadata", c.weights.metadata),
            ("properties", c.weights.properties),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(FlowError::config(format!(
                    "weight for {} signal must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if c.enabled && weights.iter().all(|(_, w)| *w == 0.0) {
            return Err(FlowError::config("all signal weights are zero"));
        }

        let v = &c.visual;
        let tiers_ok = [v.skin_low, v.skin_mid, v.skin_high]
            .iter()
            .all(|t| t.is_finite() && (0.0..=1.0).contains(t));
        if !tiers_ok || v.skin_low > v.skin_mid || v.skin_mid > v.skin_high {
            return Err(FlowError::config(
                "visual skin tiers must satisfy 0 <= low <= mid <= high <= 1",
            ));
        }
        if v.max_dimension == 0 {
            return Err(FlowError::config("visual max_dimension must be positive"));
        }

        let p = &self.performance;
        if p.batch_size == 0 {
            return Err(FlowError::config("batch_size must be at least 1"));
        }
        if p.worker_count == 0 {
            return Err(FlowError::config("worker_count must be at least 1"));
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for (category, extensions) in &self.file_types {
            if category.trim().is_empty() {
                return Err(FlowError::config("category names must not be empty"));
            }
            for ext in extensions {
                let normalized = normalize_extension(ext);
                if normalized.is_empty() {
                    return Err(FlowError::config(format!(
                        "empty extension in category {}",
                        category
                    )));
                }
                if let Some(previous) = seen.insert(normalized.clone(), category) {
                    if previous != category {
                        return Err(FlowError::config(format!(
                            "extension .{} is mapped to both {} and {}",
                            normalized, previous, category
                        )));
                    }
                }
            }
        }

        RuleSet::compile(&self.pattern_rules)?;

        Ok(())
    }
}

/// Extension -> category index
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    by_extension: HashMap<String, String>,
}

impl CategoryTable {
    pub fn from_file_types(file_types: &BTreeMap<String, Vec<String>>) -> Self {
        let mut by_extension = HashMap::new();
        for (category, extensions) in file_types {
            for ext in extensions {
                by_extension.insert(normalize_extension(ext), category.clone());
            }
        }
        Self { by_extension }
    }

    /// Category for an extension, `None` when unmapped
    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(&normalize_extension(extension))
            .map(String::as_str)
    }

    /// Category for an extension, falling back to "Other"
    pub fn resolve(&self, extension: &str) -> String {
        self.lookup(extension)
            .unwrap_or(OTHER_CATEGORY)
            .to_string()
    }
}

/// Lowercase, no leading dot
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
