//! Turning extractor scores into a verdict.
//!
//! [`Aggregator`] is the pure part: scores in, [`ClassificationResult`]
//! out. [`Classifier`] wires extractors, aggregator and cache together
//! for one configuration.

pub mod cache;

pub use cache::{CacheError, MemoryCache, ResultCache};

use crate::config::{CategoryTable, FlowConfig, SignalWeights};
use crate::models::{ClassificationResult, FileRecord, SignalScore, SignalSource};
use crate::signals::ExtractorSet;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Combines scores with per-source weights against a threshold
#[derive(Debug, Clone)]
pub struct Aggregator {
    weights: SignalWeights,
    threshold: f64,
    categories: CategoryTable,
}

impl Aggregator {
    pub fn new(weights: SignalWeights, threshold: f64, categories: CategoryTable) -> Self {
        Self {
            weights,
            threshold,
            categories,
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(
            config.classification.weights,
            config.classification.threshold,
            config.category_table(),
        )
    }

    fn weight(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::Filename => self.weights.filename,
            SignalSource::Visual => self.weights.visual,
            SignalSource::Metadata => self.weights.metadata,
            SignalSource::Properties => self.weights.properties,
        }
    }

    fn total_weight(&self) -> f64 {
        self.weights.filename + self.weights.visual + self.weights.metadata + self.weights.properties
    }

    pub fn aggregate(&self, record: &FileRecord, scores: &[SignalScore]) -> ClassificationResult {
        self.aggregate_at(record, scores, Utc::now())
    }

    /// Same inputs and the same `at` always give the same result
    pub fn aggregate_at(
        &self,
        record: &FileRecord,
        scores: &[SignalScore],
        at: DateTime<Utc>,
    ) -> ClassificationResult {
        let mut contributing: Vec<&SignalScore> =
            scores.iter().filter(|s| s.contributes()).collect();
        // stable: equal sources keep their input order
        contributing.sort_by_key(|s| s.source);

        let category = contributing
            .iter()
            .find_map(|s| s.category_hint.clone())
            .unwrap_or_else(|| self.categories.resolve(&record.extension));

        let mut evidence = 0.0;
        let mut weighted_sum = 0.0;
        for score in &contributing {
            let w = score.confidence * self.weight(score.source);
            evidence += w;
            weighted_sum += score.sensitivity_score * w;
        }

        if evidence <= 0.0 {
            tracing::debug!(path = %record.path.display(), "Classification indeterminate, defaulting to non-sensitive");
            return ClassificationResult {
                category,
                is_sensitive: false,
                overall_confidence: 0.0,
                weighted_sensitivity: 0.0,
                computed_at: at,
            };
        }

        let weighted = weighted_sum / evidence;
        let safe_override = contributing
            .iter()
            .any(|s| s.source == SignalSource::Filename && s.safe_override);
        let is_sensitive = !safe_override && weighted > self.threshold;

        let total = self.total_weight();
        let overall_confidence = if total > 0.0 {
            (evidence / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        tracing::debug!(
            path = %record.path.display(),
            weighted,
            safe_override,
            is_sensitive,
            category = %category,
            "Aggregated verdict"
        );

        ClassificationResult {
            category,
            is_sensitive,
            overall_confidence,
            weighted_sensitivity: weighted,
            computed_at: at,
        }
    }
}

/// Extractors + aggregator + optional cache for one configuration
#[derive(Clone)]
pub struct Classifier {
    extractors: ExtractorSet,
    aggregator: Aggregator,
    cache: Option<Arc<dyn ResultCache>>,
    config: Arc<FlowConfig>,
}

impl Classifier {
    pub fn new(
        config: Arc<FlowConfig>,
        extractors: ExtractorSet,
        cache: Option<Arc<dyn ResultCache>>,
    ) -> Self {
        Self {
            aggregator: Aggregator::from_config(&config),
            extractors,
            cache,
            config,
        }
    }

    /// Built-in extractors; the cache is used only if enabled in config
    pub fn from_config(config: Arc<FlowConfig>, cache: Option<Arc<dyn ResultCache>>) -> Self {
        let cache = cache.filter(|_| config.performance.cache_enabled);
        Self::new(Arc::clone(&config), ExtractorSet::from_config(&config), cache)
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Verdict without running extractors, for files that never get split
    fn unanalysed(&self, record: &FileRecord) -> Option<ClassificationResult> {
        let c = &self.config.classification;
        let category = self.config.category_table().resolve(&record.extension);

        let skip = !c.enabled || (c.classify_media_only && !self.config.is_split_category(&category));
        skip.then(|| ClassificationResult {
            category,
            is_sensitive: false,
            overall_confidence: 0.0,
            weighted_sensitivity: 0.0,
            computed_at: Utc::now(),
        })
    }

    /// Cached verdict when available, otherwise run all extractors
    pub async fn classify(&self, record: &FileRecord) -> ClassificationResult {
        if let Some(result) = self.unanalysed(record) {
            return result;
        }

        if let Some(cache) = &self.cache {
            match cache.get(&record.content_fingerprint) {
                Ok(Some(hit)) => {
                    tracing::debug!(path = %record.path.display(), "Classification cache hit");
                    return hit;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Cache lookup failed, analysing from scratch");
                }
            }
        }

        self.analyse_and_store(record).await
    }

    /// Ignore any cached verdict; the fresh one replaces it
    pub async fn classify_fresh(&self, record: &FileRecord) -> ClassificationResult {
        if let Some(result) = self.unanalysed(record) {
            return result;
        }
        self.analyse_and_store(record).await
    }

    async fn analyse_and_store(&self, record: &FileRecord) -> ClassificationResult {
        let scores = self.extractors.extract(record).await;
        let result = self.aggregator.aggregate(record, &scores);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&record.content_fingerprint, &result) {
                tracing::warn!(error = %e, "Cache store failed");
            }
        }

        result
    }
}
