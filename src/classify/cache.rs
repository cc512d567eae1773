//! Classification result cache
//!
//! Keyed by content fingerprint, so a renamed or moved file with the
//! same bytes reuses its verdict. The cache is an optimization only:
//! callers fall back to full analysis on a miss or a backend error.

use crate::models::ClassificationResult;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;

/// Ages beyond a century are treated as "never expire"
const MAX_AGE_CAP_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Storage for classification verdicts. Must tolerate concurrent
/// readers and writers.
pub trait ResultCache: Send + Sync {
    fn get(&self, fingerprint: &str) -> Result<Option<ClassificationResult>, CacheError>;

    fn put(&self, fingerprint: &str, result: &ClassificationResult) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory cache bounded by entry count and entry age.
/// When full, the entries with the oldest `computed_at` go first.
pub struct MemoryCache {
    /// fingerprint -> verdict (lock-free)
    entries: DashMap<String, ClassificationResult>,
    capacity: usize,
    max_age: Duration,
}

impl MemoryCache {
    pub fn new(capacity: usize, max_age_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            max_age: Duration::seconds(max_age_secs.min(MAX_AGE_CAP_SECS) as i64),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, result: &ClassificationResult) -> bool {
        Utc::now().signed_duration_since(result.computed_at) > self.max_age
    }

    /// Drop expired entries, then the oldest until `target` remain
    fn evict_to(&self, target: usize) {
        self.entries.retain(|_, result| !self.is_expired(result));

        let overflow = self.entries.len().saturating_sub(target);
        if overflow == 0 {
            return;
        }

        let mut by_age: Vec<(String, chrono::DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().computed_at))
            .collect();
        by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (key, _) in by_age.into_iter().take(overflow) {
            self.entries.remove(&key);
        }

        tracing::debug!(evicted = overflow, remaining = self.entries.len(), "Cache eviction");
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, fingerprint: &str) -> Result<Option<ClassificationResult>, CacheError> {
        // clone out before any removal; holding the ref would deadlock the shard
        let hit = self.entries.get(fingerprint).map(|entry| entry.value().clone());

        match hit {
            Some(result) if self.is_expired(&result) => {
                self.entries.remove(fingerprint);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn put(&self, fingerprint: &str, result: &ClassificationResult) -> Result<(), CacheError> {
        self.entries.insert(fingerprint.to_string(), result.clone());

        if self.entries.len() > self.capacity {
            // leave some headroom so eviction is not paid on every insert
            let target = self.capacity - self.capacity / 10;
            self.evict_to(target);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}
