//! Independent evidence extractors.
//!
//! Each extractor looks at one kind of evidence and returns a
//! [`SignalScore`]. Extractors never fail: anything they cannot handle
//! comes back as a zero-confidence abstention.

pub mod filename;
pub mod metadata;
pub mod properties;
pub mod visual;

pub use filename::FilenameExtractor;
pub use metadata::MetadataExtractor;
pub use properties::PropertiesExtractor;
pub use visual::VisualExtractor;

use crate::config::FlowConfig;
use crate::media::MediaTools;
use crate::models::{Abstain, FileRecord, SignalScore, SignalSource};
use futures::future::join_all;
use std::sync::Arc;

/// One evidence source. Implementations hold only immutable tuning
/// so a single instance can be shared across workers.
pub trait SignalExtractor: Send + Sync {
    fn source(&self) -> SignalSource;

    /// Score one file. Blocking; callers run it on the blocking pool.
    fn analyze(&self, record: &FileRecord) -> SignalScore;
}

/// The extractors configured for a run
#[derive(Clone)]
pub struct ExtractorSet {
    extractors: Vec<Arc<dyn SignalExtractor>>,
}

impl ExtractorSet {
    /// Built-in extractors with capabilities probed from the PATH
    pub fn from_config(config: &FlowConfig) -> Self {
        Self::with_tools(config, MediaTools::detect())
    }

    pub fn with_tools(config: &FlowConfig, tools: MediaTools) -> Self {
        let c = &config.classification;
        let table = config.category_table();

        Self::from_extractors(vec![
            Arc::new(FilenameExtractor::new(
                c.signals.filename,
                &c.sensitive_keywords,
                &c.safe_keywords,
            )),
            Arc::new(VisualExtractor::new(
                c.signals.visual,
                c.visual.clone(),
                tools,
            )),
            Arc::new(MetadataExtractor::new(
                c.signals.metadata,
                c.metadata.clone(),
                tools,
            )),
            Arc::new(PropertiesExtractor::new(c.signals.properties, table, tools)),
        ])
    }

    pub fn from_extractors(extractors: Vec<Arc<dyn SignalExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Run every extractor on the blocking pool and wait for all of them.
    /// A panicking extractor is reported as an abstention.
    pub async fn extract(&self, record: &FileRecord) -> Vec<SignalScore> {
        let record = Arc::new(record.clone());

        let tasks = self.extractors.iter().map(|extractor| {
            let extractor = Arc::clone(extractor);
            let record = Arc::clone(&record);
            let source = extractor.source();
            async move {
                match tokio::task::spawn_blocking(move || extractor.analyze(&record)).await {
                    Ok(score) => score,
                    Err(e) => {
                        tracing::warn!(source = source.as_str(), error = %e, "Extractor task failed");
                        SignalScore::abstain(source, Abstain::Unreadable)
                    }
                }
            }
        });

        join_all(tasks).await
    }

    /// Same as [`extract`](Self::extract) but on the calling thread
    pub fn extract_blocking(&self, record: &FileRecord) -> Vec<SignalScore> {
        self.extractors.iter().map(|e| e.analyze(record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SignalSource, f64, f64);

    impl SignalExtractor for Fixed {
        fn source(&self) -> SignalSource {
            self.0
        }

        fn analyze(&self, _record: &FileRecord) -> SignalScore {
            SignalScore::new(self.0, self.1, self.2)
        }
    }

    struct Panics;

    impl SignalExtractor for Panics {
        fn source(&self) -> SignalSource {
            SignalSource::Visual
        }

        fn analyze(&self, _record: &FileRecord) -> SignalScore {
            panic!("decoder blew up")
        }
    }

    #[tokio::test]
    async fn test_extract_keeps_extractor_order() {
        let set = ExtractorSet::from_extractors(vec![
            Arc::new(Fixed(SignalSource::Filename, 0.5, 1.0)),
            Arc::new(Fixed(SignalSource::Properties, 0.1, 0.3)),
        ]);
        let record = FileRecord::synthetic("/drop/a.jpg", "fp", 1);

        let scores = set.extract(&record).await;
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].source, SignalSource::Filename);
        assert_eq!(scores[1].source, SignalSource::Properties);
    }

    #[tokio::test]
    async fn test_panicking_extractor_abstains() {
        let set = ExtractorSet::from_extractors(vec![
            Arc::new(Fixed(SignalSource::Filename, 0.5, 1.0)),
            Arc::new(Panics),
        ]);
        let record = FileRecord::synthetic("/drop/a.jpg", "fp", 1);

        let scores = set.extract(&record).await;
        assert_eq!(scores[1].source, SignalSource::Visual);
        assert_eq!(scores[1].confidence, 0.0);
        assert_eq!(scores[1].abstained, Some(Abstain::Unreadable));
    }

    #[test]
    fn test_from_config_builds_all_sources() {
        let set = ExtractorSet::with_tools(&FlowConfig::default(), MediaTools::none());
        let sources: Vec<_> = set.extractors.iter().map(|e| e.source()).collect();
        assert_eq!(
            sources,
            vec![
                SignalSource::Filename,
                SignalSource::Visual,
                SignalSource::Metadata,
                SignalSource::Properties
            ]
        );
    }
}
