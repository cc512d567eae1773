#![allow(dead_code)]

use fileflow::classify::{Classifier, ResultCache};
use fileflow::events::MoveNotifier;
use fileflow::models::{FileRecord, SignalScore, SignalSource};
use fileflow::organize::{DispatchLedger, Organizer, Pipeline, PipelineMode};
use fileflow::signals::{ExtractorSet, SignalExtractor};
use fileflow::FlowConfig;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Config sending everything below `root`, with no configured sources
pub fn config_at(root: &Path) -> FlowConfig {
    let mut config = FlowConfig::default();
    config.destination_root = root.to_path_buf();
    config.source_directories = Vec::new();
    config
}

/// Extractor that always returns the same score and counts its calls
pub struct FixedExtractor {
    pub source: SignalSource,
    pub score: f64,
    pub confidence: f64,
    pub calls: Arc<AtomicUsize>,
}

impl FixedExtractor {
    pub fn new(source: SignalSource, score: f64, confidence: f64) -> Self {
        Self {
            source,
            score,
            confidence,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SignalExtractor for FixedExtractor {
    fn source(&self) -> SignalSource {
        self.source
    }

    fn analyze(&self, _record: &FileRecord) -> SignalScore {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SignalScore::new(self.source, self.score, self.confidence)
    }
}

pub fn pipeline_with(
    config: FlowConfig,
    extractors: Vec<Arc<dyn SignalExtractor>>,
    cache: Option<Arc<dyn ResultCache>>,
) -> Pipeline {
    let config = Arc::new(config);
    let classifier = Classifier::new(
        Arc::clone(&config),
        ExtractorSet::from_extractors(extractors),
        cache,
    );
    let organizer = Arc::new(Organizer::new(Arc::clone(&config)).unwrap());
    Pipeline::new(
        classifier,
        organizer,
        MoveNotifier::detached(&config),
        DispatchLedger::new(),
        PipelineMode::Organize,
    )
}

/// Write a small real JPEG with a flat colour
pub fn write_jpeg(path: &Path, rgb: [u8; 3]) {
    let img = image::RgbImage::from_pixel(64, 64, image::Rgb(rgb));
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}
