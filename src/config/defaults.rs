//! Documented defaults. The keyword lists and tiers are starting points
//! meant to be tuned, not ground truth.

use super::{
    ClassificationConfig, FlowConfig, MetadataTuning, PerformanceConfig, SignalToggles,
    SignalWeights, VisualTuning,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Fallback category for unmapped extensions
pub const OTHER_CATEGORY: &str = "Other";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_file_types() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 7] = [
        (
            "Images",
            &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "tiff", "tif"],
        ),
        (
            "Documents",
            &["pdf", "docx", "doc", "txt", "odt", "xlsx", "pptx"],
        ),
        (
            "Videos",
            &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v"],
        ),
        ("Music", &["mp3", "wav", "ogg", "flac"]),
        ("Archives", &["zip", "tar", "gz", "rar", "7z"]),
        ("Software", &["sh", "appimage", "deb", "rpm", "bin", "run"]),
        (OTHER_CATEGORY, &[]),
    ];

    table
        .iter()
        .map(|(category, exts)| (category.to_string(), strings(exts)))
        .collect()
}

impl Default for FlowConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let downloads = dirs::download_dir().unwrap_or_else(|| home.join("Downloads"));

        Self {
            source_directories: vec![downloads],
            destination_root: home,
            destination_overrides: BTreeMap::new(),
            file_types: default_file_types(),
            split_categories: strings(&["Images", "Videos"]),
            classification: ClassificationConfig::default(),
            pattern_rules: Vec::new(),
            performance: PerformanceConfig::default(),
            notify_on_move: true,
            notify_sensitive_moves: true,
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            classify_media_only: true,
            threshold: 0.5,
            signals: SignalToggles::default(),
            weights: SignalWeights::default(),
            sensitive_keywords: strings(&[
                "porn", "xxx", "sex", "nude", "nudes", "naked", "nsfw", "adult", "erotic",
                "hentai", "hardcore", "softcore", "onlyfans", "pornhub", "xvideos", "xhamster",
                "fetish", "bdsm", "boobs", "tits", "lingerie", "boudoir", "topless", "rule34",
                "masturbat*", "orgasm*", "blowjob", "handjob", "gangbang", "threesome",
            ]),
            safe_keywords: strings(&[
                "family", "kids", "children", "baby", "wedding", "graduation", "vacation",
                "travel", "nature", "landscape", "food", "recipe", "tutorial", "education",
                "work", "business", "meeting",
            ]),
            visual: VisualTuning::default(),
            metadata: MetadataTuning::default(),
        }
    }
}

impl Default for SignalToggles {
    fn default() -> Self {
        Self {
            filename: true,
            visual: true,
            metadata: true,
            properties: true,
        }
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            filename: 1.0,
            visual: 2.0,
            metadata: 1.5,
            properties: 0.5,
        }
    }
}

impl Default for VisualTuning {
    fn default() -> Self {
        Self {
            skin_low: 0.2,
            skin_mid: 0.4,
            skin_high: 0.6,
            max_dimension: 256,
            video_frame_samples: 3,
        }
    }
}

impl Default for MetadataTuning {
    fn default() -> Self {
        Self {
            sensitive_keywords: strings(&[
                "adult", "nude", "naked", "sexy", "erotic", "porn", "xxx", "boudoir",
                "intimate", "sensual", "lingerie",
            ]),
            safe_keywords: strings(&[
                "family", "wedding", "portrait", "landscape", "nature", "travel", "vacation",
                "business", "professional", "corporate", "event",
            ]),
            editing_software: strings(&[
                "photoshop", "gimp", "paint.net", "canva", "pixlr", "snapseed", "facetune",
                "vsco", "lightroom", "afterlight", "beauty", "filter",
            ]),
            smartphone_makers: strings(&["iphone", "apple", "samsung", "pixel", "google", "oneplus", "huawei"]),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            worker_count: num_cpus::get().clamp(1, 8),
            cache_enabled: true,
            cache_capacity: 10_000,
            cache_max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}
