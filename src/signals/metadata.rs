//! Embedded metadata: EXIF for images, container tags for video.

use super::SignalExtractor;
use crate::config::MetadataTuning;
use crate::media::{self, MediaTools};
use crate::models::{Abstain, FileRecord, SignalScore, SignalSource};
use exif::{In, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const BASE_CONFIDENCE: f64 = 0.3;

/// Facts pulled from whichever metadata the file carries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFacts {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub f_number: Option<f64>,
    pub iso: Option<u32>,
    pub has_gps: bool,
    pub capture_hour: Option<u32>,
    /// Free text: descriptions, titles, comments, keywords
    pub text: Vec<String>,
}

impl MetadataFacts {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct MetadataExtractor {
    enabled: bool,
    tuning: MetadataTuning,
    tools: MediaTools,
}

impl MetadataExtractor {
    pub fn new(enabled: bool, tuning: MetadataTuning, tools: MediaTools) -> Self {
        Self {
            enabled,
            tuning,
            tools,
        }
    }

    fn facts_for(&self, record: &FileRecord) -> Result<Option<MetadataFacts>, Abstain> {
        if media::is_image_extension(&record.extension) {
            return Ok(read_exif(&record.path));
        }
        if media::is_video_extension(&record.extension) {
            if !self.tools.ffprobe {
                return Err(Abstain::CapabilityMissing);
            }
            return Ok(media::probe(&record.path).map(|info| facts_from_tags(&info.tags)));
        }
        Err(Abstain::UnsupportedType)
    }
}

impl SignalExtractor for MetadataExtractor {
    fn source(&self) -> SignalSource {
        SignalSource::Metadata
    }

    fn analyze(&self, record: &FileRecord) -> SignalScore {
        if !self.enabled {
            return SignalScore::abstain(SignalSource::Metadata, Abstain::Disabled);
        }

        match self.facts_for(record) {
            Ok(Some(facts)) if !facts.is_empty() => score_facts(&facts, &self.tuning),
            Ok(_) => SignalScore::abstain(SignalSource::Metadata, Abstain::NoMetadata),
            Err(reason) => SignalScore::abstain(SignalSource::Metadata, reason),
        }
    }
}

fn read_exif(path: &Path) -> Option<MetadataFacts> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "No EXIF");
            return None;
        }
    };

    let text_of = |tag: Tag| {
        exif.get_field(tag, In::PRIMARY)
            .map(|f| f.display_value().to_string().replace(['\\', '"'], ""))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let f_number = exif
        .get_field(Tag::FNumber, In::PRIMARY)
        .and_then(|f| match &f.value {
            exif::Value::Rational(v) => v.first().map(|r| r.to_f64()),
            _ => None,
        });
    let iso = exif
        .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0));
    let has_gps = exif
        .fields()
        .any(|f| f.tag == Tag::GPSLatitude || f.tag == Tag::GPSLongitude);
    let capture_hour = text_of(Tag::DateTimeOriginal)
        .or_else(|| text_of(Tag::DateTime))
        .and_then(|dt| parse_hour(&dt));

    let text = [
        Tag::ImageDescription,
        Tag::Artist,
        Tag::UserComment,
        Tag::Copyright,
    ]
    .into_iter()
    .filter_map(&text_of)
    .collect();

    Some(MetadataFacts {
        make: text_of(Tag::Make),
        model: text_of(Tag::Model),
        software: text_of(Tag::Software),
        f_number,
        iso,
        has_gps,
        capture_hour,
        text,
    })
}

/// Hour from "2024-01-31 23:15:00" or "2024:01:31 23:15:00"
fn parse_hour(datetime: &str) -> Option<u32> {
    let time = datetime.split(['T', ' ']).nth(1)?;
    let hour: u32 = time.split(':').next()?.parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Map ffprobe format tags onto the same facts EXIF provides
pub fn facts_from_tags(tags: &std::collections::BTreeMap<String, String>) -> MetadataFacts {
    let get = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| tags.get(*k))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let text = ["title", "comment", "description", "keywords", "artist", "genre"]
        .into_iter()
        .filter_map(|k| get(&[k]))
        .collect();

    MetadataFacts {
        make: get(&["com.apple.quicktime.make", "make"]),
        model: get(&["com.apple.quicktime.model", "model"]),
        software: get(&["com.apple.quicktime.software", "software", "encoder"]),
        f_number: None,
        iso: None,
        has_gps: get(&["location", "com.apple.quicktime.location.iso6709"]).is_some(),
        capture_hour: get(&["creation_time", "com.apple.quicktime.creationdate"])
            .and_then(|t| parse_hour(&t)),
        text,
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|n| !n.is_empty() && haystack.contains(&n.to_lowercase()))
}

/// Turn metadata facts into a score
pub fn score_facts(facts: &MetadataFacts, tuning: &MetadataTuning) -> SignalScore {
    let mut score: f64 = 0.0;
    let mut confidence = BASE_CONFIDENCE;
    let mut reasons: Vec<String> = Vec::new();

    if let Some(software) = &facts.software {
        if contains_any(software, &tuning.editing_software) {
            score += 0.1;
            confidence += 0.1;
            reasons.push("edited".to_string());
        }
    }

    let device = format!(
        "{} {}",
        facts.make.as_deref().unwrap_or_default(),
        facts.model.as_deref().unwrap_or_default()
    );
    if contains_any(&device, &tuning.smartphone_makers) && !facts.has_gps {
        score += 0.05;
        reasons.push("phone without gps".to_string());
    }

    if facts.f_number.is_some_and(|f| f > 0.0 && f <= 2.8) {
        score += 0.1;
        reasons.push("wide aperture".to_string());
    }

    if facts.iso.is_some_and(|iso| iso > 1600) {
        score += 0.05;
        reasons.push("high iso".to_string());
    }

    let text = facts.text.join(" ").to_lowercase();
    for keyword in &tuning.sensitive_keywords {
        if !keyword.is_empty() && text.contains(&keyword.to_lowercase()) {
            score += 0.3;
            confidence += 0.3;
            reasons.push(format!("keyword {}", keyword));
        }
    }
    for keyword in &tuning.safe_keywords {
        if !keyword.is_empty() && text.contains(&keyword.to_lowercase()) {
            score -= 0.2;
            confidence += 0.2;
            reasons.push(format!("safe keyword {}", keyword));
        }
    }

    if facts.capture_hour.is_some_and(|h| h >= 23 || h <= 5) {
        score += 0.05;
        reasons.push("late capture".to_string());
    }

    SignalScore::new(SignalSource::Metadata, score, confidence).with_detail(if reasons.is_empty() {
        "nothing notable".to_string()
    } else {
        reasons.join(", ")
    })
}
