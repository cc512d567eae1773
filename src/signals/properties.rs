//! Raw file properties: size, duration and sniffed container format.

use super::SignalExtractor;
use crate::config::CategoryTable;
use crate::media::{self, MediaTools};
use crate::models::{Abstain, FileRecord, SignalScore, SignalSource};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

/// Bytes read for format sniffing
const SNIFF_LEN: usize = 16;

/// A container format recognised from its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub mime: &'static str,
    /// Typical extension, used to ask the category table for a hint
    pub extension: &'static str,
}

impl Sniffed {
    fn top_level(&self) -> &'static str {
        self.mime.split('/').next().unwrap_or(self.mime)
    }
}

const fn sniffed(mime: &'static str, extension: &'static str) -> Option<Sniffed> {
    Some(Sniffed { mime, extension })
}

/// Recognise common formats from magic bytes
pub fn sniff(head: &[u8]) -> Option<Sniffed> {
    let starts = |magic: &[u8]| head.starts_with(magic);
    let riff_kind = |kind: &[u8]| head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == kind;

    if starts(&[0xFF, 0xD8, 0xFF]) {
        sniffed("image/jpeg", "jpg")
    } else if starts(b"\x89PNG\r\n\x1a\n") {
        sniffed("image/png", "png")
    } else if starts(b"GIF87a") || starts(b"GIF89a") {
        sniffed("image/gif", "gif")
    } else if riff_kind(b"WEBP") {
        sniffed("image/webp", "webp")
    } else if starts(b"II*\0") || starts(b"MM\0*") {
        sniffed("image/tiff", "tiff")
    } else if riff_kind(b"AVI ") {
        sniffed("video/x-msvideo", "avi")
    } else if riff_kind(b"WAVE") {
        sniffed("audio/wav", "wav")
    } else if head.len() >= 12 && &head[4..8] == b"ftyp" {
        if &head[8..12] == b"M4A " {
            sniffed("audio/mp4", "m4a")
        } else {
            sniffed("video/mp4", "mp4")
        }
    } else if starts(&[0x1A, 0x45, 0xDF, 0xA3]) {
        sniffed("video/x-matroska", "mkv")
    } else if starts(b"FLV") {
        sniffed("video/x-flv", "flv")
    } else if starts(b"ID3") {
        sniffed("audio/mpeg", "mp3")
    } else if starts(b"OggS") {
        sniffed("audio/ogg", "ogg")
    } else if starts(b"fLaC") {
        sniffed("audio/flac", "flac")
    } else if starts(b"%PDF") {
        sniffed("application/pdf", "pdf")
    } else if starts(b"PK\x03\x04") {
        sniffed("application/zip", "zip")
    } else if starts(&[0x1F, 0x8B]) {
        sniffed("application/gzip", "gz")
    } else if starts(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        sniffed("application/x-7z-compressed", "7z")
    } else if starts(b"Rar!") {
        sniffed("application/vnd.rar", "rar")
    } else if starts(b"\x7fELF") {
        sniffed("application/x-executable", "bin")
    } else {
        None
    }
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut head = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);
    Ok(head)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Apparent {
    Image,
    Video,
    Other,
}

pub struct PropertiesExtractor {
    enabled: bool,
    categories: CategoryTable,
    tools: MediaTools,
}

impl PropertiesExtractor {
    pub fn new(enabled: bool, categories: CategoryTable, tools: MediaTools) -> Self {
        Self {
            enabled,
            categories,
            tools,
        }
    }

    fn apparent(extension: &str) -> (Apparent, Option<mime_guess::Mime>) {
        let guessed = mime_guess::from_ext(extension).first();
        let kind = match guessed.as_ref().map(|m| m.type_()) {
            Some(t) if t == mime_guess::mime::IMAGE => Apparent::Image,
            Some(t) if t == mime_guess::mime::VIDEO => Apparent::Video,
            _ if media::is_video_extension(extension) => Apparent::Video,
            _ => Apparent::Other,
        };
        (kind, guessed)
    }
}

impl SignalExtractor for PropertiesExtractor {
    fn source(&self) -> SignalSource {
        SignalSource::Properties
    }

    fn analyze(&self, record: &FileRecord) -> SignalScore {
        if !self.enabled {
            return SignalScore::abstain(SignalSource::Properties, Abstain::Disabled);
        }

        let (kind, guessed) = Self::apparent(&record.extension);
        let mut score: f64 = 0.0;
        let mut reasons: Vec<String> = Vec::new();

        let confidence = match kind {
            Apparent::Image => {
                if record.size_bytes > 10 * MB {
                    score += 0.2;
                    reasons.push("very large image".to_string());
                } else if record.size_bytes > 5 * MB {
                    score += 0.1;
                    reasons.push("large image".to_string());
                }
                0.3
            }
            Apparent::Video => {
                if record.size_bytes > GB {
                    score += 0.3;
                    reasons.push("very large video".to_string());
                } else if record.size_bytes > 500 * MB {
                    score += 0.2;
                    reasons.push("large video".to_string());
                }
                if self.tools.ffprobe {
                    let duration = media::probe(&record.path).and_then(|p| p.duration_secs);
                    if duration.is_some_and(|d| (60.0..=300.0).contains(&d)) {
                        score += 0.2;
                        reasons.push("short clip".to_string());
                    }
                }
                0.4
            }
            Apparent::Other => 0.2,
        };

        let mut hint = None;
        match read_head(&record.path).map(|head| sniff(&head)) {
            Ok(Some(found)) => {
                let mismatch = match &guessed {
                    Some(mime) => mime.type_().as_str() != found.top_level(),
                    None => false,
                };
                if mismatch || guessed.is_none() {
                    hint = self.categories.lookup(found.extension).map(str::to_string);
                }
                if mismatch {
                    score += 0.1;
                    reasons.push(format!("content looks like {}", found.mime));
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::trace!(path = %record.path.display(), error = %e, "Could not read header");
            }
        }

        let mut result = SignalScore::new(SignalSource::Properties, score, confidence)
            .with_detail(if reasons.is_empty() {
                "unremarkable".to_string()
            } else {
                reasons.join(", ")
            });
        result.category_hint = hint;
        result
    }
}
