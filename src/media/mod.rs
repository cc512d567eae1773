//! External media tooling (ffmpeg / ffprobe) and file-type helpers.
//!
//! Both tools are optional. Availability is probed once per process and
//! extractors that need a missing tool abstain instead of failing.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Which optional tools are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaTools {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

static DETECTED: Lazy<MediaTools> = Lazy::new(|| {
    let tools = MediaTools {
        ffmpeg: tool_available("ffmpeg"),
        ffprobe: tool_available("ffprobe"),
    };
    tracing::info!(
        ffmpeg = tools.ffmpeg,
        ffprobe = tools.ffprobe,
        "Media tool capabilities detected"
    );
    tools
});

fn tool_available(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

impl MediaTools {
    /// Probe the PATH once; later calls reuse the first answer
    pub fn detect() -> Self {
        *DETECTED
    }

    /// No external tools; extractors fall back to in-process analysis
    pub fn none() -> Self {
        Self {
            ffmpeg: false,
            ffprobe: false,
        }
    }
}

/// Extensions the `image` crate decodes
pub fn is_image_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" | "tif"
    )
}

pub fn is_video_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "mp4" | "avi" | "mov" | "mkv" | "webm" | "flv" | "wmv" | "m4v"
    )
}

/// Container-level facts reported by ffprobe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub duration_secs: Option<f64>,
    /// Lowercased tag name -> value
    pub tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Run ffprobe on a file. `None` when it fails or reports nothing.
pub fn probe(path: &Path) -> Option<ProbeInfo> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::debug!(path = %path.display(), "ffprobe exited with {}", output.status);
        return None;
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_json(raw: &str) -> Option<ProbeInfo> {
    let parsed: ProbeOutput = serde_json::from_str(raw).ok()?;
    let format = parsed.format?;

    Some(ProbeInfo {
        duration_secs: format
            .duration
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0),
        tags: format
            .tags
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect(),
    })
}

/// Timestamps spread evenly through a clip, excluding its very ends
pub fn frame_timestamps(duration_secs: Option<f64>, samples: u32) -> Vec<f64> {
    let samples = samples.max(1);
    match duration_secs {
        Some(d) if d > 0.0 => (1..=samples)
            .map(|i| d * i as f64 / (samples + 1) as f64)
            .collect(),
        _ => vec![0.0],
    }
}

/// Grab one frame at `at_secs`, scaled to fit `max_dimension`.
pub fn extract_frame(
    path: &Path,
    at_secs: f64,
    max_dimension: u32,
) -> Result<image::DynamicImage, String> {
    let temp_output: PathBuf =
        std::env::temp_dir().join(format!("fileflow_frame_{}.png", uuid::Uuid::new_v4()));

    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{:.3}", at_secs), "-i"])
        .arg(path)
        .args([
            "-vf",
            &format!(
                "scale={}:{}:force_original_aspect_ratio=decrease",
                max_dimension, max_dimension
            ),
            "-vframes",
            "1",
            "-y",
        ])
        .arg(&temp_output)
        .output()
        .map_err(|e| format!("Failed to run ffmpeg: {}", e))?;

    if !output.status.success() {
        let _ = fs::remove_file(&temp_output);
        return Err(format!(
            "ffmpeg failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let frame = image::open(&temp_output).map_err(|e| format!("Failed to load frame: {}", e));
    let _ = fs::remove_file(&temp_output);
    frame
}
