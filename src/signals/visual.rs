//! Pixel heuristics: skin-tone ratio, face-like blobs, dominant hue.

use super::SignalExtractor;
use crate::config::VisualTuning;
use crate::media::{self, MediaTools};
use crate::models::{Abstain, FileRecord, SignalScore, SignalSource};
use image::{DynamicImage, RgbImage};

const IMAGE_CONFIDENCE: f64 = 0.8;
const VIDEO_CONFIDENCE: f64 = 0.6;

/// Coarse grid used for blob detection
const GRID: usize = 8;
/// Fraction of a grid cell that must be skin for the cell to count
const CELL_SKIN_FRACTION: f64 = 0.5;
/// Hue buckets of 30 degrees
const HUE_BUCKETS: usize = 12;

/// Per-frame analysis
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub skin_ratio: f64,
    pub mean_brightness: f64,
    pub faces: usize,
    /// Index into the 30-degree hue buckets, `None` when mostly grey
    pub dominant_hue: Option<usize>,
    pub dominant_share: f64,
    pub score: f64,
}

pub struct VisualExtractor {
    enabled: bool,
    tuning: VisualTuning,
    tools: MediaTools,
}

impl VisualExtractor {
    pub fn new(enabled: bool, tuning: VisualTuning, tools: MediaTools) -> Self {
        Self {
            enabled,
            tuning,
            tools,
        }
    }

    fn analyze_image(&self, record: &FileRecord) -> SignalScore {
        match image::open(&record.path) {
            Ok(img) => {
                let frame = analyze_frame(&img, &self.tuning);
                SignalScore::new(SignalSource::Visual, frame.score, IMAGE_CONFIDENCE).with_detail(
                    format!(
                        "skin {:.2}, faces {}, brightness {:.0}",
                        frame.skin_ratio, frame.faces, frame.mean_brightness
                    ),
                )
            }
            Err(e) => {
                tracing::debug!(path = %record.path.display(), error = %e, "Image decode failed");
                SignalScore::abstain(SignalSource::Visual, Abstain::Unreadable)
            }
        }
    }

    fn analyze_video(&self, record: &FileRecord) -> SignalScore {
        if !self.tools.ffmpeg {
            return SignalScore::abstain(SignalSource::Visual, Abstain::CapabilityMissing);
        }

        let duration = if self.tools.ffprobe {
            media::probe(&record.path).and_then(|p| p.duration_secs)
        } else {
            None
        };

        let scores: Vec<f64> = media::frame_timestamps(duration, self.tuning.video_frame_samples)
            .into_iter()
            .filter_map(|at| {
                match media::extract_frame(&record.path, at, self.tuning.max_dimension) {
                    Ok(frame) => Some(analyze_frame(&frame, &self.tuning).score),
                    Err(e) => {
                        tracing::debug!(path = %record.path.display(), at, error = %e, "Frame grab failed");
                        None
                    }
                }
            })
            .collect();

        if scores.is_empty() {
            return SignalScore::abstain(SignalSource::Visual, Abstain::Unreadable);
        }

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        SignalScore::new(SignalSource::Visual, mean, VIDEO_CONFIDENCE)
            .with_detail(format!("{} frame(s), mean {:.2}", scores.len(), mean))
    }
}

impl SignalExtractor for VisualExtractor {
    fn source(&self) -> SignalSource {
        SignalSource::Visual
    }

    fn analyze(&self, record: &FileRecord) -> SignalScore {
        if !self.enabled {
            return SignalScore::abstain(SignalSource::Visual, Abstain::Disabled);
        }

        if media::is_image_extension(&record.extension) {
            self.analyze_image(record)
        } else if media::is_video_extension(&record.extension) {
            self.analyze_video(record)
        } else {
            SignalScore::abstain(SignalSource::Visual, Abstain::UnsupportedType)
        }
    }
}

/// RGB (0-255) to HSV with hue in degrees and s/v in [0, 1]
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue, saturation, max)
}

fn is_skin(h: f64, s: f64, v: f64) -> bool {
    h <= 40.0 && s >= 0.08 && v >= 0.27
}

/// Score one frame. The image is downscaled to fit `max_dimension` first.
pub fn analyze_frame(img: &DynamicImage, tuning: &VisualTuning) -> FrameAnalysis {
    let max = tuning.max_dimension.max(1);
    let rgb: RgbImage = if img.width() > max || img.height() > max {
        img.thumbnail(max, max).to_rgb8()
    } else {
        img.to_rgb8()
    };

    let (width, height) = rgb.dimensions();
    let total = (width as usize * height as usize).max(1);

    let mut skin_pixels = 0usize;
    let mut brightness_sum = 0.0;
    let mut cell_skin = [[0usize; GRID]; GRID];
    let mut cell_total = [[0usize; GRID]; GRID];
    let mut hue_counts = [0usize; HUE_BUCKETS];
    let mut chromatic = 0usize;

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (h, s, v) = rgb_to_hsv(r, g, b);

        brightness_sum += 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;

        let cx = (x as usize * GRID) / width as usize;
        let cy = (y as usize * GRID) / height as usize;
        cell_total[cy][cx] += 1;

        if is_skin(h, s, v) {
            skin_pixels += 1;
            cell_skin[cy][cx] += 1;
        }

        if s >= 0.15 && v >= 0.15 {
            chromatic += 1;
            hue_counts[((h / 30.0) as usize).min(HUE_BUCKETS - 1)] += 1;
        }
    }

    let skin_ratio = skin_pixels as f64 / total as f64;
    let mean_brightness = brightness_sum / total as f64;

    let mut skin_cells = [[false; GRID]; GRID];
    for cy in 0..GRID {
        for cx in 0..GRID {
            let cells = cell_total[cy][cx];
            skin_cells[cy][cx] =
                cells > 0 && cell_skin[cy][cx] as f64 / cells as f64 >= CELL_SKIN_FRACTION;
        }
    }
    let faces = count_faces(&skin_cells);

    let (dominant_hue, dominant_share) = if chromatic * 2 >= total {
        hue_counts
            .iter()
            .enumerate()
            .max_by_key(|(i, count)| (**count, std::cmp::Reverse(*i)))
            .map(|(i, count)| (Some(i), *count as f64 / total as f64))
            .unwrap_or((None, 0.0))
    } else {
        (None, 0.0)
    };

    let mut score: f64 = if skin_ratio > tuning.skin_high {
        0.6
    } else if skin_ratio > tuning.skin_mid {
        0.3
    } else if skin_ratio > tuning.skin_low {
        0.1
    } else {
        0.0
    };

    if !(50.0..=200.0).contains(&mean_brightness) {
        score += 0.05;
    }

    if faces > 0 && skin_ratio <= tuning.skin_mid {
        score -= 0.1;
    } else if faces == 0 && skin_ratio > tuning.skin_mid {
        score += 0.1;
    }

    // buckets 0 and 1 cover red through orange
    if matches!(dominant_hue, Some(0) | Some(1)) && dominant_share > 0.5 {
        score += 0.1;
    }

    FrameAnalysis {
        skin_ratio,
        mean_brightness,
        faces,
        dominant_hue,
        dominant_share,
        score: score.clamp(0.0, 1.0),
    }
}

/// Count compact skin blobs in the upper two thirds of the grid
fn count_faces(cells: &[[bool; GRID]; GRID]) -> usize {
    let mut seen = [[false; GRID]; GRID];
    let mut faces = 0;

    for start_y in 0..GRID {
        for start_x in 0..GRID {
            if !cells[start_y][start_x] || seen[start_y][start_x] {
                continue;
            }

            let mut stack = vec![(start_x, start_y)];
            seen[start_y][start_x] = true;
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (start_x, start_x, start_y, start_y);
            let mut size = 0;

            while let Some((x, y)) = stack.pop() {
                size += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                let neighbours = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbours {
                    if nx < GRID && ny < GRID && cells[ny][nx] && !seen[ny][nx] {
                        seen[ny][nx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            let w = (max_x - min_x + 1) as f64;
            let h = (max_y - min_y + 1) as f64;
            let aspect = w / h;
            let upper = min_y * 3 < GRID * 2;

            if (1..=4).contains(&size) && (0.5..=2.0).contains(&aspect) && upper {
                faces += 1;
            }
        }
    }

    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    const SKIN: Rgb<u8> = Rgb([224, 172, 140]);
    const BLUE: Rgb<u8> = Rgb([30, 60, 200]);

    fn solid(color: Rgb<u8>) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, color))
    }

    #[test]
    fn test_hsv_conversion() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert_eq!(h, 240.0);
        let (h, s, _) = rgb_to_hsv(128, 128, 128);
        assert_eq!((h, s), (0.0, 0.0));
    }

    #[test]
    fn test_skin_frame_scores_high() {
        let frame = analyze_frame(&solid(SKIN), &VisualTuning::default());
        assert_eq!(frame.skin_ratio, 1.0);
        assert_eq!(frame.faces, 0);
        assert_eq!(frame.dominant_hue, Some(0));
        assert!(frame.score >= 0.7, "score was {}", frame.score);
    }

    #[test]
    fn test_blue_frame_scores_zero() {
        let frame = analyze_frame(&solid(BLUE), &VisualTuning::default());
        assert_eq!(frame.skin_ratio, 0.0);
        assert_eq!(frame.score, 0.0);
    }

    #[test]
    fn test_frame_score_stays_in_range() {
        let tuning = VisualTuning::default();
        for color in [Rgb([0, 0, 0]), Rgb([255, 255, 255]), SKIN, BLUE] {
            let frame = analyze_frame(&solid(color), &tuning);
            assert!((0.0..=1.0).contains(&frame.score), "score was {}", frame.score);
        }

        // extreme brightness alone nudges the score up
        let dark = analyze_frame(&solid(Rgb([0, 0, 0])), &tuning);
        assert!(dark.score > 0.0);
    }

    #[test]
    fn test_small_skin_blob_counts_as_face() {
        let mut img = RgbImage::from_pixel(64, 64, BLUE);
        // one 8x8 cell near the top
        for y in 8..16 {
            for x in 24..32 {
                img.put_pixel(x, y, SKIN);
            }
        }
        let frame = analyze_frame(&DynamicImage::ImageRgb8(img), &VisualTuning::default());
        assert_eq!(frame.faces, 1);
        assert_eq!(frame.score, 0.0);
    }

    #[test]
    fn test_large_images_are_downscaled() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1024, 512, SKIN));
        let frame = analyze_frame(&img, &VisualTuning::default());
        assert_eq!(frame.skin_ratio, 1.0);
    }

    #[test]
    fn test_extractor_reads_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.png");
        RgbImage::from_pixel(32, 32, SKIN).save(&path).unwrap();

        let extractor = VisualExtractor::new(true, VisualTuning::default(), MediaTools::none());
        let record = FileRecord::from_path(&path).unwrap();
        let score = extractor.analyze(&record);
        assert_eq!(score.confidence, IMAGE_CONFIDENCE);
        assert!(score.sensitivity_score > 0.5);
    }

    #[test]
    fn test_abstentions() {
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("broken.jpg");
        std::fs::write(&broken, b"not an image").unwrap();
        let record = FileRecord::from_path(&broken).unwrap();

        let on = VisualExtractor::new(true, VisualTuning::default(), MediaTools::none());
        let off = VisualExtractor::new(false, VisualTuning::default(), MediaTools::none());

        assert_eq!(on.analyze(&record).abstained, Some(Abstain::Unreadable));
        assert_eq!(off.analyze(&record).abstained, Some(Abstain::Disabled));

        let video = FileRecord::synthetic("/d/clip.mp4", "fp", 1);
        assert_eq!(
            on.analyze(&video).abstained,
            Some(Abstain::CapabilityMissing)
        );

        let doc = FileRecord::synthetic("/d/notes.pdf", "fp", 1);
        assert_eq!(on.analyze(&doc).abstained, Some(Abstain::UnsupportedType));
    }
}
