mod common;

use common::{config_at, pipeline_with, write_jpeg, FixedExtractor};
use fileflow::models::{OrganizeOutcome, SignalSource};
use fileflow::organize::{FileTransfer, Mover, Organizer};
use fileflow::signals::{FilenameExtractor, SignalExtractor};
use fileflow::{organize_once, ClassificationResult, FileRecord, FlowState};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_camera_photo_lands_in_sfw() {
    let temp_dir = TempDir::new().unwrap();
    let drop_dir = temp_dir.path().join("drop");
    std::fs::create_dir_all(&drop_dir).unwrap();
    write_jpeg(&drop_dir.join("photo_IMG_0099.jpg"), [120, 120, 120]);

    let dest_root = temp_dir.path().join("sorted");
    let mut config = config_at(&dest_root);
    config.classification.signals.visual = false;
    config.classification.threshold = 0.5;
    let state = FlowState::new(&config);

    let summary = organize_once(&state, &[drop_dir.clone()], None, &config)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.sensitive, 0);
    assert!(dest_root
        .join("Images")
        .join("SFW")
        .join("photo_IMG_0099.jpg")
        .exists());
    assert!(!drop_dir.join("photo_IMG_0099.jpg").exists());
}

#[tokio::test]
async fn test_safe_filename_overrides_visual_evidence() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("family_reunion.jpg");
    std::fs::write(&src, b"not really a jpeg").unwrap();

    let config = config_at(&temp_dir.path().join("out"));
    let c = &config.classification;
    let extractors: Vec<Arc<dyn SignalExtractor>> = vec![
        Arc::new(FilenameExtractor::new(true, &c.sensitive_keywords, &c.safe_keywords)),
        Arc::new(FixedExtractor::new(SignalSource::Visual, 0.95, 0.8)),
    ];
    let pipeline = pipeline_with(config.clone(), extractors, None);

    let outcome = pipeline.process(&src).await;
    match outcome {
        OrganizeOutcome::Moved { to, is_sensitive, .. } => {
            assert!(!is_sensitive);
            assert_eq!(to, temp_dir.path().join("out/Images/SFW/family_reunion.jpg"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_sensitive_evidence_lands_in_nsfw() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("clip_0001.mp4");
    std::fs::write(&src, b"\x00\x00\x00\x18ftypmp42").unwrap();

    let config = config_at(&temp_dir.path().join("out"));
    let extractors: Vec<Arc<dyn SignalExtractor>> = vec![
        Arc::new(FixedExtractor::new(SignalSource::Filename, 0.5, 1.0)),
        Arc::new(FixedExtractor::new(SignalSource::Visual, 0.95, 0.8)),
    ];
    let pipeline = pipeline_with(config, extractors, None);

    let outcome = pipeline.process(&src).await;
    assert!(matches!(
        outcome,
        OrganizeOutcome::Moved { is_sensitive: true, ref to, .. }
            if *to == temp_dir.path().join("out/Videos/NSFW/clip_0001.mp4")
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thousand_files_are_each_moved_exactly_once() {
    let temp_dir = TempDir::new().unwrap();
    let drop_dir = temp_dir.path().join("drop");
    std::fs::create_dir_all(&drop_dir).unwrap();
    for i in 0..1000 {
        std::fs::write(drop_dir.join(format!("note_{:04}.txt", i)), format!("note {}", i)).unwrap();
    }

    let dest_root = temp_dir.path().join("sorted");
    let mut config = config_at(&dest_root);
    config.performance.batch_size = 64;
    config.performance.worker_count = 8;
    let state = FlowState::new(&config);

    // two overlapping runs share one dispatch ledger
    let sources = [drop_dir.clone()];
    let (first, second) = tokio::join!(
        organize_once(&state, &sources, None, &config),
        organize_once(&state, &sources, None, &config),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.succeeded + second.succeeded, 1000);
    assert_eq!(first.renamed + second.renamed, 0);
    assert!(first.failed.is_empty() && second.failed.is_empty());

    let landed: HashSet<String> = std::fs::read_dir(dest_root.join("Documents"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(landed.len(), 1000);
    assert!(landed.contains("note_0000.txt") && landed.contains("note_0999.txt"));
    assert_eq!(std::fs::read_dir(&drop_dir).unwrap().count(), 0);
    assert_eq!(state.ledger().in_flight(), 0);
}

/// Rename fails as if crossing volumes; the copy dies halfway
struct DyingCopy;

impl FileTransfer for DyingCopy {
    fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "cross-device link"))
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let data = std::fs::read(from)?;
        let mut out = std::fs::File::create(to)?;
        out.write_all(&data[..data.len() / 2])?;
        Err(io::Error::new(io::ErrorKind::Other, "connection reset"))
    }
}

#[test]
fn test_interrupted_cross_volume_copy_keeps_source() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("inbox").join("thesis.pdf");
    std::fs::create_dir_all(src.parent().unwrap()).unwrap();
    let original = b"%PDF-1.7 chapter one, chapter two, chapter three".to_vec();
    std::fs::write(&src, &original).unwrap();

    let dest_root = temp_dir.path().join("other-volume");
    let organizer = Organizer::with_mover(
        Arc::new(config_at(&dest_root)),
        Mover::with_transfer(Arc::new(DyingCopy)),
    )
    .unwrap();

    let record = FileRecord::from_path(&src).unwrap();
    let verdict = ClassificationResult {
        category: "Documents".to_string(),
        is_sensitive: false,
        overall_confidence: 0.0,
        weighted_sensitivity: 0.0,
        computed_at: chrono::Utc::now(),
    };

    let outcome = organizer.organize(&record, &verdict);
    match outcome {
        OrganizeOutcome::Failed { path, reason } => {
            assert_eq!(path, src);
            assert!(reason.contains("connection reset"), "{}", reason);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(std::fs::read(&src).unwrap(), original);
    assert!(!dest_root.join("Documents").join("thesis.pdf").exists());
}
