mod common;

use common::config_at;
use fileflow::{reorganize, FlowConfig, FlowState};
use std::path::Path;
use tempfile::TempDir;

/// Verdicts come from the filename alone
fn filename_only(dest_root: &Path) -> FlowConfig {
    let mut config = config_at(dest_root);
    let signals = &mut config.classification.signals;
    signals.visual = false;
    signals.metadata = false;
    signals.properties = false;
    config
}

fn place(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), format!("image bytes for {}", name)).unwrap();
}

#[tokio::test]
async fn test_sensitive_file_moves_from_sfw_to_nsfw() {
    let temp_dir = TempDir::new().unwrap();
    let dest_root = temp_dir.path().join("sorted");
    let images = dest_root.join("Images");
    place(&images.join("SFW"), "nude_beach.jpg");

    let config = filename_only(&dest_root);
    let state = FlowState::new(&config);

    let summary = reorganize(&state, &[], &config).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.sensitive, 1);
    assert!(summary.failed.is_empty());
    assert!(images.join("NSFW").join("nude_beach.jpg").exists());
    assert!(!images.join("SFW").join("nude_beach.jpg").exists());
}

#[tokio::test]
async fn test_safe_file_moves_from_nsfw_to_sfw() {
    let temp_dir = TempDir::new().unwrap();
    let dest_root = temp_dir.path().join("sorted");
    let images = dest_root.join("Images");
    place(&images.join("NSFW"), "family_reunion.jpg");

    let config = filename_only(&dest_root);
    let state = FlowState::new(&config);

    let summary = reorganize(&state, &[images.clone()], &config).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.sensitive, 0);
    assert!(images.join("SFW").join("family_reunion.jpg").exists());
    assert!(!images.join("NSFW").join("family_reunion.jpg").exists());
}

#[tokio::test]
async fn test_file_already_in_place_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let dest_root = temp_dir.path().join("sorted");
    let sfw = dest_root.join("Images").join("SFW");
    place(&sfw, "IMG_0099.jpg");

    let config = filename_only(&dest_root);
    let state = FlowState::new(&config);

    let summary = reorganize(&state, &[], &config).await.unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.skipped, 1);
    assert!(summary.failed.is_empty());
    assert!(sfw.join("IMG_0099.jpg").exists());
    assert!(!dest_root.join("Images").join("NSFW").exists());
}
