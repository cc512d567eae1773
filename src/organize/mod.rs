//! Placing classified files.
//!
//! Destination resolution (first match wins):
//! 1. custom pattern rules, in configured order
//! 2. the category destination, plus `SFW`/`NSFW` for split categories
//! 3. the "Other" category for unmapped extensions

pub mod batch;
pub mod dispatch;
pub mod mover;
pub mod pipeline;
pub mod rules;

pub use batch::BatchRunner;
pub use dispatch::{BatchRegistration, BatchRegistry, CancelFlag, DispatchClaim, DispatchLedger};
pub use mover::{FileTransfer, MoveReport, Mover, StdTransfer};
pub use pipeline::{Pipeline, PipelineMode};
pub use rules::RuleSet;

use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::models::{ClassificationResult, FileRecord, OrganizeOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Names of the sensitivity subdirectories
pub const SPLIT_DIR_NAMES: [&str; 2] = ["SFW", "NSFW"];

pub struct Organizer {
    config: Arc<FlowConfig>,
    rules: RuleSet,
    mover: Mover,
}

impl Organizer {
    pub fn new(config: Arc<FlowConfig>) -> Result<Self> {
        Self::with_mover(config, Mover::new())
    }

    pub fn with_mover(config: Arc<FlowConfig>, mover: Mover) -> Result<Self> {
        let rules = RuleSet::compile(&config.pattern_rules)?;
        Ok(Self {
            config,
            rules,
            mover,
        })
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    fn split_enabled(&self) -> bool {
        self.config.classification.enabled
    }

    /// Directory the file belongs in
    pub fn resolve_destination(
        &self,
        record: &FileRecord,
        result: &ClassificationResult,
    ) -> PathBuf {
        if let Some(rule) = self.rules.first_match(&record.file_name()) {
            let base = rule.resolve_destination(&self.config.destination_root);
            return if rule.split_sensitivity && self.split_enabled() {
                base.join(result.split_label())
            } else {
                base
            };
        }

        let base = self.config.category_destination(&result.category);
        if self.split_enabled() && self.config.is_split_category(&result.category) {
            base.join(result.split_label())
        } else {
            base
        }
    }

    /// Every directory this configuration can move files into, before
    /// any SFW/NSFW split
    pub fn destination_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .config
            .file_types
            .keys()
            .map(|category| self.config.category_destination(category))
            .collect();
        dirs.push(self.config.category_destination(crate::config::OTHER_CATEGORY));
        dirs.extend(
            self.rules
                .iter()
                .map(|rule| rule.resolve_destination(&self.config.destination_root)),
        );
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Directory a file should sit in after a sensitivity re-check:
    /// the split folder next to it, or its sibling when it already sits
    /// in one. `None` for categories that are never split.
    pub fn resplit_destination(
        &self,
        record: &FileRecord,
        result: &ClassificationResult,
    ) -> Option<PathBuf> {
        if !self.split_enabled() || !self.config.is_split_category(&result.category) {
            return None;
        }

        let parent = record.path.parent()?;
        let in_split_dir = parent
            .file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| SPLIT_DIR_NAMES.iter().any(|s| s.eq_ignore_ascii_case(&n)));

        let base = if in_split_dir {
            parent.parent()?
        } else {
            parent
        };
        Some(base.join(result.split_label()))
    }

    /// Resolve and move one file
    pub fn organize(&self, record: &FileRecord, result: &ClassificationResult) -> OrganizeOutcome {
        let destination = self.resolve_destination(record, result);
        self.move_to(record, result, &destination)
    }

    /// Move one file into the split folder its fresh verdict calls for
    pub fn resplit(&self, record: &FileRecord, result: &ClassificationResult) -> OrganizeOutcome {
        match self.resplit_destination(record, result) {
            Some(destination) => self.move_to(record, result, &destination),
            None => OrganizeOutcome::Skipped {
                path: record.path.clone(),
                reason: format!("{} is not split by sensitivity", result.category),
            },
        }
    }

    fn move_to(
        &self,
        record: &FileRecord,
        result: &ClassificationResult,
        destination: &Path,
    ) -> OrganizeOutcome {
        if already_in(&record.path, destination) {
            return OrganizeOutcome::Skipped {
                path: record.path.clone(),
                reason: "already in place".to_string(),
            };
        }

        match self
            .mover
            .move_into(&record.path, destination, Some(&record.content_fingerprint))
        {
            Ok(report) => {
                if result.is_sensitive {
                    tracing::debug!(from = %record.path.display(), to = %report.destination.display(), "Moved (sensitive)");
                } else {
                    tracing::debug!(from = %record.path.display(), to = %report.destination.display(), "Moved");
                }
                OrganizeOutcome::Moved {
                    from: record.path.clone(),
                    to: report.destination,
                    category: result.category.clone(),
                    is_sensitive: result.is_sensitive,
                    renamed: report.renamed,
                }
            }
            Err(FlowError::SourceMissing(path)) => OrganizeOutcome::Skipped {
                path,
                reason: "source vanished".to_string(),
            },
            Err(e) => {
                tracing::warn!(path = %record.path.display(), error = %e, "Move failed");
                OrganizeOutcome::Failed {
                    path: record.path.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn already_in(path: &Path, directory: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    if parent == directory {
        return true;
    }
    match (parent.canonicalize(), directory.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PatternKind, PatternRule};
    use chrono::Utc;
    use tempfile::TempDir;

    fn verdict(category: &str, is_sensitive: bool) -> ClassificationResult {
        ClassificationResult {
            category: category.to_string(),
            is_sensitive,
            overall_confidence: 0.5,
            weighted_sensitivity: if is_sensitive { 0.9 } else { 0.1 },
            computed_at: Utc::now(),
        }
    }

    fn config_at(root: &Path) -> FlowConfig {
        let mut config = FlowConfig::default();
        config.destination_root = root.to_path_buf();
        config
    }

    #[test]
    fn test_split_category_paths() {
        let organizer = Organizer::new(Arc::new(config_at(Path::new("/dest")))).unwrap();
        let record = FileRecord::synthetic("/drop/a.jpg", "fp", 1);

        assert_eq!(
            organizer.resolve_destination(&record, &verdict("Images", false)),
            PathBuf::from("/dest/Images/SFW")
        );
        assert_eq!(
            organizer.resolve_destination(&record, &verdict("Images", true)),
            PathBuf::from("/dest/Images/NSFW")
        );
    }

    #[test]
    fn test_unsplit_and_other_categories() {
        let organizer = Organizer::new(Arc::new(config_at(Path::new("/dest")))).unwrap();

        let doc = FileRecord::synthetic("/drop/a.pdf", "fp", 1);
        assert_eq!(
            organizer.resolve_destination(&doc, &verdict("Documents", false)),
            PathBuf::from("/dest/Documents")
        );

        let odd = FileRecord::synthetic("/drop/a.xyz", "fp", 1);
        assert_eq!(
            organizer.resolve_destination(&odd, &verdict("Other", false)),
            PathBuf::from("/dest/Other")
        );
    }

    #[test]
    fn test_classification_disabled_means_no_split() {
        let mut config = config_at(Path::new("/dest"));
        config.classification.enabled = false;
        let organizer = Organizer::new(Arc::new(config)).unwrap();
        let record = FileRecord::synthetic("/drop/a.jpg", "fp", 1);

        assert_eq!(
            organizer.resolve_destination(&record, &verdict("Images", false)),
            PathBuf::from("/dest/Images")
        );
    }

    #[test]
    fn test_pattern_rule_takes_priority() {
        let mut config = config_at(Path::new("/dest"));
        config.pattern_rules = vec![
            PatternRule {
                pattern: "Screenshot*".to_string(),
                kind: PatternKind::Glob,
                destination: PathBuf::from("Screenshots"),
                split_sensitivity: false,
            },
            PatternRule {
                pattern: r"^cam_\d+".to_string(),
                kind: PatternKind::Regex,
                destination: PathBuf::from("/media/camera"),
                split_sensitivity: true,
            },
        ];
        let organizer = Organizer::new(Arc::new(config)).unwrap();

        let shot = FileRecord::synthetic("/drop/Screenshot 1.png", "fp", 1);
        assert_eq!(
            organizer.resolve_destination(&shot, &verdict("Images", true)),
            PathBuf::from("/dest/Screenshots")
        );

        let cam = FileRecord::synthetic("/drop/cam_0042.mp4", "fp", 1);
        assert_eq!(
            organizer.resolve_destination(&cam, &verdict("Videos", true)),
            PathBuf::from("/media/camera/NSFW")
        );
    }

    #[test]
    fn test_destination_dirs_cover_rules_and_other() {
        let mut config = config_at(Path::new("/dest"));
        config.pattern_rules = vec![PatternRule {
            pattern: "*.log".to_string(),
            kind: PatternKind::Glob,
            destination: PathBuf::from("Logs"),
            split_sensitivity: false,
        }];
        let dirs = Organizer::new(Arc::new(config)).unwrap().destination_dirs();

        assert!(dirs.contains(&PathBuf::from("/dest/Images")));
        assert!(dirs.contains(&PathBuf::from("/dest/Other")));
        assert!(dirs.contains(&PathBuf::from("/dest/Logs")));
        assert_eq!(dirs.iter().filter(|d| d.ends_with("Other")).count(), 1);
    }

    #[test]
    fn test_resplit_destination() {
        let organizer = Organizer::new(Arc::new(config_at(Path::new("/dest")))).unwrap();

        let loose = FileRecord::synthetic("/pics/a.jpg", "fp", 1);
        assert_eq!(
            organizer.resplit_destination(&loose, &verdict("Images", true)),
            Some(PathBuf::from("/pics/NSFW"))
        );

        let split = FileRecord::synthetic("/dest/Images/SFW/a.jpg", "fp", 1);
        assert_eq!(
            organizer.resplit_destination(&split, &verdict("Images", true)),
            Some(PathBuf::from("/dest/Images/NSFW"))
        );

        let doc = FileRecord::synthetic("/dest/Documents/a.pdf", "fp", 1);
        assert_eq!(organizer.resplit_destination(&doc, &verdict("Documents", false)), None);
    }

    #[test]
    fn test_organize_moves_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("drop").join("a.jpg");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"jpeg").unwrap();
        let dest_root = temp_dir.path().join("sorted");

        let organizer = Organizer::new(Arc::new(config_at(&dest_root))).unwrap();
        let record = FileRecord::from_path(&src).unwrap();
        let outcome = organizer.organize(&record, &verdict("Images", false));

        let expected = dest_root.join("Images").join("SFW").join("a.jpg");
        assert_eq!(
            outcome,
            OrganizeOutcome::Moved {
                from: src.clone(),
                to: expected.clone(),
                category: "Images".to_string(),
                is_sensitive: false,
                renamed: false,
            }
        );
        assert!(expected.exists());

        // running again on the moved file is a no-op
        let record = FileRecord::from_path(&expected).unwrap();
        let again = organizer.organize(&record, &verdict("Images", false));
        assert!(matches!(again, OrganizeOutcome::Skipped { .. }));
    }
}
