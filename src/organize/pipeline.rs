//! One file through the whole path: fingerprint, classify, place, notify.

use super::dispatch::{DispatchClaim, DispatchLedger};
use super::Organizer;
use crate::classify::Classifier;
use crate::events::MoveNotifier;
use crate::models::{FileRecord, OrganizeOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Category + sensitivity placement from a drop folder
    Organize,
    /// Fresh sensitivity verdict for files that are already organized
    Reorganize,
}

#[derive(Clone)]
pub struct Pipeline {
    classifier: Classifier,
    organizer: Arc<Organizer>,
    notifier: MoveNotifier,
    ledger: DispatchLedger,
    mode: PipelineMode,
}

impl Pipeline {
    pub fn new(
        classifier: Classifier,
        organizer: Arc<Organizer>,
        notifier: MoveNotifier,
        ledger: DispatchLedger,
        mode: PipelineMode,
    ) -> Self {
        Self {
            classifier,
            organizer,
            notifier,
            ledger,
            mode,
        }
    }

    pub fn ledger(&self) -> &DispatchLedger {
        &self.ledger
    }

    pub fn organizer(&self) -> &Organizer {
        &self.organizer
    }

    pub fn claim(&self, path: &Path) -> Option<DispatchClaim> {
        self.ledger.try_claim(path)
    }

    /// Claim and process; a file someone else holds is skipped
    pub async fn process(&self, path: &Path) -> OrganizeOutcome {
        match self.claim(path) {
            Some(claim) => self.process_claimed(claim).await,
            None => OrganizeOutcome::Skipped {
                path: path.to_path_buf(),
                reason: "already being processed".to_string(),
            },
        }
    }

    /// Process a file this worker holds the claim for. The claim is
    /// released when this returns.
    pub async fn process_claimed(&self, claim: DispatchClaim) -> OrganizeOutcome {
        let path: PathBuf = claim.path().to_path_buf();

        let record = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || FileRecord::from_path(&path)).await
        };
        let record = match record {
            Ok(Ok(record)) => record,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return OrganizeOutcome::Skipped {
                    path,
                    reason: "source vanished".to_string(),
                };
            }
            Ok(Err(e)) => {
                return OrganizeOutcome::Failed {
                    path,
                    reason: format!("cannot read file: {}", e),
                };
            }
            Err(e) => {
                return OrganizeOutcome::Failed {
                    path,
                    reason: format!("worker failed: {}", e),
                };
            }
        };
        claim.bind_fingerprint(&record.content_fingerprint);

        // extraction finishes before any move decision
        let result = match self.mode {
            PipelineMode::Organize => self.classifier.classify(&record).await,
            PipelineMode::Reorganize => self.classifier.classify_fresh(&record).await,
        };

        let organizer = Arc::clone(&self.organizer);
        let mode = self.mode;
        let outcome = tokio::task::spawn_blocking(move || match mode {
            PipelineMode::Organize => organizer.organize(&record, &result),
            PipelineMode::Reorganize => organizer.resplit(&record, &result),
        })
        .await
        .unwrap_or_else(|e| OrganizeOutcome::Failed {
            path: path.clone(),
            reason: format!("worker failed: {}", e),
        });

        self.notifier.emit(&outcome);
        drop(claim);
        outcome
    }
}
