//! Exclusive dispatch and cooperative cancellation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cancellation flag checked between files (never mid-move)
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch runs in progress, each with its own [`CancelFlag`].
///
/// A run registers on start and leaves when its registration drops, so
/// a cancel only reaches runs that are live at that moment.
#[derive(Debug, Clone, Default)]
pub struct BatchRegistry {
    live: Arc<DashMap<Uuid, CancelFlag>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> BatchRegistration {
        let id = Uuid::new_v4();
        let flag = CancelFlag::new();
        self.live.insert(id, flag.clone());
        BatchRegistration {
            live: Arc::clone(&self.live),
            id,
            flag,
        }
    }

    /// Cancel every live run; returns how many were asked to stop
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for entry in self.live.iter() {
            entry.value().cancel();
            cancelled += 1;
        }
        cancelled
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }
}

/// Membership of one run in a [`BatchRegistry`]
#[derive(Debug)]
pub struct BatchRegistration {
    live: Arc<DashMap<Uuid, CancelFlag>>,
    id: Uuid,
    flag: CancelFlag,
}

impl BatchRegistration {
    pub fn flag(&self) -> CancelFlag {
        self.flag.clone()
    }
}

impl Drop for BatchRegistration {
    fn drop(&mut self) {
        self.live.remove(&self.id);
    }
}

/// In-flight source files, keyed by canonical path.
///
/// A path can be claimed by one worker at a time. The fingerprint is
/// recorded once the file has been hashed, for diagnostics. Shared by
/// batch runs and the watcher so they never work on the same file.
#[derive(Debug, Clone, Default)]
pub struct DispatchLedger {
    claims: Arc<DashMap<PathBuf, Option<String>>>,
}

impl DispatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for exclusive processing; `None` if someone holds it
    pub fn try_claim(&self, path: &Path) -> Option<DispatchClaim> {
        let key = canonical_key(path);
        match self.claims.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(None);
                Some(DispatchClaim {
                    claims: Arc::clone(&self.claims),
                    key,
                    path: path.to_path_buf(),
                })
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.claims.len()
    }

    /// Fingerprint bound to an in-flight path, if hashed yet
    pub fn fingerprint_of(&self, path: &Path) -> Option<String> {
        self.claims
            .get(&canonical_key(path))
            .and_then(|entry| entry.value().clone())
    }
}

/// Canonical form when the file exists, otherwise the path as given
fn canonical_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Exclusive right to process one file; released on drop
#[derive(Debug)]
pub struct DispatchClaim {
    claims: Arc<DashMap<PathBuf, Option<String>>>,
    key: PathBuf,
    path: PathBuf,
}

impl DispatchClaim {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bind_fingerprint(&self, fingerprint: &str) {
        if let Some(mut entry) = self.claims.get_mut(&self.key) {
            *entry.value_mut() = Some(fingerprint.to_string());
        }
    }
}

impl Drop for DispatchClaim {
    fn drop(&mut self) {
        self.claims.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();

        let ledger = DispatchLedger::new();
        let claim = ledger.try_claim(&path).unwrap();
        assert!(ledger.try_claim(&path).is_none());
        // same file through a different spelling
        let dotted = temp_dir.path().join(".").join("a.jpg");
        assert!(ledger.try_claim(&dotted).is_none());

        claim.bind_fingerprint("abc");
        assert_eq!(ledger.fingerprint_of(&path).as_deref(), Some("abc"));

        drop(claim);
        assert_eq!(ledger.in_flight(), 0);
        assert!(ledger.try_claim(&path).is_some());
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let ledger = DispatchLedger::new();
        let path = PathBuf::from("/nonexistent/contended.jpg");

        let winners: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                let path = path.clone();
                std::thread::spawn(move || ledger.try_claim(&path).map(std::mem::forget).is_some())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .collect();

        assert_eq!(winners.len(), 1);
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        let shared = flag.clone();
        assert!(!flag.is_cancelled());
        shared.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_reaches_only_live_runs() {
        let registry = BatchRegistry::new();
        let running = registry.register();
        let finished = registry.register();
        let finished_flag = finished.flag();
        drop(finished);
        assert_eq!(registry.live(), 1);

        assert_eq!(registry.cancel_all(), 1);
        assert!(running.flag().is_cancelled());
        assert!(!finished_flag.is_cancelled());

        // a run registered afterwards starts clean
        let next = registry.register();
        assert!(!next.flag().is_cancelled());
        assert!(running.flag().is_cancelled());

        drop(running);
        drop(next);
        assert_eq!(registry.live(), 0);
    }
}
