//! # RC Store
//!
//! Directory of validated router contacts, one file per identity, named by
//! the identity's hex form.
//!
//! ## Index
//!
//! The in-memory index is built by scanning the directory when the store is
//! opened and is then kept current by [`RcStore::insert_if_valid`] and
//! [`RcStore::prune`]. Files written by *other* processes after opening are
//! not picked up until the store is reopened. Index entries whose file
//! was removed elsewhere are dropped the next time [`RcStore::pick_random`]
//! or [`RcStore::prune`] touches them.
//!
//! ## Concurrency
//!
//! Records are written to a temporary file and renamed into place, so a
//! reader sees the previous record or the new one, never a partial write.
//! Writes to different identities proceed in parallel. The index lock is a
//! `parking_lot::RwLock` and is never held during file I/O.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::seq::IteratorRandom;

use crate::error::StoreError;
use crate::fsutil::{ensure_private_dir, write_atomic};
use crate::lock::MaintenanceLock;
use crate::rc::{RcValidator, RouterId};

/// Name of the maintenance lock file inside the store directory.
pub const PRUNE_LOCK_FILE: &str = ".prune.lock";

/// Result of one prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Records re-validated.
    pub examined: usize,
    /// Records deleted because they no longer validate.
    pub removed: usize,
    /// Index entries dropped because their file had already disappeared.
    pub vanished: usize,
    /// Records left in place because reading or deleting them failed.
    pub failed: usize,
}

/// Validated router contacts keyed by identity.
pub struct RcStore {
    dir: PathBuf,
    validator: Arc<dyn RcValidator>,
    index: RwLock<BTreeMap<RouterId, PathBuf>>,
    prune_guard: Mutex<()>,
}

impl std::fmt::Debug for RcStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcStore")
            .field("dir", &self.dir)
            .field("records", &self.len())
            .finish()
    }
}

impl RcStore {
    /// Open the store at `dir`, creating the directory if needed, and index
    /// every file whose name is a router id.
    pub fn open(dir: impl Into<PathBuf>, validator: Arc<dyn RcValidator>) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_private_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut index = BTreeMap::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| StoreError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(|n| n.parse::<RouterId>().ok()) {
                Some(id) => {
                    index.insert(id, entry.path());
                }
                None => {
                    tracing::debug!(file = ?name, "skipping non-RC file in store directory");
                }
            }
        }

        tracing::info!(dir = %dir.display(), records = index.len(), "RC store opened");
        Ok(Self {
            dir,
            validator,
            index: RwLock::new(index),
            prune_guard: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &RouterId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    /// Validate `bytes` and, if valid, store them under their identity,
    /// replacing any earlier record for the same identity.
    ///
    /// Returns `Ok(false)` for invalid input with no side effect. Filesystem
    /// failures are errors, never a `false`.
    pub fn insert_if_valid(&self, bytes: &[u8]) -> Result<bool, StoreError> {
        if !self.validator.validate(bytes) {
            return Ok(false);
        }
        let Some(id) = self.validator.extract_identifier(bytes) else {
            tracing::warn!("valid router contact without extractable identity");
            return Ok(false);
        };

        let path = self.record_path(&id);
        write_atomic(&path, bytes).map_err(|e| StoreError::io(&path, e))?;
        self.index.write().insert(id, path);

        tracing::info!(router_id = %id, "router contact stored");
        Ok(true)
    }

    /// Re-validate every indexed record and delete the ones that fail.
    ///
    /// Only one pass runs at a time, across processes sharing the
    /// directory; a concurrent call returns [`StoreError::PruneInProgress`].
    /// A record that cannot be read or deleted is logged, counted in
    /// [`PruneReport::failed`] and skipped; only taking the lock can fail
    /// the whole pass.
    pub fn prune(&self) -> Result<PruneReport, StoreError> {
        let lock_path = self.dir.join(PRUNE_LOCK_FILE);
        let Some(_local) = self.prune_guard.try_lock() else {
            return Err(StoreError::PruneInProgress(lock_path));
        };
        let _lock = MaintenanceLock::try_acquire(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?
            .ok_or_else(|| StoreError::PruneInProgress(lock_path.clone()))?;

        let snapshot: Vec<(RouterId, PathBuf)> = self
            .index
            .read()
            .iter()
            .map(|(id, path)| (*id, path.clone()))
            .collect();

        let mut report = PruneReport::default();
        for (id, path) in snapshot {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    self.forget(&id, &path);
                    report.vanished += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read router contact, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            report.examined += 1;
            if self.validator.validate(&bytes) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot delete invalid router contact");
                    report.failed += 1;
                    continue;
                }
            }
            self.forget(&id, &path);
            report.removed += 1;
            tracing::info!(router_id = %id, "pruned invalid router contact");
        }

        tracing::info!(
            examined = report.examined,
            removed = report.removed,
            vanished = report.vanished,
            failed = report.failed,
            "prune pass complete"
        );
        Ok(report)
    }

    /// Drop `id` from the index if it still points at `path`.
    fn forget(&self, id: &RouterId, path: &Path) {
        let mut index = self.index.write();
        if index.get(id).map(|p| p.as_path()) == Some(path) {
            index.remove(id);
        }
    }

    /// Bytes of one uniformly chosen record, or `None` when empty.
    pub fn pick_random(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let mut rng = rand::thread_rng();
        loop {
            let choice = {
                let index = self.index.read();
                index
                    .iter()
                    .choose(&mut rng)
                    .map(|(id, path)| (*id, path.clone()))
            };
            let Some((id, path)) = choice else {
                return Ok(None);
            };
            match std::fs::read(&path) {
                Ok(bytes) => return Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(router_id = %id, "indexed record vanished, dropping");
                    self.forget(&id, &path);
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
    }

    /// Bytes stored for `id`, if any.
    pub fn get(&self, id: &RouterId) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(path) = self.index.read().get(id).cloned() else {
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    pub fn contains(&self, id: &RouterId) -> bool {
        self.index.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<RouterId> {
        self.index.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}
