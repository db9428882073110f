//! Advisory maintenance lock.
//!
//! Prune passes must not overlap, whether they come from the server's
//! interval task or from `bootserv prune` run by a timer. The lock is an
//! exclusive advisory lock on a file inside the store directory, taken
//! without waiting: a second pass gives up immediately instead of queueing.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Held maintenance lock. Released on drop.
#[derive(Debug)]
pub struct MaintenanceLock {
    path: PathBuf,
    file: File,
}

impl MaintenanceLock {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` when another holder has it.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file,
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MaintenanceLock {
    fn drop(&mut self) {
        // Closing the file releases it as well.
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!(path = %self.path.display(), error = %e, "maintenance unlock failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".prune.lock");

        let first = MaintenanceLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(MaintenanceLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(MaintenanceLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn held_lock_blocks_a_raw_file_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".prune.lock");
        let _held = MaintenanceLock::try_acquire(&path).unwrap().unwrap();

        let other = OpenOptions::new().write(true).open(&path).unwrap();
        assert!(other.try_lock_exclusive().is_err());
    }

    #[test]
    fn lock_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".prune.lock");
        let lock = MaintenanceLock::try_acquire(&path).unwrap().unwrap();
        assert!(lock.path().exists());
    }
}
