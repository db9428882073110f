//! On-disk layout under the server root.
//!
//! ```text
//! <root>/token          webhook secret
//! <root>/nodedb/<id>    one file per router contact
//! <root>/bin/<name>     cached build artifact
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::fsutil::ensure_private_dir;

/// Root used when none is configured.
pub const DEFAULT_ROOT: &str = "/srv/lokinet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn token_file(&self) -> PathBuf {
        self.root.join("token")
    }

    pub fn nodedb_dir(&self) -> PathBuf {
        self.root.join("nodedb")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Create the root and both data directories, private on unix.
    pub fn ensure(&self) -> io::Result<()> {
        ensure_private_dir(&self.root)?;
        ensure_private_dir(&self.nodedb_dir())?;
        ensure_private_dir(&self.bin_dir())
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let layout = DataLayout::new("/data");
        assert_eq!(layout.token_file(), PathBuf::from("/data/token"));
        assert_eq!(layout.nodedb_dir(), PathBuf::from("/data/nodedb"));
        assert_eq!(layout.bin_dir(), PathBuf::from("/data/bin"));
        assert_eq!(DataLayout::default().root(), Path::new(DEFAULT_ROOT));
    }

    #[test]
    fn ensure_creates_everything_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path().join("srv"));
        layout.ensure().unwrap();
        layout.ensure().unwrap();
        assert!(layout.nodedb_dir().is_dir());
        assert!(layout.bin_dir().is_dir());
        assert!(!layout.token_file().exists());
    }
}
