//! Filesystem helpers shared by the RC store and the artifact cache.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Create `dir` (and parents) if missing. New directories are private
/// (0700) on unix.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Replace `path` with `bytes` so that readers observe either the old file
/// or the new one in full.
///
/// Writes a temporary file next to the target, syncs it and renames it into
/// place. The temporary file is removed if any step fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with(path, bytes, |_| Ok(()))
}

/// [`write_atomic`] with a hook that runs on the synced temporary file just
/// before it is renamed, e.g. to adjust its timestamps.
pub fn write_atomic_with(
    path: &Path,
    bytes: &[u8],
    finish: impl FnOnce(&File) -> io::Result<()>,
) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::other("target path has no parent directory"))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    finish(temp.as_file())?;
    temp.persist(path).map_err(|err| err.error)?;
    #[cfg(unix)]
    {
        if let Ok(d) = File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}
