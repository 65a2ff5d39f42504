//! Durable storage of a baseline snapshot.

use crate::error::{FimError, Result};
use crate::snapshot::Snapshot;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Atomically write `snapshot` to `path`.
///
/// The snapshot is encoded under its read lock, staged next to the target,
/// synced, then renamed over the old file.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let bytes = snapshot
        .to_bytes()
        .map_err(|e| FimError::persistence(path, format!("cannot encode snapshot: {e}")))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| FimError::io(parent, e))?;

    let mut staging = NamedTempFile::new_in(parent).map_err(|e| FimError::io(parent, e))?;
    staging
        .write_all(&bytes)
        .and_then(|_| staging.as_file().sync_all())
        .map_err(|e| FimError::io(staging.path(), e))?;
    staging
        .persist(path)
        .map_err(|e| FimError::io(path, e.error))?;

    debug!(path = %path.display(), entries = snapshot.len(), "baseline saved");
    Ok(())
}

/// Load a snapshot previously written by [`save`].
pub fn load(path: &Path) -> Result<Snapshot> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(FimError::persistence(path, "no baseline found"));
        }
        Err(e) => return Err(FimError::persistence(path, e)),
    };
    let snapshot = Snapshot::from_bytes(&bytes)
        .map_err(|e| FimError::persistence(path, format!("malformed baseline: {e}")))?;
    debug!(path = %path.display(), entries = snapshot.len(), "baseline loaded");
    Ok(snapshot)
}
