//! Depth-first, pre-order walk of one monitored root.
//!
//! The walk is lazy and stops at the first failure: once an error has been
//! yielded the iterator is exhausted. Excluded directories are pruned
//! without being read.

use crate::error::{FimError, Result};
use crate::fingerprint::Fingerprint;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// Lazy sequence of fingerprints under one root.
pub struct Walker<F> {
    root: PathBuf,
    inner: walkdir::IntoIter,
    exclude: F,
    finished: bool,
}

impl<F> Walker<F>
where
    F: Fn(&Path) -> bool,
{
    /// Start a walk of `root`. A root that is itself a symlink is replaced
    /// by its resolved target before walking.
    pub fn new(root: &Path, exclude: F) -> Result<Self> {
        let root = resolve_root(root)?;
        let inner = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Ok(Self {
            root,
            inner,
            exclude,
            finished: false,
        })
    }

    /// The path actually being walked, after symlink resolution.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl<F> Iterator for Walker<F>
where
    F: Fn(&Path) -> bool,
{
    type Item = Result<Fingerprint>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.finished = true;
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(FimError::io(path, io::Error::from(err))));
                }
            };

            if (self.exclude)(entry.path()) {
                if entry.file_type().is_dir() {
                    trace!(path = %entry.path().display(), "pruning excluded directory");
                    self.inner.skip_current_dir();
                }
                continue;
            }

            return match Fingerprint::collect(entry.path()) {
                Ok(fp) => Some(Ok(fp)),
                Err(err) => {
                    self.finished = true;
                    Some(Err(err))
                }
            };
        }
    }
}

/// Convenience constructor mirroring the free-function form of a walk.
pub fn walk<F>(root: &Path, exclude: F) -> Result<Walker<F>>
where
    F: Fn(&Path) -> bool,
{
    Walker::new(root, exclude)
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    let metadata = fs::symlink_metadata(root).map_err(|e| FimError::io(root, e))?;
    if metadata.file_type().is_symlink() {
        fs::canonicalize(root).map_err(|e| FimError::io(root, e))
    } else {
        Ok(root.to_path_buf())
    }
}
