//! One daemon pass: walk every root, diff against the working baseline and
//! report each change.

use crate::daemon::{Daemon, DaemonState};
use fim_core::diff::{change_lines, compare, ChangeSet};
use fim_core::error::{FimError, Result};
use fim_core::exclusion::ExclusionSet;
use fim_core::fingerprint::Fingerprint;
use fim_core::snapshot::Snapshot;
use fim_core::walker::Walker;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one poll pass.
#[derive(Debug, Default)]
pub struct PollReport {
    pub changes: ChangeSet,
    /// Per-root walk failures. The pass continued past each of them.
    pub errors: Vec<FimError>,
}

impl PollReport {
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty() && self.errors.is_empty()
    }
}

impl Daemon {
    /// Scan all monitored roots once and report drift from the baseline.
    pub fn scan_once(&self) -> Result<PollReport> {
        if self.state() != DaemonState::Running {
            return Err(FimError::NotRunning);
        }
        let baseline = self.baseline().ok_or(FimError::NotRunning)?;
        let exclusions = self.config().exclusions()?;

        let current = Snapshot::new();
        let mut errors = Vec::new();
        let mut failed_roots: Vec<PathBuf> = Vec::new();
        for root in &self.config().monitor.paths {
            if let Err(e) = walk_root(root, &exclusions, &current) {
                warn!(root = %root.display(), error = %e, "scan of root failed");
                self.emit(&format!("Error during scan: {e}"));
                failed_roots.push(root.clone());
                if let Ok(resolved) = fs::canonicalize(root) {
                    failed_roots.push(resolved);
                }
                errors.push(e);
            }
        }

        let mut changes = compare(&baseline, &current);
        changes.deleted = confirmed_deletions(&baseline, changes.deleted, &failed_roots);

        debug!(entries = current.len(), changes = changes.len(), "poll pass complete");
        self.report(&baseline, &changes);
        Ok(PollReport { changes, errors })
    }

    fn report(&self, baseline: &Snapshot, changes: &ChangeSet) {
        for line in change_lines(baseline, changes) {
            info!("{line}");
            self.emit(&line);
        }
    }

    fn emit(&self, line: &str) {
        if let Err(e) = self.sink().line(line) {
            warn!(error = %e, "failed to write change log line");
        }
    }
}

fn walk_root(root: &Path, exclusions: &ExclusionSet, into: &Snapshot) -> Result<()> {
    let walker = Walker::new(root, |p: &Path| exclusions.is_excluded(p))?;
    for record in walker {
        into.insert(record?);
    }
    Ok(())
}

/// Drop diff deletions under roots whose walk failed, then add every
/// baseline path that is gone from disk.
fn confirmed_deletions(
    baseline: &Snapshot,
    from_diff: Vec<Fingerprint>,
    failed_roots: &[PathBuf],
) -> Vec<Fingerprint> {
    let under_failed = |record: &Fingerprint| {
        let path = record.fs_path();
        failed_roots.iter().any(|r| path.starts_with(r))
    };

    let mut seen = HashSet::new();
    let mut deleted: Vec<Fingerprint> = from_diff
        .into_iter()
        .filter(|r| !under_failed(r))
        .filter(|r| seen.insert(r.path.clone()))
        .collect();

    for (path, record) in baseline.entries() {
        if seen.contains(&path) {
            continue;
        }
        if let Err(e) = fs::symlink_metadata(record.fs_path()) {
            if e.kind() == io::ErrorKind::NotFound {
                seen.insert(path);
                deleted.push(record);
            }
        }
    }
    deleted.sort_by(|a, b| a.path.cmp(&b.path));
    deleted
}
