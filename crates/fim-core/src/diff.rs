//! Snapshot comparison.

use crate::fingerprint::Fingerprint;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// Delta between a baseline and a current snapshot.
///
/// Each sequence is sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<Fingerprint>,
    pub modified: Vec<Fingerprint>,
    pub deleted: Vec<Fingerprint>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Classify every path of `baseline` and `current` as added, modified,
/// deleted or unchanged.
///
/// Added and modified records come from `current`; deleted records come
/// from `baseline`. Each snapshot is read under its own lock, so the result
/// is not atomic against concurrent mutation of either input.
pub fn compare(baseline: &Snapshot, current: &Snapshot) -> ChangeSet {
    let old = baseline.entries();
    let new = current.entries();
    let mut changes = ChangeSet::default();

    for (path, record) in &new {
        match old.get(path) {
            None => changes.added.push(record.clone()),
            Some(previous) if previous != record => changes.modified.push(record.clone()),
            Some(_) => {}
        }
    }

    for (path, record) in &old {
        if !new.contains_key(path) {
            changes.deleted.push(record.clone());
        }
    }

    for bucket in [
        &mut changes.added,
        &mut changes.modified,
        &mut changes.deleted,
    ] {
        bucket.sort_by(|a, b| a.path.cmp(&b.path));
    }
    changes
}

/// Log lines for every change: added, then modified, then deleted.
///
/// Modified lines name the kind of change relative to `baseline`.
pub fn change_lines(baseline: &Snapshot, changes: &ChangeSet) -> Vec<String> {
    let mut lines = Vec::with_capacity(changes.len());
    for record in &changes.added {
        lines.push(format!("[+] New file: {}", record.display_path()));
    }
    for record in &changes.modified {
        let kind = baseline
            .get(&record.path)
            .map(|old| old.change_kind(record).as_str())
            .unwrap_or("metadata");
        lines.push(format!(
            "[*] Modified file: {} ({kind})",
            record.display_path()
        ));
    }
    for record in &changes.deleted {
        lines.push(format!("[-] Deleted file: {}", record.display_path()));
    }
    lines
}
