//! Point-in-time collection of fingerprints keyed by path.
//!
//! All access goes through a single reader/writer lock held for exactly one
//! operation. Two separate calls are never atomic with respect to each other.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
struct SnapshotState {
    entries: HashMap<String, Fingerprint>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Snapshot {
    created_at: DateTime<Utc>,
    state: RwLock<SnapshotState>,
}

/// Borrowed on-disk layout, written while the read lock is held.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    files: BTreeMap<&'a str, &'a Fingerprint>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct SnapshotDocument {
    files: HashMap<String, Fingerprint>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            state: RwLock::new(SnapshotState {
                entries: HashMap::new(),
                updated_at: now,
            }),
        }
    }

    /// Insert or replace the record keyed by its path.
    pub fn insert(&self, record: Fingerprint) {
        let mut state = self.state.write();
        state.entries.insert(record.path.clone(), record);
        touch(&mut state);
    }

    pub fn get(&self, path: &str) -> Option<Fingerprint> {
        self.state.read().entries.get(path).cloned()
    }

    pub fn remove(&self, path: &str) -> Option<Fingerprint> {
        let mut state = self.state.write();
        let removed = state.entries.remove(path);
        touch(&mut state);
        removed
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.read().entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Consistent copy of all entries taken under one read lock.
    pub fn entries(&self) -> HashMap<String, Fingerprint> {
        self.state.read().entries.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.read().updated_at
    }

    /// Encode as pretty-printed JSON.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Decode bytes produced by [`Snapshot::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

fn touch(state: &mut SnapshotState) {
    let now = Utc::now();
    if now > state.updated_at {
        state.updated_at = now;
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        let state = self.state.read();
        Self {
            created_at: self.created_at,
            state: RwLock::new(SnapshotState {
                entries: state.entries.clone(),
                updated_at: state.updated_at,
            }),
        }
    }
}

impl FromIterator<Fingerprint> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        let snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let state = self.state.read();
        SnapshotRef {
            files: state
                .entries
                .iter()
                .map(|(path, fp)| (path.as_str(), fp))
                .collect(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let doc = SnapshotDocument::deserialize(deserializer)?;
        if let Some((key, fp)) = doc.files.iter().find(|(key, fp)| **key != fp.path) {
            return Err(D::Error::custom(format!(
                "entry key {key:?} does not match recorded path {:?}",
                fp.path
            )));
        }
        Ok(Self {
            created_at: doc.created_at,
            state: RwLock::new(SnapshotState {
                entries: doc.files,
                updated_at: doc.updated_at,
            }),
        })
    }
}
