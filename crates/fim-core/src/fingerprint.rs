//! Per-entry fingerprints: metadata plus a SHA-256 content digest.
//!
//! A fingerprint is taken with a non-dereferencing stat, so a symlink is
//! recorded as the link itself. Regular files are always rehashed in full;
//! there is no mtime shortcut.

use crate::error::{FimError, Result};
use crate::pathname;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, Metadata};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Buffer size for streaming file content into the hasher (64KB)
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Ownership sentinel used when the platform cannot report uid/gid.
pub const UNKNOWN_OWNER: i64 = -1;

/// Permission, setuid, setgid and sticky bits of `st_mode`.
const PERMISSION_BITS: u32 = 0o7777;

/// Observable state of one filesystem entry at scan time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Walked path in [`pathname`] form; also the snapshot key.
    pub path: String,
    /// Resolved absolute target, for symlinks whose target could be resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    pub size: u64,
    pub mode: u32,
    pub mod_time: i64,
    /// SHA-256 hex digest; regular files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub uid: i64,
    pub gid: i64,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// How two records of the same path differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    Content,
    Permissions,
    Metadata,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Content => "content",
            Self::Permissions => "permissions",
            Self::Metadata => "metadata",
        }
    }
}

impl Fingerprint {
    /// Fingerprint the entry at `path` without following a final symlink.
    pub fn collect(path: &Path) -> Result<Self> {
        let metadata = fs::symlink_metadata(path).map_err(|e| FimError::io(path, e))?;
        let file_type = metadata.file_type();
        let is_dir = file_type.is_dir();
        let is_symlink = file_type.is_symlink();
        let (uid, gid) = ownership(&metadata);

        let hash = if !is_dir && !is_symlink {
            Some(hash_file(path)?)
        } else {
            None
        };

        // best effort: an unresolvable link is still recorded
        let link_target = if is_symlink {
            fs::canonicalize(path)
                .ok()
                .map(|target| pathname::encode(&target))
        } else {
            None
        };

        Ok(Self {
            path: pathname::encode(path),
            link_target,
            size: if is_dir || is_symlink { 0 } else { metadata.len() },
            mode: raw_mode(&metadata),
            mod_time: mod_time_secs(&metadata),
            hash,
            uid,
            gid,
            is_dir,
            is_symlink,
        })
    }

    pub fn is_regular(&self) -> bool {
        !self.is_dir && !self.is_symlink
    }

    /// The recorded path as a real filesystem path.
    pub fn fs_path(&self) -> PathBuf {
        pathname::decode(&self.path)
    }

    /// Path as shown to users, with the symlink target appended when known.
    pub fn display_path(&self) -> String {
        match &self.link_target {
            Some(target) => format!("{} -> {}", self.path, target),
            None => self.path.clone(),
        }
    }

    /// Classify the difference between this (older) record and `newer`.
    ///
    /// An entry replaced by one of another type, or a regular file with new
    /// content, is a content change. Permission and ownership bits come
    /// next, then the remaining metadata.
    pub fn change_kind(&self, newer: &Fingerprint) -> ChangeKind {
        if self.is_dir != newer.is_dir || self.is_symlink != newer.is_symlink {
            return ChangeKind::Content;
        }
        if self.is_regular() && self.hash != newer.hash {
            return ChangeKind::Content;
        }
        if self.mode & PERMISSION_BITS != newer.mode & PERMISSION_BITS
            || self.uid != newer.uid
            || self.gid != newer.gid
        {
            return ChangeKind::Permissions;
        }
        if self != newer {
            return ChangeKind::Metadata;
        }
        ChangeKind::Unchanged
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        let same_metadata = self.path == other.path
            && self.link_target == other.link_target
            && self.size == other.size
            && self.mode == other.mode
            && self.mod_time == other.mod_time
            && self.uid == other.uid
            && self.gid == other.gid
            && self.is_dir == other.is_dir
            && self.is_symlink == other.is_symlink;
        if !same_metadata {
            return false;
        }
        if self.is_regular() {
            return self.hash == other.hash;
        }
        true
    }
}

impl Eq for Fingerprint {}

/// Stream a file through SHA-256 and return the hex digest.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| FimError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer).map_err(|e| FimError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(unix)]
fn raw_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
fn raw_mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(unix)]
fn mod_time_secs(metadata: &Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    metadata.mtime()
}

#[cfg(not(unix))]
fn mod_time_secs(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn ownership(metadata: &Metadata) -> (i64, i64) {
    use std::os::unix::fs::MetadataExt;
    (i64::from(metadata.uid()), i64::from(metadata.gid()))
}

#[cfg(not(unix))]
fn ownership(_metadata: &Metadata) -> (i64, i64) {
    (UNKNOWN_OWNER, UNKNOWN_OWNER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn regular(path: &str, hash: &str) -> Fingerprint {
        Fingerprint {
            path: path.to_string(),
            link_target: None,
            size: 3,
            mode: 0o100644,
            mod_time: 1_700_000_000,
            hash: Some(hash.to_string()),
            uid: 0,
            gid: 0,
            is_dir: false,
            is_symlink: false,
        }
    }

    #[test]
    fn regular_file_is_hashed_with_sha256() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        fs::write(&file, b"hello world").unwrap();

        let fp = Fingerprint::collect(&file).unwrap();
        assert_eq!(fp.hash.as_deref(), Some(HELLO_WORLD_SHA256));
        assert_eq!(fp.size, 11);
        assert!(fp.is_regular());
        assert_eq!(fp.path, file.display().to_string());
    }

    #[test]
    fn collection_is_deterministic_for_unchanged_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("data.bin");
        fs::write(&file, vec![7u8; 200_000]).unwrap();

        let first = Fingerprint::collect(&file).unwrap();
        let second = Fingerprint::collect(&file).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn directory_has_no_hash_and_zero_size() {
        let dir = tempdir().unwrap();
        let fp = Fingerprint::collect(dir.path()).unwrap();
        assert!(fp.is_dir);
        assert!(!fp.is_symlink);
        assert!(fp.hash.is_none());
        assert_eq!(fp.size, 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_recorded_with_resolved_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target.txt");
        fs::write(&target, b"payload").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let fp = Fingerprint::collect(&link).unwrap();
        assert!(fp.is_symlink);
        assert!(fp.hash.is_none());
        assert_eq!(fp.path, link.display().to_string());
        let resolved = fs::canonicalize(&target).unwrap().display().to_string();
        assert_eq!(fp.link_target.as_deref(), Some(resolved.as_str()));
        assert!(fp.display_path().ends_with(&format!(" -> {resolved}")));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_recorded_without_target() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("missing"), &link).unwrap();

        let fp = Fingerprint::collect(&link).unwrap();
        assert!(fp.is_symlink);
        assert!(fp.link_target.is_none());
        assert_eq!(fp.display_path(), link.display().to_string());
    }

    #[cfg(unix)]
    #[test]
    fn ownership_and_mode_come_from_stat() {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let dir = tempdir().unwrap();
        let file = dir.path().join("owned");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).unwrap();

        let fp = Fingerprint::collect(&file).unwrap();
        let meta = fs::metadata(&file).unwrap();
        assert_eq!(fp.uid, i64::from(meta.uid()));
        assert_eq!(fp.gid, i64::from(meta.gid()));
        assert_eq!(fp.mode & 0o777, 0o640);
        assert_eq!(fp.mode & 0o170000, 0o100000);
    }

    #[test]
    fn missing_path_fails_with_io_error() {
        let dir = tempdir().unwrap();
        let err = Fingerprint::collect(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn equality_requires_hash_only_for_regular_files() {
        let a = regular("/a", "h1");
        let b = regular("/a", "h2");
        assert_ne!(a, b);

        let mut dir_a = regular("/d", "ignored-1");
        dir_a.is_dir = true;
        let mut dir_b = regular("/d", "ignored-2");
        dir_b.is_dir = true;
        assert_eq!(dir_a, dir_b);
    }

    #[test]
    fn change_kind_prefers_content_over_permissions() {
        let old = regular("/a", "h1");

        let mut content_and_mode = regular("/a", "h2");
        content_and_mode.mode = 0o100600;
        assert_eq!(old.change_kind(&content_and_mode), ChangeKind::Content);

        let mut mode_only = regular("/a", "h1");
        mode_only.mode = 0o100600;
        assert_eq!(old.change_kind(&mode_only), ChangeKind::Permissions);

        let mut touched = regular("/a", "h1");
        touched.mod_time += 10;
        assert_eq!(old.change_kind(&touched), ChangeKind::Metadata);

        assert_eq!(old.change_kind(&old.clone()), ChangeKind::Unchanged);
    }

    #[test]
    fn type_change_is_not_a_permission_change() {
        let old = regular("/a", "h1");

        let mut now_dir = regular("/a", "unused");
        now_dir.is_dir = true;
        now_dir.hash = None;
        now_dir.mode = 0o040644;
        assert_eq!(old.change_kind(&now_dir), ChangeKind::Content);

        let mut now_link = regular("/a", "unused");
        now_link.is_symlink = true;
        now_link.hash = None;
        now_link.mode = 0o120644;
        assert_eq!(old.change_kind(&now_link), ChangeKind::Content);

        let mut setuid = regular("/a", "h1");
        setuid.mode = 0o104644;
        assert_eq!(old.change_kind(&setuid), ChangeKind::Permissions);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_kept_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        let dir = tempdir().unwrap();
        let ff = dir.path().join(OsStr::from_bytes(b"a\xff"));
        let fe = dir.path().join(OsStr::from_bytes(b"a\xfe"));
        fs::write(&ff, b"one").unwrap();
        fs::write(&fe, b"two").unwrap();

        let first = Fingerprint::collect(&ff).unwrap();
        let second = Fingerprint::collect(&fe).unwrap();
        assert_ne!(first.path, second.path);
        assert!(first.path.ends_with("a\\xff"));
        assert_eq!(first.fs_path(), ff);
        assert_eq!(second.fs_path(), fe);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn serialized_form_omits_absent_hash() {
        let mut fp = regular("/d", "unused");
        fp.is_dir = true;
        fp.hash = None;
        let value = serde_json::to_value(&fp).unwrap();
        assert!(value.get("hash").is_none());
        assert!(value.get("link_target").is_none());
        assert_eq!(value["is_dir"], true);
        assert_eq!(value["mod_time"], 1_700_000_000);
    }
}
