//! One-shot scan of every configured root into a single snapshot.

use crate::config::Config;
use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::walker::Walker;
use std::path::Path;
use tracing::{debug, info};

/// Walk every monitored root in order. The first failure aborts the scan.
pub fn scan_roots(config: &Config) -> Result<Snapshot> {
    config.require_paths()?;
    let exclusions = config.exclusions()?;
    let snapshot = Snapshot::new();
    for root in &config.monitor.paths {
        let walker = Walker::new(root, |p: &Path| exclusions.is_excluded(p))?;
        debug!(root = %root.display(), walked = %walker.root().display(), "scanning root");
        for record in walker {
            snapshot.insert(record?);
        }
    }
    info!(
        roots = config.monitor.paths.len(),
        entries = snapshot.len(),
        "scan complete"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scans_all_roots_into_one_snapshot() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::write(a.path().join("one"), b"1").unwrap();
        fs::write(b.path().join("two"), b"2").unwrap();
        fs::create_dir(b.path().join("cache")).unwrap();
        fs::write(b.path().join("cache/blob"), b"x").unwrap();

        let config = Config {
            monitor: MonitorConfig {
                paths: vec![a.path().to_path_buf(), b.path().to_path_buf()],
                exclude: vec![format!("{}/cache", b.path().display())],
            },
            ..Config::default()
        };

        let snapshot = scan_roots(&config).unwrap();
        assert!(snapshot.contains(&a.path().join("one").display().to_string()));
        assert!(snapshot.contains(&b.path().join("two").display().to_string()));
        assert!(!snapshot.contains(&b.path().join("cache").display().to_string()));
        assert!(!snapshot.contains(&b.path().join("cache/blob").display().to_string()));
        assert_eq!(snapshot.len(), 4);
    }

    #[test]
    fn empty_path_list_is_rejected_before_walking() {
        let err = scan_roots(&Config::default()).unwrap_err();
        assert!(matches!(err, crate::error::FimError::Config(_)));
    }

    #[test]
    fn missing_root_fails_the_scan() {
        let a = tempdir().unwrap();
        let config = Config {
            monitor: MonitorConfig {
                paths: vec![a.path().join("gone")],
                exclude: vec![],
            },
            ..Config::default()
        };
        assert!(scan_roots(&config).unwrap_err().is_io());
    }
}
