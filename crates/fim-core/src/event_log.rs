use crate::error::{FimError, Result};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_ROTATIONS: usize = 5;
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Destination for change and scan-error lines.
pub trait ChangeSink: Send + Sync {
    fn line(&self, message: &str) -> Result<()>;
}

/// Append-only, timestamped text log with size-based rotation.
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
    max_bytes: u64,
}

impl EventLog {
    pub fn new<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FimError::io(parent, e))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
            max_bytes,
        })
    }

    /// Write one `<timestamp> <message>` line.
    pub fn append(&self, message: &str) -> Result<()> {
        let _guard = self.lock.lock();
        self.rotate_if_needed()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FimError::io(&self.path, e))?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        writeln!(file, "{timestamp} {message}")
            .and_then(|_| file.flush())
            .map_err(|e| FimError::io(&self.path, e))
    }

    fn rotate_if_needed(&self) -> Result<()> {
        match fs::metadata(&self.path) {
            Ok(metadata) if metadata.len() >= self.max_bytes => {}
            _ => return Ok(()),
        }
        for i in (1..=MAX_ROTATIONS).rev() {
            let rotated = self.path_with_suffix(i);
            if rotated.exists() {
                if i == MAX_ROTATIONS {
                    fs::remove_file(&rotated).map_err(|e| FimError::io(&rotated, e))?;
                } else {
                    let next = self.path_with_suffix(i + 1);
                    fs::rename(&rotated, &next).map_err(|e| FimError::io(&rotated, e))?;
                }
            }
        }
        fs::rename(&self.path, self.path_with_suffix(1)).map_err(|e| FimError::io(&self.path, e))
    }

    fn path_with_suffix(&self, index: usize) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{index}"));
        self.path.with_file_name(name)
    }
}

impl ChangeSink for EventLog {
    fn line(&self, message: &str) -> Result<()> {
        self.append(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lines_are_timestamped_and_appended_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fim.log");
        let log = EventLog::new(&path, DEFAULT_MAX_BYTES).unwrap();
        log.append("[+] New file: /etc/a").unwrap();
        log.line("[-] Deleted file: /etc/b").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" [+] New file: /etc/a"));
        assert!(lines[1].ends_with(" [-] Deleted file: /etc/b"));
        let stamp = lines[0].split(' ').next().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn rotation_keeps_bounded_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fim.log");
        let log = EventLog::new(&path, 256).unwrap();
        for i in 0..200 {
            log.append(&format!("[*] Modified file: /srv/file-{i}")).unwrap();
        }
        assert!(path.with_file_name("fim.log.1").exists());
        assert!(path.with_file_name("fim.log.5").exists());
        assert!(!path.with_file_name("fim.log.6").exists());
    }

    #[test]
    fn parent_directory_is_created_up_front() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/fim.log");
        EventLog::new(&path, DEFAULT_MAX_BYTES).unwrap();
        assert!(dir.path().join("logs").is_dir());
        assert!(!path.exists());
    }
}
