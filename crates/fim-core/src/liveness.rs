//! Process liveness marker used to keep a single daemon per state directory.

use crate::error::{FimError, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Records which process owns the daemon role.
pub trait LivenessRegistry: Send + Sync {
    /// True when a marker exists and its process is still alive.
    fn is_live(&self) -> bool;
    /// Record `pid` as the current owner, replacing any stale marker.
    fn claim(&self, pid: u32) -> Result<()>;
    /// Remove the marker. Releasing an absent marker succeeds.
    fn release(&self) -> Result<()>;
    /// Identity recorded by the current marker, when the registry knows it.
    fn holder(&self) -> Option<u32> {
        None
    }
}

/// Marker stored as a file holding the decimal PID.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// PID stored in the marker, if the file exists and parses.
    pub fn recorded_pid(&self) -> Option<u32> {
        let text = fs::read_to_string(&self.path).ok()?;
        text.trim().parse().ok()
    }
}

impl LivenessRegistry for PidFile {
    fn is_live(&self) -> bool {
        self.recorded_pid().is_some_and(process_alive)
    }

    fn claim(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| FimError::io(parent, e))?;
        }
        fs::write(&self.path, pid.to_string()).map_err(|e| FimError::io(&self.path, e))?;
        debug!(pid, path = %self.path.display(), "liveness marker claimed");
        Ok(())
    }

    fn release(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FimError::io(&self.path, e)),
        }
    }

    fn holder(&self) -> Option<u32> {
        self.recorded_pid()
    }
}

/// Whether a process with `pid` exists.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    pid == std::process::id()
}
