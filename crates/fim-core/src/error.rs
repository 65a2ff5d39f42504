use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for integrity-monitoring operations
pub type Result<T> = std::result::Result<T, FimError>;

/// Errors raised by the snapshot-and-diff engine and its collaborators
#[derive(Debug, Error)]
pub enum FimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("baseline at {} is unusable: {reason}; run `fim init` to create a new baseline", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("daemon is already running{}", pid.map(|p| format!(" (pid {p})")).unwrap_or_default())]
    AlreadyRunning { pid: Option<u32> },

    #[error("daemon is not running")]
    NotRunning,

    #[error("invalid daemon transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl FimError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        FimError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn persistence(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        FimError::Persistence {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// True for per-entry filesystem failures, which the daemon survives.
    pub fn is_io(&self) -> bool {
        matches!(self, FimError::Io { .. })
    }
}
