//! Snapshot-and-diff engine for file integrity monitoring.
//!
//! A scan walks each monitored root, fingerprints every non-excluded entry
//! (metadata plus a SHA-256 of regular file content) and collects the
//! records into a [`Snapshot`]. Two snapshots are compared with
//! [`diff::compare`] into a [`ChangeSet`] of added, modified and deleted
//! records. The trusted snapshot is persisted as JSON by [`store`].

pub mod config;
pub mod diff;
pub mod error;
pub mod event_log;
pub mod exclusion;
pub mod fingerprint;
pub mod liveness;
pub mod pathname;
pub mod paths;
pub mod scanner;
pub mod snapshot;
pub mod store;
pub mod walker;

pub use config::Config;
pub use diff::{change_lines, compare, ChangeSet};
pub use error::{FimError, Result};
pub use event_log::{ChangeSink, EventLog};
pub use exclusion::ExclusionSet;
pub use fingerprint::{ChangeKind, Fingerprint};
pub use liveness::{LivenessRegistry, PidFile};
pub use paths::StateDir;
pub use scanner::scan_roots;
pub use snapshot::Snapshot;
pub use walker::{walk, Walker};
