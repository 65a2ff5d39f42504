//! Daemon lifecycle: stopped -> starting -> running -> stopping -> stopped.

use fim_core::config::Config;
use fim_core::error::{FimError, Result};
use fim_core::event_log::ChangeSink;
use fim_core::liveness::LivenessRegistry;
use fim_core::snapshot::Snapshot;
use fim_core::store;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl DaemonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonState::Stopped => "stopped",
            DaemonState::Starting => "starting",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
        }
    }
}

struct Inner {
    state: DaemonState,
    baseline: Option<Arc<Snapshot>>,
}

/// Long-lived monitor owned by the process entry point.
///
/// The working baseline is loaded once on start and never replaced, so every
/// pass reports drift from the last committed baseline.
pub struct Daemon {
    config: Config,
    baseline_path: PathBuf,
    registry: Box<dyn LivenessRegistry>,
    sink: Arc<dyn ChangeSink>,
    interval: Duration,
    inner: Mutex<Inner>,
}

impl Daemon {
    /// `config` must already be validated. An empty path list is rejected.
    pub fn new(
        config: Config,
        baseline_path: impl Into<PathBuf>,
        registry: Box<dyn LivenessRegistry>,
        sink: Arc<dyn ChangeSink>,
    ) -> Result<Self> {
        config.require_paths()?;
        let interval = config.interval()?;
        Ok(Self {
            config,
            baseline_path: baseline_path.into(),
            registry,
            sink,
            interval,
            inner: Mutex::new(Inner {
                state: DaemonState::Stopped,
                baseline: None,
            }),
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn baseline_path(&self) -> &Path {
        &self.baseline_path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn sink(&self) -> &dyn ChangeSink {
        self.sink.as_ref()
    }

    pub fn state(&self) -> DaemonState {
        self.inner.lock().state
    }

    /// Working baseline while running.
    pub fn baseline(&self) -> Option<Arc<Snapshot>> {
        self.inner.lock().baseline.clone()
    }

    /// Claim the liveness marker for `pid` and load the persisted baseline.
    ///
    /// Any failure leaves the daemon stopped with no marker of its own.
    pub fn start(&self, pid: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != DaemonState::Stopped {
            return Err(FimError::InvalidTransition {
                from: inner.state.as_str(),
                to: DaemonState::Starting.as_str(),
            });
        }
        inner.state = DaemonState::Starting;

        if self.registry.is_live() {
            inner.state = DaemonState::Stopped;
            return Err(FimError::AlreadyRunning {
                pid: self.registry.holder(),
            });
        }

        if let Err(e) = self.registry.claim(pid) {
            inner.state = DaemonState::Stopped;
            return Err(e);
        }

        let baseline = match store::load(&self.baseline_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if let Err(release_err) = self.registry.release() {
                    warn!(error = %release_err, "failed to release liveness marker after start failure");
                }
                inner.state = DaemonState::Stopped;
                return Err(e);
            }
        };

        info!(
            pid,
            entries = baseline.len(),
            roots = self.config.monitor.paths.len(),
            interval_secs = self.interval.as_secs(),
            "daemon running"
        );
        inner.baseline = Some(Arc::new(baseline));
        inner.state = DaemonState::Running;
        Ok(())
    }

    /// Release the liveness marker. Only legal while running.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            DaemonState::Running => {}
            DaemonState::Stopped => return Err(FimError::NotRunning),
            other => {
                return Err(FimError::InvalidTransition {
                    from: other.as_str(),
                    to: DaemonState::Stopping.as_str(),
                })
            }
        }
        inner.state = DaemonState::Stopping;
        let released = self.registry.release();
        inner.baseline = None;
        inner.state = DaemonState::Stopped;
        info!("daemon stopped");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fim_core::config::MonitorConfig;

    struct NullSink;

    impl ChangeSink for NullSink {
        fn line(&self, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FailingRegistry;

    impl LivenessRegistry for FailingRegistry {
        fn is_live(&self) -> bool {
            false
        }

        fn claim(&self, _pid: u32) -> Result<()> {
            Err(FimError::io(
                "/nonexistent/fim.pid",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        }

        fn release(&self) -> Result<()> {
            Ok(())
        }
    }

    fn monitored() -> Config {
        Config {
            monitor: MonitorConfig {
                paths: vec![PathBuf::from("/")],
                exclude: vec![],
            },
            ..Config::default()
        }
    }

    #[test]
    fn empty_path_list_is_a_config_error() {
        let result = Daemon::new(
            Config::default(),
            "/nonexistent/baseline.json",
            Box::new(FailingRegistry),
            Arc::new(NullSink),
        );
        assert!(matches!(result, Err(FimError::Config(_))));
    }

    #[test]
    fn state_names() {
        assert_eq!(DaemonState::Stopped.as_str(), "stopped");
        assert_eq!(DaemonState::Running.as_str(), "running");
    }

    #[test]
    fn claim_failure_leaves_daemon_stopped() {
        let daemon = Daemon::new(
            monitored(),
            "/nonexistent/baseline.json",
            Box::new(FailingRegistry),
            Arc::new(NullSink),
        )
        .unwrap();
        assert!(daemon.start(1).unwrap_err().is_io());
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert!(daemon.baseline().is_none());
    }

    #[test]
    fn stop_requires_running() {
        let daemon = Daemon::new(
            monitored(),
            "/nonexistent/baseline.json",
            Box::new(FailingRegistry),
            Arc::new(NullSink),
        )
        .unwrap();
        assert!(matches!(daemon.stop(), Err(FimError::NotRunning)));
    }

    #[test]
    fn interval_defaults_from_config() {
        let daemon = Daemon::new(
            monitored(),
            "/nonexistent/baseline.json",
            Box::new(FailingRegistry),
            Arc::new(NullSink),
        )
        .unwrap();
        assert_eq!(daemon.interval(), fim_core::config::DEFAULT_INTERVAL);
        let daemon = daemon.with_interval(Duration::from_secs(7));
        assert_eq!(daemon.interval(), Duration::from_secs(7));
    }
}
