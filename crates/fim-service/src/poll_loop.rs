//! Interval-driven poll loop.
//!
//! Runs one [`Daemon::scan_once`] pass per tick on the blocking pool. The
//! loop can be woken early or shut down through [`PollLoopHandle`]; the
//! process entry point is still expected to stop the daemon on exit.

use crate::daemon::{Daemon, DaemonState};
use crate::poll::PollReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Control side of a running poll loop.
pub struct PollLoopHandle {
    /// Wakes the loop for an immediate pass.
    pub wake: Arc<Notify>,
    /// Send `true` to shut down.
    pub shutdown_tx: watch::Sender<bool>,
}

impl PollLoopHandle {
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Spawn the poll loop as a tokio task.
///
/// `on_report` receives the result of every completed pass.
pub fn spawn_poll_loop<F>(
    daemon: Arc<Daemon>,
    interval: Duration,
    on_report: F,
) -> (tokio::task::JoinHandle<()>, PollLoopHandle)
where
    F: Fn(PollReport) + Send + Sync + 'static,
{
    let wake = Arc::new(Notify::new());
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let wake_clone = wake.clone();

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "poll loop started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wake_clone.notified() => {
                    debug!("poll loop woken early");
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("poll loop shutting down");
                        return;
                    }
                }
            }

            if *shutdown_rx.borrow() {
                return;
            }
            if daemon.state() != DaemonState::Running {
                info!("daemon no longer running; poll loop exiting");
                return;
            }

            let worker = daemon.clone();
            match tokio::task::spawn_blocking(move || worker.scan_once()).await {
                Ok(Ok(report)) => on_report(report),
                Ok(Err(e)) => warn!(error = %e, "poll pass failed"),
                Err(e) => warn!(error = %e, "poll pass aborted"),
            }
        }
    });

    (handle, PollLoopHandle { wake, shutdown_tx })
}
