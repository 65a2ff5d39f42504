//! Poll-based monitoring daemon built on `fim-core`.

pub mod daemon;
pub mod poll;
pub mod poll_loop;

pub use daemon::{Daemon, DaemonState};
pub use poll::PollReport;
pub use poll_loop::{spawn_poll_loop, PollLoopHandle};
