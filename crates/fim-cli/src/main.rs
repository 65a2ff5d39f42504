use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fim_core::config::{parse_interval, Config};
use fim_core::diff::{change_lines, compare};
use fim_core::error::FimError;
use fim_core::event_log::{EventLog, DEFAULT_MAX_BYTES};
use fim_core::liveness::{LivenessRegistry, PidFile};
use fim_core::paths::StateDir;
use fim_core::{scan_roots, store};
use fim_service::{spawn_poll_loop, Daemon};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fim", author, version, about = "File integrity monitor", long_about = None)]
struct Cli {
    /// State directory (defaults to $FIM_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Debug-level diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the configuration, or record a new baseline from it
    Init,
    /// Compare the filesystem against the baseline once
    Scan {
        /// Print the change set as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the monitoring daemon in the foreground
    Start {
        /// Scan interval such as 30s, 5m or 1h
        #[arg(long)]
        interval: Option<String>,
    },
    /// Signal a running daemon to stop
    Stop,
    /// Stop the daemon and delete all state
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let state = StateDir::resolve(cli.data_dir)?;
    match cli.command {
        Commands::Init => init(&state),
        Commands::Scan { json } => scan(&state, json),
        Commands::Start { interval } => start(&state, interval).await,
        Commands::Stop => stop(&state),
        Commands::Clean => clean(&state).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn init(state: &StateDir) -> Result<()> {
    state.ensure()?;
    let config_path = state.config_path();
    if !config_path.exists() {
        Config::write_default(&config_path)?;
        println!("Created default configuration at {}", config_path.display());
        println!("Edit it to list the paths to monitor, then run `fim init` again.");
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    let snapshot = scan_roots(&config)?;
    let baseline_path = state.baseline_path();
    store::save(&snapshot, &baseline_path)?;
    println!(
        "Baseline created with {} entries at {}",
        snapshot.len(),
        baseline_path.display()
    );
    Ok(())
}

fn scan(state: &StateDir, json: bool) -> Result<()> {
    let config = Config::load(&state.config_path())?;
    let baseline = store::load(&state.baseline_path())?;
    let current = scan_roots(&config)?;
    let changes = compare(&baseline, &current);

    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(());
    }

    for root in &config.monitor.paths {
        match fs::canonicalize(root) {
            Ok(resolved) if &resolved != root => {
                println!("Monitoring: {} -> {}", root.display(), resolved.display())
            }
            _ => println!("Monitoring: {}", root.display()),
        }
    }
    if changes.is_empty() {
        println!("No changes detected.");
    } else {
        for line in change_lines(&baseline, &changes) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn start(state: &StateDir, interval: Option<String>) -> Result<()> {
    let config = Config::load(&state.config_path())?;
    let interval = match interval {
        Some(raw) => parse_interval(&raw)?,
        None => config.interval()?,
    };
    let log = EventLog::new(config.logfile_or(state.log_path()), DEFAULT_MAX_BYTES)?;
    let echo = config.output.verbose;
    let daemon = Arc::new(
        Daemon::new(
            config,
            state.baseline_path(),
            Box::new(PidFile::new(state.pid_path())),
            Arc::new(log),
        )?
        .with_interval(interval),
    );

    daemon.start(std::process::id())?;
    println!(
        "Daemon started (pid {}), scanning every {}s",
        std::process::id(),
        interval.as_secs()
    );

    let reporter = daemon.clone();
    let (task, handle) = spawn_poll_loop(daemon.clone(), interval, move |report| {
        if !echo {
            return;
        }
        if let Some(baseline) = reporter.baseline() {
            for line in change_lines(&baseline, &report.changes) {
                println!("{line}");
            }
        }
        for error in &report.errors {
            println!("Error during scan: {error}");
        }
    });

    let signalled = shutdown_signal().await;
    info!("shutdown requested");
    handle.shutdown();
    if let Err(e) = task.await {
        warn!(error = %e, "poll loop ended abnormally");
    }
    daemon.stop()?;
    signalled?;
    println!("Daemon stopped");
    Ok(())
}

fn stop(state: &StateDir) -> Result<()> {
    let marker = PidFile::new(state.pid_path());
    let pid = match marker.recorded_pid() {
        Some(pid) if marker.is_live() => pid,
        _ => {
            marker.release()?;
            return Err(FimError::NotRunning.into());
        }
    };
    terminate(pid)?;
    println!("Sent stop signal to daemon (pid {pid})");
    Ok(())
}

async fn clean(state: &StateDir) -> Result<()> {
    let marker = PidFile::new(state.pid_path());
    if let Some(pid) = marker.recorded_pid().filter(|_| marker.is_live()) {
        terminate(pid)?;
        println!("Stopping daemon (pid {pid})");
        for _ in 0..50 {
            if !marker.is_live() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if marker.is_live() {
            bail!("daemon (pid {pid}) did not stop; state left in place");
        }
    }

    let root = state.root();
    if !root.exists() {
        println!("Nothing to clean at {}", root.display());
        return Ok(());
    }
    fs::remove_dir_all(root).with_context(|| format!("failed to remove {}", root.display()))?;
    println!("Removed {}", root.display());
    Ok(())
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    let target = libc::pid_t::try_from(pid).context("pid out of range")?;
    // SAFETY: plain signal delivery to a pid read from the liveness marker.
    let rc = unsafe { libc::kill(target, libc::SIGTERM) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("failed to signal pid {pid}"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    bail!("cannot signal pid {pid}: stopping the daemon is only supported on unix")
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
