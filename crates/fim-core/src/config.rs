use crate::error::{FimError, Result};
use crate::exclusion::ExclusionSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

const DEFAULT_CONFIG: &str = r#"# File integrity monitor configuration

[monitor]
# Required: paths to monitor
paths = ["/etc", "/usr/bin"]

# Optional: glob patterns matched against full paths; matching
# directories are not descended into
exclude = ["/tmp", "/var/log", "/proc"]

[logging]
# Optional: change log location (defaults to fim.log in the state directory)
# logfile = "/var/log/fim.log"

[output]
verbose = true

[daemon]
# Scan interval for `fim start`: <n>s, <n>m, <n>h or plain seconds
interval = "5m"
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub paths: Vec<PathBuf>,
    pub exclude: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            paths: vec![],
            exclude: vec!["/tmp".into(), "/var/log".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub logfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { verbose: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonConfig {
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub daemon: DaemonConfig,
}

impl Config {
    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FimError::Config(format!(
                "configuration file not found at {}; run `fim init` to create one",
                path.display()
            )));
        }
        let text = fs::read_to_string(path).map_err(|e| FimError::io(path, e))?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| FimError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the commented starter configuration.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FimError::io(parent, e))?;
        }
        fs::write(path, DEFAULT_CONFIG).map_err(|e| FimError::io(path, e))
    }

    /// Normalise monitored paths and check that everything referenced exists.
    pub fn validate(&mut self) -> Result<()> {
        self.require_paths()?;

        let mut seen = HashSet::new();
        let mut paths = Vec::with_capacity(self.monitor.paths.len());
        for raw in &self.monitor.paths {
            let trimmed = trim_trailing_slashes(raw);
            if !trimmed.exists() {
                return Err(FimError::Config(format!(
                    "monitor path does not exist: {}",
                    raw.display()
                )));
            }
            if seen.insert(trimmed.clone()) {
                paths.push(trimmed);
            }
        }
        self.monitor.paths = paths;

        ExclusionSet::new(&self.monitor.exclude)?;
        self.interval()?;

        if let Some(logfile) = &self.logging.logfile {
            if let Some(dir) = logfile.parent().filter(|d| !d.as_os_str().is_empty()) {
                if !dir.exists() {
                    return Err(FimError::Config(format!(
                        "log directory does not exist: {}",
                        dir.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fails when no monitored path is configured.
    pub fn require_paths(&self) -> Result<()> {
        if self.monitor.paths.is_empty() {
            return Err(FimError::Config(
                "no monitor paths specified; add `paths` to the [monitor] section".into(),
            ));
        }
        Ok(())
    }

    pub fn exclusions(&self) -> Result<ExclusionSet> {
        ExclusionSet::new(&self.monitor.exclude)
    }

    /// Configured daemon interval, or the five minute default.
    pub fn interval(&self) -> Result<Duration> {
        match &self.daemon.interval {
            Some(raw) => parse_interval(raw),
            None => Ok(DEFAULT_INTERVAL),
        }
    }

    /// Log file location, falling back to `default` in the state directory.
    pub fn logfile_or(&self, default: PathBuf) -> PathBuf {
        self.logging.logfile.clone().unwrap_or(default)
    }
}

/// Parse `<n>s`, `<n>m`, `<n>h` or a bare number of seconds.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || FimError::Config(format!("invalid interval {raw:?}; use e.g. 30s, 5m or 1h"));
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => Some(value),
        "m" => value.checked_mul(60),
        "h" => value.checked_mul(60 * 60),
        _ => None,
    }
    .ok_or_else(invalid)?;
    if secs == 0 {
        return Err(FimError::Config("interval must be greater than zero".into()));
    }
    Ok(Duration::from_secs(secs))
}

fn trim_trailing_slashes(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() && text.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    }
}
