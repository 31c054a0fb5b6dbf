use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::aggregate::check_series_shape;
use crate::error::ConfigError;

pub const DEFAULT_MAX_LINES: usize = 50_000;
pub const DEFAULT_BUCKET_MINUTES: u32 = 5;
pub const DEFAULT_WINDOW_HOURS: f64 = 2.0;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Read-only settings, built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub log_path: PathBuf,
    pub max_lines: usize,
    pub bucket_minutes: u32,
    pub window_hours: f64,
    pub port: u16,
    pub bind_addr: IpAddr,
    pub poll_interval: Duration,
}

/// Optional overlay read from `kernel.yaml`; every field may be omitted.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub log_path: Option<String>,
    pub max_lines: Option<usize>,
    pub bucket_minutes: Option<u32>,
    pub window_hours: Option<f64>,
    pub port: Option<u16>,
    pub bind_addr: Option<IpAddr>,
    pub poll_interval_ms: Option<u64>,
}

impl DashboardConfig {
    /// Default settings reading `log_path`. Mostly for tests and tools.
    pub fn for_log<P: Into<PathBuf>>(log_path: P) -> Self {
        Self {
            log_path: log_path.into(),
            max_lines: DEFAULT_MAX_LINES,
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
            window_hours: DEFAULT_WINDOW_HOURS,
            port: DEFAULT_PORT,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Merges defaults, the file overlay and then environment variables
    /// (highest priority). `env` is a lookup so tests do not touch the
    /// process environment.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_path = match env("LOG_PATH")
            .filter(|raw| !raw.trim().is_empty())
            .or(file.log_path)
        {
            Some(raw) => expand_home(&raw)?,
            None => default_log_path()?,
        };

        let cfg = Self {
            log_path,
            max_lines: env_parse(&env, "MAX_LINES")?
                .or(file.max_lines)
                .unwrap_or(DEFAULT_MAX_LINES),
            bucket_minutes: env_parse(&env, "BUCKET_MINUTES")?
                .or(file.bucket_minutes)
                .unwrap_or(DEFAULT_BUCKET_MINUTES),
            window_hours: env_parse(&env, "WINDOW_HOURS")?
                .or(file.window_hours)
                .unwrap_or(DEFAULT_WINDOW_HOURS),
            port: env_parse(&env, "PORT")?.or(file.port).unwrap_or(DEFAULT_PORT),
            bind_addr: env_parse(&env, "BIND_ADDR")?
                .or(file.bind_addr)
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            poll_interval: Duration::from_millis(
                env_parse(&env, "POLL_INTERVAL_MS")?
                    .or(file.poll_interval_ms)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lines == 0 {
            return Err(ConfigError::OutOfRange { key: "MAX_LINES", reason: "must be at least 1" });
        }
        if self.bucket_minutes == 0 {
            return Err(ConfigError::OutOfRange { key: "BUCKET_MINUTES", reason: "must be at least 1" });
        }
        if !(self.window_hours.is_finite() && self.window_hours > 0.0) {
            return Err(ConfigError::OutOfRange { key: "WINDOW_HOURS", reason: "must be a positive number" });
        }
        if check_series_shape(self.window_hours, self.bucket_minutes).is_err() {
            return Err(ConfigError::OutOfRange {
                key: "WINDOW_HOURS",
                reason: "must be at most one year and span at most 100000 buckets",
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::OutOfRange { key: "POLL_INTERVAL_MS", reason: "must be at least 1" });
        }
        Ok(())
    }
}

/// Loads the YAML overlay (path from `NEXUS_KERNEL_CONFIG`, default
/// `kernel.yaml`) and applies the process environment on top.
pub async fn load_config() -> Result<DashboardConfig, ConfigError> {
    let path = std::env::var("NEXUS_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let file = load_file_config(Path::new(&path)).await;
    DashboardConfig::resolve(file, |key| std::env::var(key).ok())
}

/// A missing, empty or invalid file falls back to an empty overlay.
pub async fn load_file_config(path: &Path) -> FileConfig {
    if !path.exists() {
        return FileConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
            return FileConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return FileConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "config file invalid, using defaults");
        FileConfig::default()
    })
}

fn env_parse<T, F>(env: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn default_log_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".nexus").join("logs").join("nexus.log"))
}

fn expand_home(raw: &str) -> Result<PathBuf, ConfigError> {
    match raw.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(rest)),
        None => Ok(PathBuf::from(raw)),
    }
}
