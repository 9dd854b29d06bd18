use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backoff parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in seconds.
    pub initial_delay_secs: f64,
    /// Growth factor applied per failed attempt (>= 1).
    pub multiplier: f64,
    /// Upper bound on a single delay, in seconds.
    pub max_delay_secs: f64,
    /// Give up once total elapsed time would exceed this many seconds.
    pub timeout_secs: f64,
}

impl RetryConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Reject values the backoff schedule cannot use.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("initial_delay_secs", self.initial_delay_secs),
            ("max_delay_secs", self.max_delay_secs),
            ("timeout_secs", self.timeout_secs),
        ] {
            if !v.is_finite() || v < 0.0 {
                anyhow::bail!("retry.{} must be a non-negative number, got {}", name, v);
            }
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            anyhow::bail!("retry.multiplier must be >= 1, got {}", self.multiplier);
        }
        if self.max_delay_secs < self.initial_delay_secs {
            anyhow::bail!(
                "retry.max_delay_secs ({}) is smaller than retry.initial_delay_secs ({})",
                self.max_delay_secs,
                self.initial_delay_secs
            );
        }
        Ok(())
    }

    pub fn initial_delay(&self) -> Result<Duration> {
        secs("initial_delay_secs", self.initial_delay_secs)
    }

    pub fn max_delay(&self) -> Result<Duration> {
        secs("max_delay_secs", self.max_delay_secs)
    }

    pub fn timeout(&self) -> Result<Duration> {
        secs("timeout_secs", self.timeout_secs)
    }
}

fn secs(name: &str, v: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(v).with_context(|| format!("retry.{} out of range: {}", name, v))
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 1.0,
            multiplier: 2.0,
            max_delay_secs: 16.0,
            timeout_secs: Self::DEFAULT_TIMEOUT.as_secs_f64(),
        }
    }
}

/// Global configuration loaded from `~/.config/retryhttp/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryHttpConfig {
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Timeout for dialing raw connections (hijackable client), in seconds.
    pub dial_timeout_secs: u64,
    /// Connect timeout for the curl transport, in seconds.
    pub connect_timeout_secs: u64,
    /// Optional per-attempt timeout for the curl transport (None = no limit).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RetryHttpConfig {
    fn default() -> Self {
        Self {
            retry: None,
            dial_timeout_secs: 30,
            connect_timeout_secs: 30,
            request_timeout_secs: None,
        }
    }
}

impl RetryHttpConfig {
    /// Retry section, falling back to defaults.
    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("retryhttp")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RetryHttpConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RetryHttpConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<RetryHttpConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: RetryHttpConfig = toml::from_str(&data)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    if let Some(retry) = &cfg.retry {
        retry.validate()?;
    }
    Ok(cfg)
}
