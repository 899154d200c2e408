use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{parse_refresh_rate, GlobalArgs};

const APP_DIR: &str = "analytics-dashboard";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    pub anon_key: Option<String>,
    /// Table holding the widget order row
    pub preferences_table: String,
    /// Key of the widget order row
    pub order_key: i64,
    /// How often change feeds poll their table
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            preferences_table: "chart_preferences".to_string(),
            order_key: 1,
            poll_interval_ms: 2000,
            request_timeout_ms: 10_000,
        }
    }
}

impl BackendConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Redraw interval in seconds
    pub refresh: f64,
    /// IANA zone used for chart date labels
    pub timezone: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh: 0.25,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub debug: bool,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load from `explicit`, or from the default location if a file exists
    /// there, or fall back to defaults.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let path = match explicit {
            Some(raw) => {
                let path = PathBuf::from(shellexpand::tilde(raw).into_owned());
                if !path.exists() {
                    anyhow::bail!("Config file not found at: {}", path.display());
                }
                Some(path)
            }
            None => Self::default_path().filter(|p| p.exists()),
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Command-line and environment values win over the file.
    pub fn apply_overrides(&mut self, args: &GlobalArgs) {
        if let Some(url) = &args.url {
            self.backend.url = Some(url.clone());
        }
        if let Some(key) = &args.anon_key {
            self.backend.anon_key = Some(key.clone());
        }
        if args.debug {
            self.logging.debug = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        parse_refresh_rate(&self.dashboard.refresh.to_string()).map_err(anyhow::Error::msg)?;
        self.timezone()?;
        if self.backend.poll_interval_ms == 0 {
            anyhow::bail!("backend.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.dashboard
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone {:?}: {}", self.dashboard.timezone, e))
    }

    pub fn log_directory(&self) -> PathBuf {
        match &self.logging.directory {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => dirs::data_local_dir()
                .map(|dir| dir.join(APP_DIR).join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}
