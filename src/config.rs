//! Configuration management for pdfscoop.
//!
//! Every setting has a built-in default, so a run needs no config file at
//! all. An optional TOML file in the platform config directory (or one given
//! explicitly) overrides individual values.

use crate::error::ConfigError;
use crate::links::is_valid_url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config and cache directories.
const APP_NAME: &str = "pdfscoop";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Largest accepted value for any of the timing settings (one day).
pub const MAX_DURATION_SEC: f64 = 86_400.0;

/// Page scanned for PDF links when nothing else is configured.
pub const DEFAULT_SEED_URL: &str = "https://millcraft.com/safety-data-sheets/";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed page and download timing.
    pub scraping: ScrapingConfig,

    /// Browser launch settings.
    pub browser: BrowserConfig,

    /// File paths.
    pub paths: PathsConfig,
}

/// Seed page and timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Page whose links are harvested.
    pub seed_url: String,

    /// Time given to client-side rendering before the page is captured.
    pub settle_delay_sec: f64,

    /// Upper bound on waiting for a single download to land.
    pub download_timeout_sec: f64,

    /// Interval between download folder checks.
    pub poll_interval_sec: f64,

    /// Enable debug output.
    pub debug: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            seed_url: DEFAULT_SEED_URL.to_string(),
            settle_delay_sec: 30.0,
            download_timeout_sec: 60.0,
            poll_interval_sec: 0.5,
            debug: false,
        }
    }
}

impl ScrapingConfig {
    pub fn settle_delay(&self) -> Duration {
        seconds(self.settle_delay_sec)
    }

    pub fn download_timeout(&self) -> Duration {
        seconds(self.download_timeout_sec)
    }

    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_sec)
    }
}

/// Converts seconds without panicking on values `validate` would reject.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Render without a visible window.
    pub headless: bool,

    /// Explicit Chrome/Chromium binary. Looked up on PATH when unset.
    pub chrome_executable: Option<PathBuf>,

    /// Pass `--no-sandbox` (needed in most containers).
    pub no_sandbox: bool,

    /// Pass `--disable-gpu`.
    pub disable_gpu: bool,

    pub window_width: u32,
    pub window_height: u32,

    /// Additional command line switches, passed through verbatim.
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            no_sandbox: true,
            disable_gpu: true,
            window_width: 1920,
            window_height: 1080,
            extra_args: Vec::new(),
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder that receives the PDFs. Created if missing.
    pub download_directory: PathBuf,

    /// Rendered seed page, written once and reused on later runs.
    pub page_cache_file: PathBuf,

    /// Chrome profile directory. Defaults to the platform cache directory.
    pub profile_directory: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_directory: PathBuf::from("PDFs"),
            page_cache_file: PathBuf::from("safety_data_sheets.html"),
            profile_directory: None,
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// Falls back to built-in defaults when the file does not exist. The file
    /// is never created.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match Self::config_path() {
            Ok(path) => path,
            Err(ConfigError::NoConfigDir) => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Loads configuration from a specific path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_url(&self.scraping.seed_url) {
            return Err(invalid(
                "scraping.seed_url",
                format!("'{}' is not an absolute http(s) URL", self.scraping.seed_url),
            ));
        }

        let timeout = self.scraping.download_timeout_sec;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(invalid("scraping.download_timeout_sec", "must be greater than 0"));
        }
        if timeout > MAX_DURATION_SEC {
            return Err(too_long("scraping.download_timeout_sec"));
        }

        let interval = self.scraping.poll_interval_sec;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(invalid("scraping.poll_interval_sec", "must be greater than 0"));
        }
        if interval > timeout {
            return Err(invalid(
                "scraping.poll_interval_sec",
                "must not exceed scraping.download_timeout_sec",
            ));
        }

        let settle = self.scraping.settle_delay_sec;
        if !settle.is_finite() || settle < 0.0 {
            return Err(invalid("scraping.settle_delay_sec", "must not be negative"));
        }
        if settle > MAX_DURATION_SEC {
            return Err(too_long("scraping.settle_delay_sec"));
        }

        if self.paths.download_directory.as_os_str().is_empty() {
            return Err(invalid("paths.download_directory", "must not be empty"));
        }
        if self.paths.page_cache_file.as_os_str().is_empty() {
            return Err(invalid("paths.page_cache_file", "must not be empty"));
        }

        Ok(())
    }

    /// Returns the effective Chrome profile directory, using config or default.
    pub fn profile_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.paths.profile_directory {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_NAME)
            .join("chrome-profile")
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn too_long(key: &str) -> ConfigError {
    invalid(key, format!("must not exceed {MAX_DURATION_SEC} seconds"))
}
