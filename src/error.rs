//! Error types for pdfscoop.
//!
//! Uses `thiserror` for structured error definitions. Per-URL failures are
//! all `DownloadError` variants so a batch can report them and move on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure while processing a single PDF URL.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The URL is malformed or not absolute
    #[error("Invalid URL: {0}")]
    InvalidInput(String),

    /// The target file is already present and will not be overwritten
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// No completed PDF showed up in the watched folder in time
    #[error("No completed PDF appeared in {} within {:.1}s", .dir.display(), .waited.as_secs_f64())]
    Timeout { dir: PathBuf, waited: Duration },

    /// The browser failed to load the page or start the download
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Snapshotting or moving files failed
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Returns true for failures that are reported as skips rather than errors.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DownloadError::InvalidInput(_) | DownloadError::AlreadyExists(_)
        )
    }
}

impl From<chromiumoxide::error::CdpError> for DownloadError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DownloadError::Navigation(err.to_string())
    }
}

/// Error type for starting or stopping the browser session.
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Browser launch options were rejected
    #[error("Invalid browser configuration: {0}")]
    InvalidConfig(String),

    /// Chrome could not be started or connected to
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(#[from] chromiumoxide::error::CdpError),

    /// Chrome did not close cleanly
    #[error("Failed to close browser: {0}")]
    Shutdown(String),

    /// Failed to prepare the browser profile directory
    #[error("Failed to prepare browser profile: {0}")]
    Profile(#[from] std::io::Error),

    /// Failed to encode browser preferences
    #[error("Failed to write browser preferences: {0}")]
    Preferences(#[from] serde_json::Error),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Error type for the cached seed page.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the cache file failed
    #[error("Page cache I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The browser could not produce the page
    #[error(transparent)]
    Fetch(#[from] DownloadError),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
