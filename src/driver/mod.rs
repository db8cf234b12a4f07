//! Browser driver abstraction.
//!
//! The harvester talks to the browser only through [`PageDriver`], so the
//! download flow can run against a real Chrome session or a test double.

mod chrome;

pub use chrome::ChromeSession;

use crate::error::DownloadError;
use async_trait::async_trait;
use std::time::Duration;

/// A browser session that can render pages and start downloads.
///
/// Implementations hold navigation state, so calls on one session must not
/// overlap.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Returns the human-readable name of this driver.
    fn name(&self) -> &'static str;

    /// Navigates to `url`, lets client-side rendering settle and returns the
    /// rendered document.
    async fn fetch(&self, url: &str) -> Result<String, DownloadError>;

    /// Navigates to `url` so the browser saves the response into its
    /// download folder. Returns once navigation has been issued; completion is
    /// observed on disk.
    async fn trigger_download(&self, url: &str) -> Result<(), DownloadError>;
}

/// Waits for client-side rendering to finish.
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
