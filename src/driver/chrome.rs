//! Chrome/Chromium session driven over the DevTools protocol.
//!
//! Downloads are steered into the target folder twice over: through the
//! profile's `Preferences` file (which also turns off the built-in PDF
//! viewer and the save prompt) and through `Browser.setDownloadBehavior`.

use super::{PageDriver, settle};
use crate::config::{BrowserConfig, Config};
use crate::console::Console;
use crate::error::{BrowserError, DownloadError};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
use futures::StreamExt;
use serde_json::{Map, Value, json};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Browser binaries looked up on PATH when no executable is configured.
const CHROME_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Error text Chrome reports when a navigation turned into a download.
const DOWNLOAD_ABORT: &str = "net::ERR_ABORTED";

/// One running browser with a single tab.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    settle_delay: Duration,
}

impl ChromeSession {
    /// Launches Chrome with downloads going to `download_dir`.
    ///
    /// The folder must already exist.
    pub async fn launch(
        config: &Config,
        download_dir: &Path,
        console: &Console,
    ) -> Result<Self, BrowserError> {
        let download_dir = std::fs::canonicalize(download_dir)?;
        let profile_dir = config.profile_dir();
        write_preferences(&profile_dir, &download_dir, console)?;

        let launch = launch_config(&config.browser, &profile_dir)?;
        let (browser, mut handler) = Browser::launch(launch).await?;

        // The handler stream must be polled for any command to complete
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        match open_download_tab(&browser, &download_dir).await {
            Ok(page) => Ok(Self {
                browser,
                page,
                handler,
                settle_delay: config.scraping.settle_delay(),
            }),
            Err(err) => {
                let _ = shutdown(browser, handler).await;
                Err(err)
            }
        }
    }

    /// Closes the browser and stops the protocol handler.
    pub async fn close(self) -> Result<(), BrowserError> {
        let Self {
            browser, handler, ..
        } = self;
        shutdown(browser, handler).await
    }
}

async fn open_download_tab(browser: &Browser, download_dir: &Path) -> Result<Page, BrowserError> {
    let behavior = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(download_dir.to_string_lossy())
        .build()
        .map_err(BrowserError::InvalidConfig)?;
    browser.execute(behavior).await?;

    Ok(browser.new_page("about:blank").await?)
}

async fn shutdown(mut browser: Browser, handler: JoinHandle<()>) -> Result<(), BrowserError> {
    let closed = browser.close().await;
    let _ = browser.wait().await;
    handler.abort();
    let _ = handler.await;
    closed.map(|_| ()).map_err(|e| BrowserError::Shutdown(e.to_string()))
}

fn launch_config(settings: &BrowserConfig, profile_dir: &Path) -> Result<LaunchConfig, BrowserError> {
    let mut builder = LaunchConfig::builder()
        .user_data_dir(profile_dir)
        .window_size(settings.window_width, settings.window_height)
        .arg("--disable-dev-shm-usage");

    if !settings.headless {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        // Also adds --disable-setuid-sandbox
        builder = builder.no_sandbox();
    }
    if settings.disable_gpu {
        builder = builder.arg("--disable-gpu");
    }
    for arg in &settings.extra_args {
        builder = builder.arg(arg);
    }
    if let Some(executable) = find_chrome(settings) {
        builder = builder.chrome_executable(executable);
    }

    builder.build().map_err(BrowserError::InvalidConfig)
}

/// Picks the configured executable, else the first known binary on PATH.
///
/// Returns `None` to let chromiumoxide run its own discovery.
fn find_chrome(settings: &BrowserConfig) -> Option<PathBuf> {
    settings
        .chrome_executable
        .clone()
        .or_else(|| CHROME_NAMES.iter().find_map(|name| which::which(name).ok()))
}

/// Merges the download preferences into `<profile>/Default/Preferences`,
/// keeping whatever else an earlier run left there.
///
/// A file that is not valid JSON is replaced. Any read error other than a
/// missing file is returned.
fn write_preferences(
    profile_dir: &Path,
    download_dir: &Path,
    console: &Console,
) -> Result<(), BrowserError> {
    let default_profile = profile_dir.join("Default");
    std::fs::create_dir_all(&default_profile)?;
    let path = default_profile.join("Preferences");

    let mut prefs = match std::fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            console.debug(&format!("Replacing unreadable {}: {e}", path.display()));
            json!({})
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => json!({}),
        Err(e) => return Err(e.into()),
    };
    apply_download_preferences(&mut prefs, &download_dir.to_string_lossy());

    std::fs::write(&path, serde_json::to_vec_pretty(&prefs)?)?;
    Ok(())
}

fn apply_download_preferences(prefs: &mut Value, download_dir: &str) {
    set_pref(prefs, "download.default_directory", json!(download_dir));
    set_pref(prefs, "download.prompt_for_download", json!(false));
    set_pref(prefs, "download.directory_upgrade", json!(true));
    set_pref(prefs, "plugins.always_open_pdf_externally", json!(true));
}

/// Sets a dotted preference key, creating intermediate objects.
fn set_pref(prefs: &mut Value, key: &str, value: Value) {
    if !prefs.is_object() {
        *prefs = Value::Object(Map::new());
    }
    let Value::Object(map) = prefs else {
        return;
    };

    match key.split_once('.') {
        Some((head, rest)) => set_pref(map.entry(head).or_insert(Value::Null), rest, value),
        None => {
            map.insert(key.to_string(), value);
        }
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    fn name(&self) -> &'static str {
        "Chrome"
    }

    async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
        self.page.goto(url).await?;
        settle(self.settle_delay).await;
        Ok(self.page.content().await?)
    }

    async fn trigger_download(&self, url: &str) -> Result<(), DownloadError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(DownloadError::InvalidInput)?;

        let response = self.page.execute(params).await?;
        match response.result.error_text.as_deref() {
            None | Some(DOWNLOAD_ABORT) => Ok(()),
            Some(reason) => Err(DownloadError::Navigation(format!("{url}: {reason}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_preferences() {
        let mut prefs = json!({});
        apply_download_preferences(&mut prefs, "/data/PDFs");

        assert_eq!(prefs["download"]["default_directory"], "/data/PDFs");
        assert_eq!(prefs["download"]["prompt_for_download"], false);
        assert_eq!(prefs["plugins"]["always_open_pdf_externally"], true);
    }

    #[test]
    fn test_preferences_keep_existing_keys() {
        let mut prefs = json!({
            "download": { "default_directory": "/old", "extensions_to_open": "" },
            "profile": { "exit_type": "Normal" },
            "plugins": "corrupt",
        });
        apply_download_preferences(&mut prefs, "/new");

        assert_eq!(prefs["download"]["default_directory"], "/new");
        assert_eq!(prefs["download"]["extensions_to_open"], "");
        assert_eq!(prefs["profile"]["exit_type"], "Normal");
        assert_eq!(prefs["plugins"]["always_open_pdf_externally"], true);
    }

    #[test]
    fn test_write_preferences_file() {
        let profile = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();

        let console = Console::with_colors(false);

        write_preferences(profile.path(), downloads.path(), &console).unwrap();
        write_preferences(profile.path(), downloads.path(), &console).unwrap();

        let written = std::fs::read(profile.path().join("Default").join("Preferences")).unwrap();
        let prefs: Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(
            prefs["download"]["default_directory"],
            downloads.path().to_string_lossy().as_ref()
        );
    }

    #[test]
    fn test_corrupt_preferences_are_replaced() {
        let profile = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();
        let path = profile.path().join("Default").join("Preferences");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        write_preferences(profile.path(), downloads.path(), &Console::with_colors(false)).unwrap();

        let prefs: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(prefs["download"]["prompt_for_download"], false);
    }

    #[test]
    fn test_unreadable_preferences_are_an_error() {
        let profile = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();
        // A directory in place of the file cannot be read
        std::fs::create_dir_all(profile.path().join("Default").join("Preferences")).unwrap();

        let result =
            write_preferences(profile.path(), downloads.path(), &Console::with_colors(false));

        assert!(matches!(result, Err(BrowserError::Profile(_))));
    }

    #[test]
    fn test_configured_executable_wins() {
        let settings = BrowserConfig {
            chrome_executable: Some(PathBuf::from("/opt/chrome/chrome")),
            ..BrowserConfig::default()
        };
        assert_eq!(find_chrome(&settings), Some(PathBuf::from("/opt/chrome/chrome")));
    }
}
