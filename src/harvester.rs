//! Download orchestration.
//!
//! Walks the PDF links of the seed page one at a time: validate, refuse to
//! overwrite, snapshot the folder, let the browser download, wait for the
//! file to land and move it to its canonical name. A failing URL is reported
//! and the batch carries on.

use crate::config::Config;
use crate::console::Console;
use crate::driver::PageDriver;
use crate::error::DownloadError;
use crate::links::{derive_filename, extract_pdf_links, is_valid_url, resolve_link};
use crate::page_cache::{PageCache, PageSource};
use crate::watcher::{DownloadWatcher, Snapshot};
use anyhow::{Context, bail};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Tally of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl HarvestSummary {
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }

    fn record(&mut self, outcome: &Result<PathBuf, DownloadError>) {
        match outcome {
            Ok(_) => self.downloaded += 1,
            Err(e) if e.is_skip() => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for HarvestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} skipped, {} failed",
            self.downloaded, self.skipped, self.failed
        )
    }
}

/// Downloads PDFs through a browser session into one folder.
pub struct Harvester<'a> {
    driver: &'a dyn PageDriver,
    console: &'a Console,
    download_dir: PathBuf,
    watcher: DownloadWatcher,
}

impl<'a> Harvester<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        console: &'a Console,
        download_dir: impl Into<PathBuf>,
        watcher: DownloadWatcher,
    ) -> Self {
        Self {
            driver,
            console,
            download_dir: download_dir.into(),
            watcher,
        }
    }

    /// Downloads one absolute PDF URL and returns where it was saved.
    ///
    /// An existing file with the derived name is never replaced.
    ///
    /// The browser names its files itself, so the only link between a URL and
    /// a file is the timing. A download that timed out for an earlier URL but
    /// lands while this one is awaited can be taken for this one and saved
    /// under this URL's name. Other PDFs that appear in the same window are
    /// reported as warnings.
    pub async fn download_pdf(&self, url: &str) -> Result<PathBuf, DownloadError> {
        if !is_valid_url(url) {
            return Err(DownloadError::InvalidInput(url.to_string()));
        }

        let filename = derive_filename(url);
        let target = self.download_dir.join(&filename);
        if target.exists() {
            return Err(DownloadError::AlreadyExists(target));
        }

        self.console.step(&format!("Downloading {filename}"));

        // Must be taken before navigation or a fast download lands in it
        let baseline = Snapshot::capture(&self.download_dir)?;
        self.console
            .debug(&format!("Baseline holds {} entries", baseline.len()));

        self.driver.trigger_download(url).await?;
        let landed = self.watcher.wait_for_pdf(&self.download_dir, &baseline).await?;
        self.console
            .debug(&format!("Browser saved {}", landed.display()));
        self.warn_about_strays(&baseline, &landed);

        if landed != target {
            if target.exists() {
                return Err(DownloadError::AlreadyExists(target));
            }
            std::fs::rename(&landed, &target)?;
        }

        Ok(target)
    }

    /// Downloads every URL in turn, reporting each result.
    pub async fn download_all<I, S>(&self, urls: I) -> HarvestSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = HarvestSummary::default();

        for url in urls {
            let url = url.as_ref();
            let outcome = self.download_pdf(url).await;
            self.report(url, &outcome);
            summary.record(&outcome);
        }

        summary
    }

    /// Extracts the PDF links of a seed page and downloads them.
    ///
    /// Relative links are resolved against `seed_url`.
    pub async fn harvest_page(&self, seed_url: &Url, html: &str) -> HarvestSummary {
        let links = extract_pdf_links(html);
        self.console.info(&format!(
            "Found {} PDF links",
            self.console.count(links.len())
        ));

        let mut urls = Vec::with_capacity(links.len());
        let mut unresolved = 0;
        for href in &links {
            match resolve_link(seed_url, href) {
                Ok(url) => urls.push(url),
                Err(e) => {
                    self.console.skip(&e.to_string());
                    unresolved += 1;
                }
            }
        }

        let mut summary = self.download_all(&urls).await;
        summary.skipped += unresolved;
        summary
    }

    fn warn_about_strays(&self, baseline: &Snapshot, landed: &Path) {
        match stray_downloads(&self.download_dir, baseline, landed) {
            Ok(strays) if !strays.is_empty() => self.console.warning(&format!(
                "Other PDFs appeared during this download: {}",
                strays.join(", ")
            )),
            Ok(_) => {}
            Err(e) => self
                .console
                .debug(&format!("Could not list {}: {e}", self.download_dir.display())),
        }
    }

    fn report(&self, url: &str, outcome: &Result<PathBuf, DownloadError>) {
        match outcome {
            Ok(path) => self
                .console
                .success(&format!("Download complete: {}", path.display())),
            Err(e) if e.is_skip() => self.console.skip(&e.to_string()),
            Err(e) => self
                .console
                .error(&format!("Failed to download {url}: {e}")),
        }
    }
}

/// Completed PDFs new since `baseline` other than `landed`.
fn stray_downloads(
    dir: &Path,
    baseline: &Snapshot,
    landed: &Path,
) -> std::io::Result<Vec<String>> {
    let current = Snapshot::capture(dir)?;
    let landed = landed.file_name().map(|name| name.to_string_lossy());

    Ok(current
        .completed_pdfs_since(baseline)
        .into_iter()
        .filter(|name| landed.as_deref() != Some(*name))
        .map(String::from)
        .collect())
}

/// Runs a full harvest of the configured seed page.
///
/// The download folder must already exist; the browser session is launched
/// against it. The seed page comes from the page cache unless it is missing
/// or `refresh` is set. Errors here concern the seed page and the folder;
/// per-PDF failures only show up in the summary.
pub async fn run(
    config: &Config,
    driver: &dyn PageDriver,
    console: &Console,
    refresh: bool,
) -> crate::error::Result<HarvestSummary> {
    let download_dir = &config.paths.download_directory;
    if !download_dir.is_dir() {
        bail!("Download folder {} does not exist", download_dir.display());
    }

    let seed_url = Url::parse(&config.scraping.seed_url)
        .with_context(|| format!("Invalid seed URL: {}", config.scraping.seed_url))?;

    let cache = PageCache::new(&config.paths.page_cache_file);
    console.step(&format!("Loading seed page {seed_url}"));
    let (html, source) = cache
        .load_or_fetch(driver, seed_url.as_str(), refresh)
        .await
        .context("Failed to load seed page")?;

    match source {
        PageSource::Cache => console.info(&format!(
            "Using cached page {}",
            cache.path().display()
        )),
        PageSource::Network => console.success(&format!(
            "Page {} saved to {}",
            seed_url,
            cache.path().display()
        )),
    }

    let harvester = Harvester::new(
        driver,
        console,
        download_dir.clone(),
        DownloadWatcher::from_config(&config.scraping),
    );
    Ok(harvester.harvest_page(&seed_url, &html).await)
}
