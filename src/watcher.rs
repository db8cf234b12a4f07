//! Detection of browser downloads landing in a folder.
//!
//! The browser picks its own file names and writes through a temporary
//! `.crdownload` file, so completion is detected by diffing the folder
//! against a snapshot taken before the download was triggered.

use crate::config::ScrapingConfig;
use crate::error::DownloadError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Suffixes browsers use for downloads that are still being written.
const PARTIAL_MARKERS: &[&str] = &[".crdownload", ".part", ".tmp", ".download"];

/// File names present in a folder at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    names: HashSet<String>,
}

impl Snapshot {
    /// Lists the entries of `dir`.
    pub fn capture(dir: &Path) -> std::io::Result<Self> {
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in `self` that are absent from `baseline`, sorted.
    pub fn added_since<'a>(&'a self, baseline: &'a Snapshot) -> Vec<&'a str> {
        let mut added: Vec<&str> = self
            .names
            .difference(&baseline.names)
            .map(String::as_str)
            .collect();
        added.sort_unstable();
        added
    }

    /// Completed PDFs in `self` that are absent from `baseline`, sorted.
    pub fn completed_pdfs_since<'a>(&'a self, baseline: &'a Snapshot) -> Vec<&'a str> {
        self.added_since(baseline)
            .into_iter()
            .filter(|name| is_completed_pdf(name))
            .collect()
    }
}

/// Returns true for a finished PDF, false for anything else including
/// in-progress downloads.
pub fn is_completed_pdf(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".pdf") && !PARTIAL_MARKERS.iter().any(|marker| lower.ends_with(marker))
}

/// Polls a folder until a new completed PDF shows up or the deadline passes.
#[derive(Debug, Clone, Copy)]
pub struct DownloadWatcher {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for DownloadWatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_millis(500))
    }
}

impl DownloadWatcher {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(config: &ScrapingConfig) -> Self {
        Self::new(config.download_timeout(), config.poll_interval())
    }

    /// Waits for a file that is new relative to `baseline` and passes
    /// [`is_completed_pdf`], returning its full path.
    ///
    /// `baseline` must have been captured before the download was started,
    /// otherwise a fast download could end up in the baseline and be missed.
    pub async fn wait_for_pdf(
        &self,
        dir: &Path,
        baseline: &Snapshot,
    ) -> Result<PathBuf, DownloadError> {
        let started = Instant::now();
        // None when the timeout reaches past the clock's range
        let deadline = started.checked_add(self.timeout);

        loop {
            if let Some(path) = find_completed_pdf(dir, baseline)? {
                return Ok(path);
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(DownloadError::Timeout {
                        dir: dir.to_path_buf(),
                        waited: now - started,
                    });
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };

            tokio::time::sleep(pause).await;
        }
    }
}

fn find_completed_pdf(dir: &Path, baseline: &Snapshot) -> std::io::Result<Option<PathBuf>> {
    let current = Snapshot::capture(dir)?;

    let found = current
        .completed_pdfs_since(baseline)
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file());

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_completed_pdf_names() {
        assert!(is_completed_pdf("x.pdf"));
        assert!(is_completed_pdf("Report (1).PDF"));
        assert!(!is_completed_pdf("x.pdf.crdownload"));
        assert!(!is_completed_pdf("x.pdf.part"));
        assert!(!is_completed_pdf("x.png"));
        assert!(!is_completed_pdf("Unconfirmed 123.crdownload"));
    }

    #[test]
    fn test_snapshot_diff() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.pdf"), b"old").unwrap();
        let baseline = Snapshot::capture(dir.path()).unwrap();
        assert_eq!(baseline.len(), 1);
        assert!(baseline.contains("old.pdf"));

        fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        fs::write(dir.path().join("c.pdf.crdownload"), b"c").unwrap();
        let current = Snapshot::capture(dir.path()).unwrap();
        assert_eq!(
            current.added_since(&baseline),
            vec!["a.pdf", "b.pdf", "c.pdf.crdownload"]
        );
        assert_eq!(current.completed_pdfs_since(&baseline), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().to_path_buf();

        let browser = tokio::spawn({
            let dir = watched.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                fs::write(dir.join("late.pdf"), b"%PDF-1.4").unwrap();
            }
        });

        let watcher = DownloadWatcher::new(Duration::MAX, Duration::from_millis(500));
        let found = watcher
            .wait_for_pdf(&watched, &Snapshot::default())
            .await
            .unwrap();

        assert_eq!(found, watched.join("late.pdf"));
        browser.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_through_partial_download() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().to_path_buf();
        let baseline = Snapshot::default();

        let browser = tokio::spawn({
            let dir = watched.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                fs::write(dir.join("x.pdf.crdownload"), b"%PDF-1.4 partial").unwrap();
                tokio::time::sleep(Duration::from_secs(1)).await;
                fs::rename(dir.join("x.pdf.crdownload"), dir.join("x.pdf")).unwrap();
            }
        });

        let started = Instant::now();
        let watcher = DownloadWatcher::new(Duration::from_secs(5), Duration::from_millis(500));
        let found = watcher.wait_for_pdf(&watched, &baseline).await.unwrap();

        assert_eq!(found, watched.join("x.pdf"));
        assert!(started.elapsed() >= Duration::from_secs(2));
        browser.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_nothing_arrives() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DownloadWatcher::new(Duration::from_secs(1), Duration::from_millis(500));

        let started = Instant::now();
        let result = watcher.wait_for_pdf(dir.path(), &Snapshot::default()).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_baseline_and_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.pdf"), b"old").unwrap();
        let baseline = Snapshot::capture(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        fs::write(dir.path().join("y.pdf.crdownload"), b"partial").unwrap();

        let watcher = DownloadWatcher::new(Duration::from_secs(2), Duration::from_millis(500));
        let result = watcher.wait_for_pdf(dir.path(), &baseline).await;
        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DownloadWatcher::default();
        let result = watcher
            .wait_for_pdf(&dir.path().join("gone"), &Snapshot::default())
            .await;
        assert!(matches!(result, Err(DownloadError::Io(_))));
    }
}
