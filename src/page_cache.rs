//! On-disk copy of the rendered seed page.
//!
//! Rendering the seed page costs a full browser load plus the settle delay,
//! so the HTML is saved after the first fetch and reused afterwards.

use crate::driver::PageDriver;
use crate::error::CacheError;
use std::path::{Path, PathBuf};

/// Where the page text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Cache,
    Network,
}

/// The cached HTML file for one seed page.
#[derive(Debug, Clone)]
pub struct PageCache {
    path: PathBuf,
}

impl PageCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached page, or `None` if nothing has been cached yet.
    pub async fn read(&self) -> Result<Option<String>, CacheError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(html) => Ok(Some(html)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Replaces the cached page.
    pub async fn write(&self, html: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        tokio::fs::write(&self.path, html)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Returns the cached page, fetching and caching it first when absent or
    /// when `refresh` is set.
    ///
    /// Nothing is written if the fetch fails.
    pub async fn load_or_fetch(
        &self,
        driver: &dyn PageDriver,
        url: &str,
        refresh: bool,
    ) -> Result<(String, PageSource), CacheError> {
        if !refresh && let Some(html) = self.read().await? {
            return Ok((html, PageSource::Cache));
        }

        let html = driver.fetch(url).await?;
        self.write(&html).await?;
        Ok((html, PageSource::Network))
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDriver {
        html: &'static str,
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingDriver {
        fn new(html: &'static str) -> Self {
            Self {
                html,
                fetches: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PageDriver for CountingDriver {
        fn name(&self) -> &'static str {
            "Counting"
        }

        async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DownloadError::Navigation(format!("{url}: net::ERR_NAME_NOT_RESOLVED")));
            }
            Ok(self.html.to_string())
        }

        async fn trigger_download(&self, _url: &str) -> Result<(), DownloadError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetches_once_then_reads_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path().join("seed.html"));
        let driver = CountingDriver::new("<html>seed</html>");

        let (html, source) = cache
            .load_or_fetch(&driver, "https://x.com/", false)
            .await
            .unwrap();
        assert_eq!(html, "<html>seed</html>");
        assert_eq!(source, PageSource::Network);

        let (html, source) = cache
            .load_or_fetch(&driver, "https://x.com/", false)
            .await
            .unwrap();
        assert_eq!(html, "<html>seed</html>");
        assert_eq!(source, PageSource::Cache);
        assert_eq!(driver.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path().join("nested").join("seed.html"));
        cache.write("<html>stale</html>").await.unwrap();

        let driver = CountingDriver::new("<html>fresh</html>");
        let (html, source) = cache
            .load_or_fetch(&driver, "https://x.com/", true)
            .await
            .unwrap();

        assert_eq!(html, "<html>fresh</html>");
        assert_eq!(source, PageSource::Network);
        assert_eq!(cache.read().await.unwrap().as_deref(), Some("<html>fresh</html>"));
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path().join("seed.html"));
        let driver = CountingDriver {
            fail: true,
            ..CountingDriver::new("")
        };

        let result = cache.load_or_fetch(&driver, "https://x.com/", false).await;
        assert!(matches!(result, Err(CacheError::Fetch(DownloadError::Navigation(_)))));
        assert!(!cache.path().exists());
    }
}
