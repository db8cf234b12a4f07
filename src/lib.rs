//! pdfscoop - harvests the PDF documents linked from a single web page.
//!
//! This library provides functionality for:
//! - Rendering the seed page in Chrome and caching the HTML on disk
//! - Extracting PDF links and deriving local file names from them
//! - Letting the browser download each PDF and detecting when it has landed

pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod harvester;
pub mod links;
pub mod page_cache;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use driver::{ChromeSession, PageDriver};
pub use error::{BrowserError, CacheError, ConfigError, DownloadError};
pub use harvester::{HarvestSummary, Harvester};
pub use page_cache::{PageCache, PageSource};
pub use watcher::{DownloadWatcher, Snapshot};
