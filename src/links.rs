//! URL checks, PDF link extraction and filename derivation.

use crate::error::DownloadError;
use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use url::{Host, Url};

/// Name used when a URL path has no final segment.
pub const FALLBACK_FILENAME: &str = "downloaded.pdf";

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid ANCHOR_SELECTOR"));

/// Checks that a string is an absolute http(s) URL with a usable host.
///
/// Surrounding whitespace is rejected rather than trimmed. Domain hosts must
/// contain a dot (or be `localhost`) and may not have empty labels.
pub fn is_valid_url(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.trim() != candidate {
        return false;
    }

    let Ok(url) = Url::parse(candidate) else {
        return false;
    };

    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    match url.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        Some(Host::Domain(domain)) => {
            domain == "localhost"
                || (domain.contains('.') && domain.split('.').all(|label| !label.is_empty()))
        }
        None => false,
    }
}

/// Derives the local file name for a URL.
///
/// Uses the last segment of the percent-decoded path, lower-cased. Query and
/// fragment never contribute. Strings that are not absolute URLs are treated
/// as a bare path.
pub fn derive_filename(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let decoded = percent_decode_str(&path).decode_utf8_lossy();
    let name = decoded.rsplit('/').next().unwrap_or_default().to_lowercase();

    if name.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        name
    }
}

/// Collects the distinct `href` values that point at PDF documents.
///
/// An href qualifies when its percent-decoded form ends in `.pdf`, ignoring
/// case. The raw (undecoded) value is returned and relative links are left
/// unresolved. The result has set semantics: callers must not rely on its
/// iteration order.
pub fn extract_pdf_links(html: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|elem| elem.value().attr("href"))
        .filter(|href| is_pdf_href(href))
        .map(str::to_string)
        .collect()
}

fn is_pdf_href(href: &str) -> bool {
    percent_decode_str(href)
        .decode_utf8_lossy()
        .to_lowercase()
        .ends_with(".pdf")
}

/// Resolves an href found on `base` into an absolute URL string.
pub fn resolve_link(base: &Url, href: &str) -> Result<String, DownloadError> {
    base.join(href.trim())
        .map(String::from)
        .map_err(|e| DownloadError::InvalidInput(format!("{href} ({e})")))
}
