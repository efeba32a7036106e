//! Same-site link extraction for the contact crawler
//!
//! # Link rules
//!
//! **Followed:**
//! - `<a href>` pointing at the same host (a leading `www.` is ignored)
//! - relative links, resolved against the page URL
//! - paths without an extension or with a page-like one (`.html`, `.php`, ...)
//!
//! **Skipped:**
//! - fragment-only anchors, `javascript:`, `mailto:`, `tel:` and messenger schemes
//! - media files and other downloads
//!
//! Fragments are stripped, and a URL whose `http`/`https` twin was already
//! seen counts as a duplicate.

use scraper::{Html, Selector};
use url::Url;

/// Extensions treated as web pages
pub const HTML_EXTENSIONS: [&str; 8] = ["htm", "html", "asp", "aspx", "cgi", "php", "pl", "py"];

const SKIPPED_PREFIXES: [&str; 8] = [
    "#",
    "javascript:",
    "mailto:",
    "tel:",
    "data:",
    "viber:",
    "whatsapp:",
    "skype:",
];

/// Collects distinct same-site page links from `html`
///
/// # Arguments
///
/// * `html` - Page markup
/// * `page_url` - URL the markup was fetched from
pub fn internal_links(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(link) = resolve_internal(href, page_url) {
            if !contains_either_scheme(&links, &link) {
                links.push(link);
            }
        }
    }

    links
}

/// Resolves `href` against `page_url`, keeping it only if it is a same-site page
fn resolve_internal(href: &str, page_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
        return None;
    }

    let mut url = if lowered.starts_with("www.") {
        Url::parse(&format!("https://{}", href)).ok()?
    } else {
        page_url.join(href).ok()?
    };

    if !matches!(url.scheme(), "http" | "https") || !same_site(&url, page_url) {
        return None;
    }

    if let Some(ext) = extension(url.path()) {
        if !HTML_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return None;
        }
    }

    url.set_fragment(None);
    Some(url.to_string())
}

fn same_site(url: &Url, page_url: &Url) -> bool {
    match (url.host_str(), page_url.host_str()) {
        (Some(a), Some(b)) => strip_www(a).eq_ignore_ascii_case(strip_www(b)),
        _ => false,
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

/// `url` with `http` and `https` swapped
pub fn swap_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}

/// Whether `url` or its scheme twin is already in `seen`
pub fn contains_either_scheme(seen: &[String], url: &str) -> bool {
    let twin = swap_scheme(url);
    seen.iter().any(|s| s == url || *s == twin)
}
