//! Parsers for search-result markup and API payloads
//!
//! This module contains:
//! - `PageParser`: contract the scrape loop uses to read pages and payloads
//! - `SiteParser`: CSS-selector (HTML) and serde (JSON) implementation
//! - `OfferDetails`: structured fields of an item-detail payload
//! - `CategoryTree`: flat category lookup with breadcrumb resolution

mod categories;
mod offer;
mod site;

pub use categories::{Category, CategoryError, CategoryTree, BREADCRUMB_SEPARATOR};
pub use offer::{format_date_time, OfferDetails, Photo, NOT_AVAILABLE};
pub use site::SiteParser;

#[cfg(test)]
pub(crate) use offer::sample_offer_json;

use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading markup or payloads
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid CSS selector '{0}'")]
    Selector(String),

    #[error("Invalid page count '{0}'")]
    InvalidPageCount(String),

    #[error("Invalid item id '{0}'")]
    InvalidItemId(String),

    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("API reported an error: {0}")]
    Api(String),

    #[error("Unexpected JSON shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Reads search-result pages and API payloads
pub trait PageParser: Send {
    /// Number of result pages; a page without a last-page marker has one
    fn parse_page_count(&self, html: &str) -> Result<u32, ParseError>;

    /// Item ids on a result page, in page order
    fn parse_item_ids(&self, html: &str) -> Result<Vec<u64>, ParseError>;

    /// Absolute URL of any item linked from a landing page
    fn parse_landing_item_url(&self, html: &str, base_url: &str) -> Result<String, ParseError>;

    /// Structured fields of an item-detail payload
    fn parse_offer(&self, json: &Value) -> Result<OfferDetails, ParseError>;

    /// Raw phone strings from a phones payload
    fn parse_phones(&self, json: &Value) -> Result<Vec<String>, ParseError>;
}

/// Returns the payload's `error` field if it signals a failure
pub(crate) fn api_error(json: &Value) -> Option<String> {
    match json.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(message)) if message.is_empty() => None,
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_detection() {
        assert_eq!(api_error(&json!({"data": {}})), None);
        assert_eq!(api_error(&json!({"error": null})), None);
        assert_eq!(api_error(&json!({"error": false})), None);
        assert_eq!(api_error(&json!({"error": "denied"})), Some("denied".to_string()));
        assert!(api_error(&json!({"error": {"code": 7}})).unwrap().contains("7"));
    }
}
