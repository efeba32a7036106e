//! Ad-Harvest: a resumable classified-ad scraper
//!
//! This crate walks marketplace search results page by page, pulls item
//! details and seller phones through tiered API access (personal and
//! anonymous tokens), and persists both its cursor and its results after
//! every page so an interrupted run picks up where it stopped.

pub mod auth;
pub mod config;
pub mod contacts;
pub mod http;
pub mod output;
pub mod parser;
pub mod scraper;
pub mod state;

use thiserror::Error;

/// Marker logged on every fatal abort
pub const FATAL_ERROR: &str = "Fatal error. Shutting down.";

/// Main error type for Ad-Harvest operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] http::HttpError),

    #[error("Request to {url} failed (status: {status_code:?})")]
    RequestFailed {
        url: String,
        status_code: Option<u16>,
    },

    #[error("Session error: {0}")]
    Session(#[from] auth::SessionError),

    #[error("Parse error: {0}")]
    Parse(#[from] parser::ParseError),

    #[error("Category error: {0}")]
    Category(#[from] parser::CategoryError),

    #[error("Retry budget exhausted for item {item_id} ({tier:?} tier): {reason}")]
    RetryBudgetExhausted {
        item_id: u64,
        tier: auth::TokenKind,
        reason: String,
    },

    #[error("Stopped while recovering phones for item {item_id}")]
    Interrupted { item_id: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] state::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Builds a `RequestFailed` error from a failed fetch
    pub fn request_failed(url: &str, status_code: Option<u16>) -> Self {
        Self::RequestFailed {
            url: url.to_string(),
            status_code,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Failed to read credential table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input file {path} is empty")]
    EmptyInput { path: String },
}

/// Result type alias for Ad-Harvest operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use auth::{AccountRotator, Credential, SessionProvider, Token, TokenKind, TokenManager};
pub use config::Config;
pub use http::{FetchResult, HttpClient};
pub use parser::{CategoryTree, PageParser, SiteParser};
// Bare `scraper` would be ambiguous with the HTML parsing crate
pub use crate::scraper::{RunOutcome, Scraper};
pub use state::{Item, ItemStore, Progress, ProgressStore};
