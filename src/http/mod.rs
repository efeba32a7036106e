//! HTTP layer for the scraper
//!
//! This module contains:
//! - `HttpClient`: GET/POST with timeout, bounded retries and a politeness delay
//! - `FetchResult`: outcome of a request, keeping "server answered with an
//!   error" apart from "server never reached"
//! - Proxy backends: direct, fixed, round-robin list, free-proxy pool and the
//!   anonymizing relay

mod client;
mod free_proxy;
mod proxy;
mod tor;

pub use client::{build_http_client, FetchResult, HttpClient};
pub use free_proxy::{FreeProxyPool, ProxyRecord};
pub use proxy::ProxySource;
pub use tor::TorRelay;

use thiserror::Error;

/// Errors raised while setting up or reconfiguring HTTP clients
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("No usable proxy: {0}")]
    NoProxyAvailable(String),

    #[error("Anonymizing relay error: {0}")]
    Relay(String),

    #[error("Download of {url} failed (status: {status_code:?})")]
    Download {
        url: String,
        status_code: Option<u16>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
