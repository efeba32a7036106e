//! Configuration module for Ad-Harvest
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file, plus the plain-text search-link list it points at.
//!
//! # Example
//!
//! ```no_run
//! use ad_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Snapshot file: {}", config.paths.snapshot);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnonymousConfig, Config, ContactsConfig, GeneralConfig, HttpConfig, ParserConfig, PathsConfig,
    PhoneConfig, ProxyConfig, ProxyMode, RateLimitConfig, SessionConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_search_links, search_links_hash,
};
