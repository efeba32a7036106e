//! Contact harvesting
//!
//! A small companion to the scraper: given a company website, collect the
//! email addresses and phone numbers it publishes.
//!
//! # Components
//!
//! - `TextMiner`: regex extraction of emails and phones from page text
//! - `ContactCrawler`: depth-limited walk over same-site pages

mod crawler;
mod links;
mod miner;

pub use crawler::{ContactCrawler, ContactReport};
pub use links::{internal_links, swap_scheme, HTML_EXTENSIONS};
pub use miner::TextMiner;
