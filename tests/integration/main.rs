//! Integration tests for Ad-Harvest
//!
//! These tests use wiremock to stand in for the marketplace and drive the
//! full scrape cycle end-to-end.

mod harness;
mod scrape_tests;
