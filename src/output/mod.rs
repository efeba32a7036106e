//! Final export of the result set
//!
//! This module handles:
//! - Writing the accumulated items to CSV
//! - Writing them to an SQLite table when a database path is configured

mod csv_output;
mod sqlite_output;
mod traits;

pub use csv_output::CsvWriter;
pub use sqlite_output::{SqliteWriter, ITEMS_SCHEMA_SQL};
pub use traits::{ItemWriter, OutputError, OutputResult};

use crate::config::PathsConfig;
use crate::state::Item;
use std::path::Path;

/// Writers enabled by the configured paths
pub fn writers_for(paths: &PathsConfig) -> Vec<Box<dyn ItemWriter>> {
    let mut writers: Vec<Box<dyn ItemWriter>> =
        vec![Box::new(CsvWriter::new(Path::new(&paths.csv)))];
    if let Some(db) = &paths.sqlite {
        writers.push(Box::new(SqliteWriter::new(Path::new(db))));
    }
    writers
}

/// Exports the final result set to every configured destination
///
/// # Arguments
///
/// * `items` - The accumulated items
/// * `paths` - Output locations
///
/// # Returns
///
/// * `Ok(true)` - Every writer succeeded
/// * `Ok(false)` - Nothing to export; no file was touched
/// * `Err(OutputError)` - A writer failed
pub fn export_items(items: &[Item], paths: &PathsConfig) -> OutputResult<bool> {
    if items.is_empty() {
        tracing::warn!("No items scraped. Nothing to export.");
        return Ok(false);
    }

    for writer in writers_for(paths) {
        tracing::info!("Saving {} items to {}.", items.len(), writer.name());
        writer.write_items(items)?;
    }
    Ok(true)
}
