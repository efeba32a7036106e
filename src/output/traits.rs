//! Export writer trait and errors

use crate::state::Item;
use thiserror::Error;

/// Errors that can occur while exporting items
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A destination for the final result set
pub trait ItemWriter {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Writes every item, replacing whatever the destination held before
    fn write_items(&self, items: &[Item]) -> OutputResult<()>;
}
