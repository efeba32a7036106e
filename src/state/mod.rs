//! Durable run state
//!
//! This module provides the two files that make a run resumable.
//!
//! # Components
//!
//! - `ProgressStore`: cursor over (account index, search-link index, page)
//! - `ItemStore`: the accumulated item collection, flushed as a whole snapshot

mod items;
mod progress;

// Re-export main types
pub use items::{Item, ItemStore};
pub use progress::{Progress, ProgressStore};

#[cfg(test)]
pub(crate) use items::sample_item;

use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading or writing run state
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Replaces `path` with `bytes` via a sibling temp file and a rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    std::fs::write(tmp, bytes).map_err(|e| StorageError::io(tmp, e))?;
    std::fs::rename(tmp, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Deletes `path`, treating "already gone" as success
fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}
