use crate::state::{remove_if_exists, write_atomic, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resumable cursor of a scraping run
///
/// `page` always names the next unfetched page of the link at
/// `search_link_index`, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub account_index: usize,
    pub search_link_index: usize,
    pub page: u32,

    /// Hash of the search-link list the cursor refers to
    #[serde(default)]
    pub links_hash: Option<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            account_index: 0,
            search_link_index: 0,
            page: 1,
            links_hash: None,
            updated_at: None,
        }
    }
}

impl Progress {
    /// The (account, link, page) triple without bookkeeping fields
    pub fn cursor(&self) -> (usize, usize, u32) {
        (self.account_index, self.search_link_index, self.page)
    }
}

/// Progress record bound to its file
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    progress: Progress,
}

impl ProgressStore {
    /// Loads the cursor from `path`, starting fresh if the file is missing
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the progress JSON file
    ///
    /// # Returns
    ///
    /// * `Ok(ProgressStore)` - Loaded (or default) cursor
    /// * `Err(StorageError)` - The file exists but is unreadable or corrupt
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let progress = if path.exists() {
            let content = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
            let mut progress: Progress =
                serde_json::from_slice(&content).map_err(|source| StorageError::Corrupt {
                    path: path.display().to_string(),
                    source,
                })?;
            if progress.page == 0 {
                tracing::warn!("Saved page 0 is invalid, using page 1");
                progress.page = 1;
            }
            tracing::info!(
                "Loaded progress: account #{}, link #{}, page {}",
                progress.account_index,
                progress.search_link_index,
                progress.page
            );
            progress
        } else {
            tracing::info!("No saved progress at {}, starting fresh", path.display());
            Progress::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            progress,
        })
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the cursor to disk (atomically)
    pub fn save(&mut self) -> Result<(), StorageError> {
        self.progress.updated_at = Some(Utc::now());
        let bytes = serde_json::to_vec_pretty(&self.progress)?;
        write_atomic(&self.path, &bytes)
    }

    pub fn set_account_index(&mut self, index: usize) {
        self.progress.account_index = index;
    }

    /// Marks the current page done and checkpoints
    pub fn advance_page(&mut self) -> Result<(), StorageError> {
        self.progress.page += 1;
        self.save()
    }

    /// Marks the current link done, rewinds to page 1 and checkpoints
    pub fn advance_link(&mut self) -> Result<(), StorageError> {
        self.progress.search_link_index += 1;
        self.progress.page = 1;
        self.save()
    }

    /// Records the hash of the current search-link list
    ///
    /// Returns false (and logs a warning) when a different list was in use
    /// when the cursor was last saved.
    pub fn check_links_hash(&mut self, hash: &str) -> bool {
        let matches = match self.progress.links_hash.as_deref() {
            Some(saved) if saved != hash => {
                tracing::warn!(
                    "Search links changed since the last run; link #{} may refer to a different query",
                    self.progress.search_link_index
                );
                false
            }
            _ => true,
        };
        self.progress.links_hash = Some(hash.to_string());
        matches
    }

    /// Forgets the cursor and deletes its file
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.progress = Progress::default();
        remove_if_exists(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(&dir.path().join("progress.json")).unwrap();
        assert_eq!(store.progress().cursor(), (0, 0, 1));
    }

    #[test]
    fn test_advance_page_persists_increment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::load(&path).unwrap();

        for expected in 2..=4 {
            store.advance_page().unwrap();
            let reloaded = ProgressStore::load(&path).unwrap();
            assert_eq!(reloaded.progress().page, expected);
            assert_eq!(reloaded.progress().cursor(), store.progress().cursor());
        }
    }

    #[test]
    fn test_advance_link_resets_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::load(&path).unwrap();

        store.advance_page().unwrap();
        store.advance_page().unwrap();
        store.advance_link().unwrap();

        let reloaded = ProgressStore::load(&path).unwrap();
        assert_eq!(reloaded.progress().cursor(), (0, 1, 1));
        assert!(reloaded.progress().updated_at.is_some());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            ProgressStore::load(&path),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_legacy_record_without_bookkeeping_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{"account_index": 2, "search_link_index": 1, "page": 0}"#,
        )
        .unwrap();

        let store = ProgressStore::load(&path).unwrap();
        assert_eq!(store.progress().cursor(), (2, 1, 1));
    }

    #[test]
    fn test_links_hash_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::load(&dir.path().join("progress.json")).unwrap();

        assert!(store.check_links_hash("aaa"));
        assert!(store.check_links_hash("aaa"));
        assert!(!store.check_links_hash("bbb"));
        assert_eq!(store.progress().links_hash.as_deref(), Some("bbb"));
    }

    #[test]
    fn test_reset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::load(&path).unwrap();
        store.advance_page().unwrap();
        assert!(path.exists());

        store.reset().unwrap();
        assert!(!path.exists());
        assert_eq!(store.progress().cursor(), (0, 0, 1));
    }
}
