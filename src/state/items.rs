use crate::state::{remove_if_exists, write_atomic, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One scraped listing, in export column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub url: String,
    pub title: String,
    /// Category breadcrumb, root first
    pub category: String,
    pub last_refresh_time: String,
    pub created_time: String,
    pub price: String,
    pub state: String,
    pub description: String,
    pub city: String,
    pub region: String,
    /// Photo URLs joined by the separator
    pub photos: String,
    pub contact_name: String,
    /// Normalized phones joined by the separator, or `N/A`
    pub contact_phones: String,
    pub user_id: u64,
    pub user_name: String,
    pub user_created: String,
    pub user_last_seen: String,
}

/// Ordered, deduplicated collection of items plus its snapshot file
///
/// The first item seen with a given id wins; later ones are ignored.
#[derive(Debug)]
pub struct ItemStore {
    path: PathBuf,
    items: Vec<Item>,
    ids: HashSet<u64>,
}

impl ItemStore {
    /// Loads the snapshot at `path`, or starts empty if there is none
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let mut store = Self::empty(path);

        if path.exists() {
            let content = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
            let items: Vec<Item> =
                serde_json::from_slice(&content).map_err(|source| StorageError::Corrupt {
                    path: path.display().to_string(),
                    source,
                })?;
            for item in items {
                store.push(item);
            }
            tracing::info!("Loaded {} items from {}", store.len(), path.display());
        }

        Ok(store)
    }

    /// An empty store bound to `path`, ignoring whatever the file holds
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            items: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Appends `item` unless its id is already present
    ///
    /// # Returns
    ///
    /// `true` if the item was added
    pub fn push(&mut self, item: Item) -> bool {
        if !self.ids.insert(item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Overwrites the snapshot file with the full collection
    pub fn flush(&self) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&self.items)?;
        write_atomic(&self.path, &bytes)?;
        tracing::debug!("Flushed {} items to {}", self.items.len(), self.path.display());
        Ok(())
    }

    /// Drops every item and deletes the snapshot file
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.items.clear();
        self.ids.clear();
        remove_if_exists(&self.path)
    }
}

#[cfg(test)]
pub(crate) fn sample_item(id: u64) -> Item {
    Item {
        id,
        url: format!("https://www.example.ua/item/{}", id),
        title: format!("Item {}", id),
        category: "Transport >> Cars".to_string(),
        last_refresh_time: "2021-11-02 10:00:00".to_string(),
        created_time: "2021-11-01 09:00:00".to_string(),
        price: "1 000 грн.".to_string(),
        state: "N/A".to_string(),
        description: "Description".to_string(),
        city: "Kyiv".to_string(),
        region: "Kyiv region".to_string(),
        photos: String::new(),
        contact_name: "Seller".to_string(),
        contact_phones: "+380501234567".to_string(),
        user_id: 7,
        user_name: "Seller".to_string(),
        user_created: "2015-01-01 00:00:00".to_string(),
        user_last_seen: "2021-11-02 10:00:00".to_string(),
    }
}
