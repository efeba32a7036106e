//! SQLite export
//!
//! The result set lands in a single `items` table. The table is dropped and
//! recreated on every export so the database mirrors the final snapshot.

use crate::output::traits::{ItemWriter, OutputResult};
use crate::state::Item;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQL schema for the export table
pub const ITEMS_SCHEMA_SQL: &str = r#"
DROP TABLE IF EXISTS items;

CREATE TABLE items (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    last_refresh_time TEXT NOT NULL,
    created_time TEXT NOT NULL,
    price TEXT NOT NULL,
    state TEXT NOT NULL,
    description TEXT NOT NULL,
    city TEXT NOT NULL,
    region TEXT NOT NULL,
    photos TEXT NOT NULL,
    contact_name TEXT NOT NULL,
    contact_phones TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    user_name TEXT NOT NULL,
    user_created TEXT NOT NULL,
    user_last_seen TEXT NOT NULL
);

CREATE INDEX idx_items_user ON items(user_id);
"#;

const INSERT_ITEM_SQL: &str = "INSERT INTO items (
    id, url, title, category, last_refresh_time, created_time, price, state,
    description, city, region, photos, contact_name, contact_phones,
    user_id, user_name, user_created, user_last_seen
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)";

/// Writes items into an SQLite database file
pub struct SqliteWriter {
    path: PathBuf,
}

impl SqliteWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ItemWriter for SqliteWriter {
    fn name(&self) -> &str {
        "SQLite"
    }

    fn write_items(&self, items: &[Item]) -> OutputResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&self.path)?;
        conn.execute_batch(ITEMS_SCHEMA_SQL)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_ITEM_SQL)?;
            for item in items {
                // SQLite integers are signed 64-bit
                stmt.execute(params![
                    item.id as i64,
                    item.url,
                    item.title,
                    item.category,
                    item.last_refresh_time,
                    item.created_time,
                    item.price,
                    item.state,
                    item.description,
                    item.city,
                    item.region,
                    item.photos,
                    item.contact_name,
                    item.contact_phones,
                    item.user_id as i64,
                    item.user_name,
                    item.user_created,
                    item.user_last_seen,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
