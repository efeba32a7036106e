use crate::parser::api_error;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Joins category names in a breadcrumb
pub const BREADCRUMB_SEPARATOR: &str = " >> ";

/// Errors resolving the category graph
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Unknown category id {0}")]
    Unknown(u64),

    #[error("Category {id} points at missing parent {parent_id}")]
    MissingParent { id: u64, parent_id: u64 },

    #[error("Category chain starting at {0} loops")]
    Cycle(u64),

    #[error("Malformed category payload: {0}")]
    Malformed(String),
}

/// One node of the category tree; `parent_id == 0` marks a root
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: u64,
    #[serde(default)]
    pub parent_id: u64,
    pub name: String,
}

#[derive(Deserialize)]
struct CategoriesPayload {
    data: Vec<Category>,
}

/// Flat id → category lookup, loaded once per run
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    categories: HashMap<u64, Category>,
}

impl CategoryTree {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    /// Builds the tree from a `{"data": [{id, parent_id, name}, ...]}` payload
    pub fn from_json(json: &Value) -> Result<Self, CategoryError> {
        if let Some(error) = api_error(json) {
            return Err(CategoryError::Malformed(error));
        }

        let payload: CategoriesPayload = serde_json::from_value(json.clone())
            .map_err(|e| CategoryError::Malformed(e.to_string()))?;
        Ok(Self::new(payload.data))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Category> {
        self.categories.get(&id)
    }

    /// Category path from root to `id`, joined with `" >> "`
    ///
    /// Every link of the chain must resolve; a missing parent or a loop
    /// makes the whole breadcrumb unresolvable.
    pub fn breadcrumb(&self, id: u64) -> Result<String, CategoryError> {
        let mut names = Vec::new();
        let mut visited = HashSet::new();

        let mut current = self.get(id).ok_or(CategoryError::Unknown(id))?;
        loop {
            if !visited.insert(current.id) {
                return Err(CategoryError::Cycle(id));
            }
            names.push(current.name.as_str());

            if current.parent_id == 0 {
                break;
            }
            current = self
                .get(current.parent_id)
                .ok_or(CategoryError::MissingParent {
                    id: current.id,
                    parent_id: current.parent_id,
                })?;
        }

        names.reverse();
        Ok(names.join(BREADCRUMB_SEPARATOR))
    }
}
