//! Databrewer catalog - recipe indexing and lookup
//!
//! # Overview
//!
//! The catalog is the searchable set of known recipes. It is rebuilt by
//! `databrewer update` from the recipe directories, and read by every other
//! command.
//!
//! # Architecture
//!
//! ```text
//! recipes_default_url (tar.gz)
//!     │  bootstrap
//!     ▼
//! <root>/recipes/*.yaml   + any other recipes_dir
//!     │  load_all
//!     ▼
//! CatalogStore::put ──▶ <root>/index/catalog.json
//!     │
//!     ▼
//! list / search / get
//! ```

mod bootstrap;
mod index;

pub use bootstrap::{bootstrap_default_recipes, extract_recipes};
pub use index::{tokenize, CatalogStore, FileIndex, IndexedDocument, INDEX_FILE, SEARCH_LIMIT};

use std::path::PathBuf;
use tracing::info;

use crate::error::{CatalogError, Result};
use crate::recipe::{load_all, Recipe};

/// Load every recipe in `dirs` into `store` and commit it
///
/// A recipe that fails to load aborts the update before anything is
/// committed. Later directories win when two recipes share a name.
pub fn update_index(store: &mut dyn CatalogStore, dirs: &[PathBuf]) -> Result<usize> {
    let mut count = 0;
    for recipe in load_all(dirs) {
        store.put(&recipe?)?;
        count += 1;
    }

    store.commit()?;
    info!(count, "Indexed recipes");
    Ok(count)
}

/// Fetch a recipe by name, distinguishing an empty index from a missing name
pub fn lookup(store: &dyn CatalogStore, name: &str) -> std::result::Result<Recipe, CatalogError> {
    if store.is_empty() {
        return Err(CatalogError::Empty);
    }

    store
        .get(name)?
        .ok_or_else(|| CatalogError::RecipeNotFound(name.to_string()))
}

#[cfg(test)]
mod tests;
