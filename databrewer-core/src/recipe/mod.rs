//! Recipes: dataset descriptors and their file trees
//!
//! A recipe is a YAML document naming a dataset and the files it is made of.
//! Files form a tree of groups and leaves; this module loads recipes, flattens
//! their trees into addressable [`FileSpec`]s and selects files by pattern.
//!
//! ```text
//! mnist.yaml ──load──▶ Recipe ──iter_files──▶ FileSpec* ──match_files──▶ FileSpec*
//!                                              train                      train
//!                                              test
//! ```

mod files;
mod loader;
mod model;
mod pattern;

pub use files::{compose_name, iter_files, url_filename, FileIter};
pub use loader::{from_yaml, list_recipes, load_all, load_recipe, RECIPE_EXTENSION};
pub use model::{FileNode, FileSpec, Recipe};
pub use pattern::{match_files, resolve_files, translate, FilePattern, NameSpec, MATCH_ALL};
