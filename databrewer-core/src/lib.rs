//! Databrewer library exports
//!
//! Recipes describe datasets and their files, the catalog indexes recipes
//! for lookup and search, and transfers fetch selected files to disk.

pub mod catalog;
pub mod config;
pub mod error;
pub mod recipe;
pub mod transfer;

pub use config::{ConfigLoader, Overrides, Settings};
pub use error::{BrewerError, CatalogError, ConfigError, RecipeError, Result, TransferError};
