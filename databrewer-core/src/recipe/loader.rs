//! Reading recipe documents from disk

use std::fs;
use std::path::{Path, PathBuf};

use super::model::Recipe;
use crate::error::RecipeError;

/// Extension of recipe documents
pub const RECIPE_EXTENSION: &str = "yaml";

/// Parse a recipe from YAML text
///
/// `path` only labels errors; it is not recorded as the recipe's source.
pub fn from_yaml(content: &str, path: &Path) -> Result<Recipe, RecipeError> {
    let recipe: Recipe = serde_yaml_ng::from_str(content).map_err(|source| RecipeError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    recipe.validate().map_err(|e| match e {
        RecipeError::MissingName { .. } => RecipeError::MissingName {
            path: path.to_path_buf(),
        },
        other => other,
    })?;

    Ok(recipe)
}

/// Load and validate one recipe document, recording where it came from
pub fn load_recipe(path: &Path) -> Result<Recipe, RecipeError> {
    let content = fs::read_to_string(path).map_err(|source| RecipeError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut recipe = from_yaml(&content, path)?;
    recipe.source = Some(path.to_path_buf());

    tracing::debug!(recipe = %recipe.name, path = %path.display(), "Loaded recipe");
    Ok(recipe)
}

/// Recipe documents directly inside `dir`, sorted by path
///
/// Hidden files are ignored. A missing directory yields nothing.
pub fn list_recipes(dir: &Path) -> Result<Vec<PathBuf>, RecipeError> {
    if !dir.exists() {
        tracing::warn!("Recipes directory {} does not exist, skipping", dir.display());
        return Ok(Vec::new());
    }

    let read_err = |source| RecipeError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();

        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        let is_recipe = path.extension().and_then(|e| e.to_str()) == Some(RECIPE_EXTENSION);

        if is_recipe && !hidden && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Lazily load every recipe found in `dirs`, directory by directory
pub fn load_all<'a, I>(dirs: I) -> impl Iterator<Item = Result<Recipe, RecipeError>> + 'a
where
    I: IntoIterator<Item = &'a PathBuf>,
    I::IntoIter: 'a,
{
    dirs.into_iter().flat_map(|dir| {
        let loaded: Box<dyn Iterator<Item = Result<Recipe, RecipeError>>> =
            match list_recipes(dir) {
                Ok(paths) => Box::new(paths.into_iter().map(|p| load_recipe(&p))),
                Err(e) => Box::new(std::iter::once(Err(e))),
            };
        loaded
    })
}
