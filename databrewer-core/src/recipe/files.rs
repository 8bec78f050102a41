//! Flattening a recipe tree into concrete file specifications
//!
//! Groups nest their children's names with brackets, so a leaf `leaf` under
//! `outer > inner` is addressed as `outer[inner[leaf]]`. Top-level entries of
//! a recipe keep their bare name.

use percent_encoding::percent_decode_str;
use std::path::{Component, Path};
use std::slice;
use url::Url;

use super::model::{FileNode, FileSpec, Recipe};
use crate::error::RecipeError;

/// Compose a child's addressable name from its parent's
pub fn compose_name(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}[{name}]"),
        None => name.to_string(),
    }
}

/// URL-decoded basename of the URL's path component
///
/// Returns an empty string when the path ends with `/` or is empty. Path
/// parameters (`;type=i` on FTP URLs) are not part of the name.
pub fn url_filename(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            // Not absolute; drop query and fragment by hand
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].to_string()
        }
    };

    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let path = match path[segment_start..].find(';') {
        Some(i) => &path[..segment_start + i],
        None => &path[..],
    };

    let decoded = percent_decode_str(path).decode_utf8_lossy();
    decoded.rsplit('/').next().unwrap_or("").to_string()
}

/// A single normal path component: no separators, no `..`, not absolute
fn is_plain_file_name(filename: &str) -> bool {
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name.to_str() == Some(filename)
    )
}

/// Build the [`FileSpec`] for a leaf, deriving its filename when needed
pub fn make_file_spec(name: String, url: &str, node: &FileNode) -> Result<FileSpec, RecipeError> {
    let filename = match node.filename.as_deref().filter(|f| !f.is_empty()) {
        Some(explicit) => explicit.to_string(),
        None => url_filename(url),
    };

    if filename.is_empty() {
        return Err(RecipeError::FilenameDerivation {
            url: url.to_string(),
        });
    }
    if !is_plain_file_name(&filename) {
        return Err(RecipeError::UnsafeFilename { filename });
    }

    Ok(FileSpec {
        name,
        url: url.to_string(),
        filename,
        restricted: node.restricted,
        extra: node.extra.clone(),
    })
}

/// Recipe that is itself a single file
fn recipe_leaf(recipe: &Recipe, url: &str) -> Result<FileSpec, RecipeError> {
    let node = FileNode {
        filename: recipe.filename.clone(),
        restricted: recipe.restricted,
        ..FileNode::leaf(&recipe.name, url)
    };
    make_file_spec(recipe.name.clone(), url, &node)
}

struct Frame<'a> {
    parent: Option<String>,
    nodes: slice::Iter<'a, FileNode>,
}

/// Lazy, depth-first iterator over a recipe's files in document order
///
/// Yields an `Err` for a leaf whose filename cannot be derived; collecting
/// into `Result<Vec<_>, _>` fails the whole enumeration.
pub struct FileIter<'a> {
    root: Option<&'a Recipe>,
    stack: Vec<Frame<'a>>,
}

impl<'a> FileIter<'a> {
    /// Enumerate the recipe's own `files` list (or the recipe itself when it
    /// is a leaf)
    pub fn new(recipe: &'a Recipe) -> Self {
        if recipe.leaf_url().is_some() {
            return Self {
                root: Some(recipe),
                stack: Vec::new(),
            };
        }

        Self::from_nodes(None, &recipe.files)
    }

    /// Enumerate an arbitrary list of nodes under an optional parent name
    pub fn from_nodes(parent: Option<&str>, nodes: &'a [FileNode]) -> Self {
        Self {
            root: None,
            stack: vec![Frame {
                parent: parent.map(str::to_string),
                nodes: nodes.iter(),
            }],
        }
    }
}

impl Iterator for FileIter<'_> {
    type Item = Result<FileSpec, RecipeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(recipe) = self.root.take() {
            let url = recipe.leaf_url()?;
            return Some(recipe_leaf(recipe, url));
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some(node) = frame.nodes.next() else {
                self.stack.pop();
                continue;
            };

            let name = compose_name(frame.parent.as_deref(), &node.name);

            if let Some(url) = node.leaf_url() {
                return Some(make_file_spec(name, url, node));
            }

            if !node.files.is_empty() {
                self.stack.push(Frame {
                    parent: Some(name),
                    nodes: node.files.iter(),
                });
            }
        }
    }
}

/// Enumerate every file of a recipe
pub fn iter_files(recipe: &Recipe) -> FileIter<'_> {
    FileIter::new(recipe)
}
