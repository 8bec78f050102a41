//! Recipe documents and the file specifications derived from them

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::RecipeError;

fn is_false(value: &bool) -> bool {
    !*value
}

/// A dataset recipe (one `*.yaml` document)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Unique name within the catalog
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Automated download must be refused
    #[serde(default, skip_serializing_if = "is_false")]
    pub restricted: bool,

    /// Set when the recipe is itself a single downloadable file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Top-level content tree
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileNode>,

    /// File the recipe was loaded from
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Fields this crate does not interpret, kept for display and re-encoding
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One node of a recipe's content tree: a group or a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub restricted: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileNode>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A concrete, addressable file of a recipe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSpec {
    /// Composed name, e.g. `group[child]`
    pub name: String,
    pub url: String,
    /// Explicit override or the decoded basename of the URL path
    pub filename: String,
    #[serde(skip_serializing_if = "is_false")]
    pub restricted: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Treat an empty `url:` the same as a missing one
fn leaf_url(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|u| !u.is_empty())
}

impl Recipe {
    /// Download URL when the recipe is itself a leaf
    pub fn leaf_url(&self) -> Option<&str> {
        leaf_url(&self.url)
    }

    /// Check the tree invariants: a non-empty name and no node that is both
    /// a leaf and a group
    pub fn validate(&self) -> Result<(), RecipeError> {
        if self.name.trim().is_empty() {
            return Err(RecipeError::MissingName {
                path: self.source.clone().unwrap_or_default(),
            });
        }

        if self.leaf_url().is_some() && !self.files.is_empty() {
            return Err(RecipeError::AmbiguousNode {
                name: self.name.clone(),
            });
        }

        self.files.iter().try_for_each(FileNode::validate)
    }

    /// Text used by the search index
    pub fn searchable_text(&self) -> String {
        let mut content = vec![self.name.as_str()];
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            content.push(description);
        }
        content.extend(self.keywords.iter().map(String::as_str));
        content.join("\n")
    }

    /// First line of the description, or an empty string
    pub fn short_description(&self) -> &str {
        self.description
            .as_deref()
            .and_then(|d| d.lines().next())
            .unwrap_or("")
            .trim()
    }
}

impl FileNode {
    /// Leaf node with the given name and URL
    pub fn leaf(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: Some(url.to_string()),
            filename: None,
            restricted: false,
            files: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Group node holding the given children
    pub fn group(name: &str, files: Vec<FileNode>) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            filename: None,
            restricted: false,
            files,
            extra: BTreeMap::new(),
        }
    }

    pub fn leaf_url(&self) -> Option<&str> {
        leaf_url(&self.url)
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf_url().is_some()
    }

    fn validate(&self) -> Result<(), RecipeError> {
        if self.is_leaf() && !self.files.is_empty() {
            return Err(RecipeError::AmbiguousNode {
                name: self.name.clone(),
            });
        }
        self.files.iter().try_for_each(FileNode::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Recipe {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_extra_fields_are_kept() {
        let recipe = parse(
            r#"
name: iris
description: Fisher's iris data
license: CC0
files:
  - name: data
    url: http://x/iris.csv
    md5: abc
"#,
        );

        assert_eq!(recipe.extra.get("license"), Some(&Value::from("CC0")));
        assert_eq!(recipe.files[0].extra.get("md5"), Some(&Value::from("abc")));

        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, recipe);
    }

    #[test]
    fn test_validate_rejects_url_and_files() {
        let recipe = parse(
            r#"
name: bad
files:
  - name: both
    url: http://x/a
    files:
      - name: child
        url: http://x/b
"#,
        );

        match recipe.validate() {
            Err(RecipeError::AmbiguousNode { name }) => assert_eq!(name, "both"),
            other => panic!("expected AmbiguousNode, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let recipe = parse("name: ''\n");
        assert!(matches!(
            recipe.validate(),
            Err(RecipeError::MissingName { .. })
        ));
    }

    #[test]
    fn test_empty_url_is_a_group() {
        let node = FileNode {
            url: Some(String::new()),
            ..FileNode::group("g", vec![FileNode::leaf("a", "http://x/a")])
        };
        assert!(!node.is_leaf());
        assert!(node.validate().is_ok());
    }

    #[test]
    fn test_searchable_text() {
        let recipe = parse(
            r#"
name: mnist
description: Handwritten digits
keywords: [images, digits]
"#,
        );
        assert_eq!(
            recipe.searchable_text(),
            "mnist\nHandwritten digits\nimages\ndigits"
        );
    }

    #[test]
    fn test_source_serializes_as_underscore_key() {
        let mut recipe = parse("name: a\nurl: http://x/a.csv\n");
        recipe.source = Some(PathBuf::from("/recipes/a.yaml"));

        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(json["_source"], Value::from("/recipes/a.yaml"));
    }
}
