//! Catalog index storage and full-text search
//!
//! The index keeps one [`IndexedDocument`] per recipe name in
//! `<index_dir>/catalog.json`. Searching goes through an in-memory inverted
//! map from stemmed, lowercased word tokens to recipe names, rebuilt when the
//! index is opened.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;
use crate::recipe::Recipe;

/// Name of the index file inside the index directory
pub const INDEX_FILE: &str = "catalog.json";

/// Maximum number of search results
pub const SEARCH_LIMIT: usize = 100;

const API_VERSION: &str = "databrewer/v1";

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token regex is valid"));

/// Split text into lowercased word tokens of at least two characters, each
/// reduced to its English stem
///
/// Documents and queries go through the same pipeline, so `images` finds
/// `image` and `labels` finds `Labeled`.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    let stemmer = Stemmer::create(Algorithm::English);
    TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.chars().count() >= 2)
        .map(move |t| stemmer.stem(&t).into_owned())
}

/// Storage seam for indexed recipes
pub trait CatalogStore {
    /// True when no recipe has ever been stored
    fn is_empty(&self) -> bool;

    /// Insert or replace the recipe with the same name
    fn put(&mut self, recipe: &Recipe) -> Result<(), CatalogError>;

    fn get(&self, name: &str) -> Result<Option<Recipe>, CatalogError>;

    /// Recipes matching every word of `query`, best matches first
    fn search(&self, query: &str) -> Result<Vec<Recipe>, CatalogError>;

    /// Every stored recipe, ordered by name
    fn list(&self) -> Result<Vec<Recipe>, CatalogError>;

    /// Persist pending changes
    fn commit(&mut self) -> Result<(), CatalogError>;
}

/// A stored recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Recipe name
    pub id: String,
    /// Searchable text: name, description and keywords, one per line
    pub content: String,
    /// The recipe, JSON-encoded
    pub data: String,
}

impl IndexedDocument {
    pub fn from_recipe(recipe: &Recipe) -> Result<Self, CatalogError> {
        let data = serde_json::to_string(recipe).map_err(|source| CatalogError::Encode {
            id: recipe.name.clone(),
            source,
        })?;

        Ok(Self {
            id: recipe.name.clone(),
            content: recipe.searchable_text(),
            data,
        })
    }
}

/// On-disk layout of the index file
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexFile {
    api_version: String,
    generated: String,
    documents: Vec<IndexedDocument>,
}

/// File-backed [`CatalogStore`]
#[derive(Debug)]
pub struct FileIndex {
    path: PathBuf,
    documents: BTreeMap<String, IndexedDocument>,
    postings: BTreeMap<String, BTreeSet<String>>,
    dirty: bool,
}

impl FileIndex {
    /// Open the index in `dir`; a missing index file opens as empty
    pub fn open(dir: &Path) -> Result<Self, CatalogError> {
        let mut index = Self::create(dir);
        if !index.path.exists() {
            return Ok(index);
        }

        let content = fs::read_to_string(&index.path).map_err(|source| CatalogError::Io {
            path: index.path.clone(),
            source,
        })?;
        let file: IndexFile =
            serde_json::from_str(&content).map_err(|source| CatalogError::Decode {
                path: index.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %index.path.display(),
            generated = %file.generated,
            documents = file.documents.len(),
            "Opened catalog index"
        );

        for document in file.documents {
            index.insert(document);
        }
        index.dirty = false;
        Ok(index)
    }

    /// A fresh, empty index that replaces whatever is in `dir` on commit
    pub fn create(dir: &Path) -> Self {
        Self {
            path: dir.join(INDEX_FILE),
            documents: BTreeMap::new(),
            postings: BTreeMap::new(),
            dirty: true,
        }
    }

    /// [`FileIndex::create`] when `recreate` is set, [`FileIndex::open`] otherwise
    pub fn open_or_create(dir: &Path, recreate: bool) -> Result<Self, CatalogError> {
        if recreate {
            Ok(Self::create(dir))
        } else {
            Self::open(dir)
        }
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn document(&self, name: &str) -> Option<&IndexedDocument> {
        self.documents.get(name)
    }

    fn insert(&mut self, document: IndexedDocument) {
        if let Some(previous) = self.documents.remove(&document.id) {
            for token in tokenize(&previous.content) {
                if let Some(ids) = self.postings.get_mut(&token) {
                    ids.remove(&previous.id);
                    if ids.is_empty() {
                        self.postings.remove(&token);
                    }
                }
            }
        }

        for token in tokenize(&document.content) {
            self.postings
                .entry(token)
                .or_default()
                .insert(document.id.clone());
        }
        self.documents.insert(document.id.clone(), document);
        self.dirty = true;
    }

    fn decode(&self, document: &IndexedDocument) -> Result<Recipe, CatalogError> {
        serde_json::from_str(&document.data).map_err(|source| CatalogError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    /// Names matching `token` exactly, and names matching it only as a prefix
    fn lookup(&self, token: &str) -> (BTreeSet<&str>, BTreeSet<&str>) {
        let mut exact = BTreeSet::new();
        let mut prefixed = BTreeSet::new();

        for (term, ids) in self.postings.range(token.to_string()..) {
            if !term.starts_with(token) {
                break;
            }
            let bucket = if term == token { &mut exact } else { &mut prefixed };
            bucket.extend(ids.iter().map(String::as_str));
        }

        (exact, prefixed)
    }
}

impl CatalogStore for FileIndex {
    fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn put(&mut self, recipe: &Recipe) -> Result<(), CatalogError> {
        let document = IndexedDocument::from_recipe(recipe)?;
        self.insert(document);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Recipe>, CatalogError> {
        self.documents
            .get(name)
            .map(|document| self.decode(document))
            .transpose()
    }

    fn search(&self, query: &str) -> Result<Vec<Recipe>, CatalogError> {
        let tokens: BTreeSet<String> = tokenize(query).collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        // Every query token must match; exact matches rank above prefix ones
        let mut scores: Option<BTreeMap<&str, usize>> = None;
        for token in &tokens {
            let (exact, prefixed) = self.lookup(token);
            let matched: BTreeMap<&str, usize> = exact
                .iter()
                .map(|id| (*id, 1))
                .chain(prefixed.difference(&exact).map(|id| (*id, 0)))
                .collect();

            scores = Some(match scores {
                None => matched,
                Some(current) => current
                    .into_iter()
                    .filter_map(|(id, score)| matched.get(id).map(|s| (id, score + s)))
                    .collect(),
            });
        }

        let mut ranked: Vec<(&str, usize)> = scores.unwrap_or_default().into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        tracing::debug!(query, hits = ranked.len(), "Searched catalog index");

        ranked
            .into_iter()
            .take(SEARCH_LIMIT)
            .filter_map(|(id, _)| self.documents.get(id))
            .map(|document| self.decode(document))
            .collect()
    }

    fn list(&self) -> Result<Vec<Recipe>, CatalogError> {
        self.documents
            .values()
            .map(|document| self.decode(document))
            .collect()
    }

    fn commit(&mut self) -> Result<(), CatalogError> {
        if !self.dirty {
            return Ok(());
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| CatalogError::Io { path, source }
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }

        let file = IndexFile {
            api_version: API_VERSION.to_string(),
            generated: chrono::Utc::now().to_rfc3339(),
            documents: self.documents.values().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| CatalogError::Encode {
            id: INDEX_FILE.to_string(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))?;

        tracing::info!(
            path = %self.path.display(),
            documents = self.documents.len(),
            "Committed catalog index"
        );
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn recipe(yaml: &str) -> Recipe {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn names(recipes: &[Recipe]) -> Vec<&str> {
        recipes.iter().map(|r| r.name.as_str()).collect()
    }

    fn sample_index(dir: &Path) -> FileIndex {
        let mut index = FileIndex::create(dir);
        for yaml in [
            "name: mnist\ndescription: Handwritten digits database\nkeywords: [images, digits]\n",
            "name: cifar10\ndescription: Tiny images in ten classes\nkeywords: [images]\n",
            "name: iris\ndescription: Fisher's iris flower measurements\nkeywords: [tabular]\n",
            "name: imdb\ndescription: Movie reviews for sentiment analysis\n",
        ] {
            index.put(&recipe(yaml)).unwrap();
        }
        index
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("Fisher's IRIS data-set, v2 (a)").collect();
        assert_eq!(tokens, vec!["fisher", "iri", "data", "set", "v2"]);

        let stems = |text| tokenize(text).collect::<Vec<String>>();
        assert_eq!(stems("Labeled images"), stems("labels image"));
    }

    #[test]
    fn test_new_index_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = FileIndex::open(temp.path()).unwrap();
        assert!(index.is_empty());
        assert!(index.list().unwrap().is_empty());
    }

    #[test]
    fn test_put_replaces_same_name() {
        let temp = TempDir::new().unwrap();
        let mut index = FileIndex::create(temp.path());
        index.put(&recipe("name: a\ndescription: first\n")).unwrap();
        index.put(&recipe("name: a\ndescription: second\n")).unwrap();

        assert_eq!(index.document_count(), 1);
        let stored = index.get("a").unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("second"));
        assert!(index.search("first").unwrap().is_empty());
        assert_eq!(names(&index.search("second").unwrap()), vec!["a"]);
    }

    #[test]
    fn test_get_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let index = sample_index(temp.path());
        assert!(index.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_is_ordered_by_name() {
        let temp = TempDir::new().unwrap();
        let index = sample_index(temp.path());
        assert_eq!(
            names(&index.list().unwrap()),
            vec!["cifar10", "imdb", "iris", "mnist"]
        );
    }

    #[test]
    fn test_search_matches_every_word() {
        let temp = TempDir::new().unwrap();
        let index = sample_index(temp.path());

        assert_eq!(names(&index.search("images").unwrap()), vec!["cifar10", "mnist"]);
        assert_eq!(names(&index.search("images digits").unwrap()), vec!["mnist"]);
        assert!(index.search("images flower").unwrap().is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive_and_prefix_aware() {
        let temp = TempDir::new().unwrap();
        let index = sample_index(temp.path());

        assert_eq!(names(&index.search("IRIS").unwrap()), vec!["iris"]);
        assert_eq!(names(&index.search("digit").unwrap()), vec!["mnist"]);
        assert_eq!(names(&index.search("senti").unwrap()), vec!["imdb"]);
    }

    #[test]
    fn test_exact_matches_rank_first() {
        let temp = TempDir::new().unwrap();
        let mut index = FileIndex::create(temp.path());
        index.put(&recipe("name: aaa\ndescription: imagery archive\n")).unwrap();
        index.put(&recipe("name: zzz\ndescription: images archive\n")).unwrap();

        assert_eq!(names(&index.search("image").unwrap()), vec!["zzz", "aaa"]);
    }

    #[test]
    fn test_search_matches_word_forms() {
        let temp = TempDir::new().unwrap();
        let mut index = FileIndex::create(temp.path());
        index
            .put(&recipe("name: faces\ndescription: Labeled image of faces\n"))
            .unwrap();

        assert_eq!(names(&index.search("images").unwrap()), vec!["faces"]);
        assert_eq!(names(&index.search("labels").unwrap()), vec!["faces"]);
        assert_eq!(names(&index.search("face labeling").unwrap()), vec!["faces"]);
    }

    #[test]
    fn test_empty_query_finds_nothing() {
        let temp = TempDir::new().unwrap();
        let index = sample_index(temp.path());
        assert!(index.search("").unwrap().is_empty());
        assert!(index.search("a !").unwrap().is_empty());
    }

    #[test]
    fn test_commit_and_reopen() {
        let temp = TempDir::new().unwrap();
        let mut index = sample_index(temp.path());
        index.commit().unwrap();
        assert!(temp.path().join(INDEX_FILE).exists());

        let reopened = FileIndex::open(temp.path()).unwrap();
        assert_eq!(reopened.document_count(), 4);
        assert_eq!(reopened.document("mnist"), index.document("mnist"));
        assert_eq!(names(&reopened.search("digits").unwrap()), vec!["mnist"]);
    }

    #[test]
    fn test_recreate_discards_previous_documents() {
        let temp = TempDir::new().unwrap();
        sample_index(temp.path()).commit().unwrap();

        let mut index = FileIndex::open_or_create(temp.path(), true).unwrap();
        assert!(index.is_empty());
        index.put(&recipe("name: only\n")).unwrap();
        index.commit().unwrap();

        let reopened = FileIndex::open(temp.path()).unwrap();
        assert_eq!(names(&reopened.list().unwrap()), vec!["only"]);
    }

    #[test]
    fn test_corrupted_index_reports_path() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(INDEX_FILE), "{not json").unwrap();

        match FileIndex::open(temp.path()) {
            Err(CatalogError::Decode { path, .. }) => {
                assert_eq!(path, temp.path().join(INDEX_FILE))
            }
            other => panic!("expected Decode error, got {other:?}"),
        }
    }
}
