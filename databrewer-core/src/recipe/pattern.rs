//! Selecting files of a recipe by name pattern
//!
//! Users address files as `<recipe>` or `<recipe>[<pattern>]`. The pattern is
//! a case-sensitive glob over composed file names where:
//!
//! - literal `[` and `]` are escaped, because the addressing scheme itself
//!   uses brackets for nesting;
//! - every `{...}` segment becomes a bracket range, so `file{1,2}` behaves as
//!   `file[{1,2}]`. This is a character class, not an alternative list: it
//!   also matches `file,`, `file{` and `file}`.

use glob::{MatchOptions, Pattern};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use super::files::iter_files;
use super::model::{FileSpec, Recipe};
use crate::error::RecipeError;

/// Pattern selecting every file
pub const MATCH_ALL: &str = "*";

static BRACE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\{.+?\})").expect("brace range regex is valid"));

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A parsed `<recipe>[<pattern>]` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSpec {
    /// Recipe name (everything before the first `[`)
    pub recipe: String,
    /// File pattern; [`MATCH_ALL`] for a bare recipe name
    pub pattern: String,
}

impl NameSpec {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('[') {
            Some((recipe, rest)) => Self {
                recipe: recipe.to_string(),
                pattern: rest.strip_suffix(']').unwrap_or(rest).to_string(),
            },
            None => Self {
                recipe: spec.to_string(),
                pattern: MATCH_ALL.to_string(),
            },
        }
    }

    /// True when no file pattern was given
    pub fn selects_all(&self) -> bool {
        self.pattern == MATCH_ALL
    }
}

impl FromStr for NameSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for NameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.selects_all() {
            write!(f, "{}", self.recipe)
        } else {
            write!(f, "{}[{}]", self.recipe, self.pattern)
        }
    }
}

/// Translate a user pattern into the glob syntax of the matcher
pub fn translate(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 8);
    let mut previous = None;
    for c in pattern.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            ']' => escaped.push_str("[]]"),
            // `**` means something else to the glob engine; one star is equivalent
            '*' if previous == Some('*') => {}
            _ => escaped.push(c),
        }
        previous = Some(c);
    }

    BRACE_RANGE.replace_all(&escaped, "[${1}]").into_owned()
}

/// A compiled file-name pattern
#[derive(Debug, Clone)]
pub struct FilePattern {
    source: String,
    glob: Pattern,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self, RecipeError> {
        let translated = translate(pattern);
        let glob = Pattern::new(&translated).map_err(|e| RecipeError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            glob,
        })
    }

    /// Pattern as the user wrote it
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Pattern as handed to the glob engine
    pub fn as_glob(&self) -> &str {
        self.glob.as_str()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.source == MATCH_ALL || self.glob.matches_with(name, MATCH_OPTIONS)
    }
}

/// Lazily select the files of `recipe` whose composed name matches `pattern`
///
/// Enumeration errors pass through so the caller sees them in order.
pub fn match_files<'a>(
    recipe: &'a Recipe,
    pattern: &str,
) -> Result<impl Iterator<Item = Result<FileSpec, RecipeError>> + 'a, RecipeError> {
    let pattern = FilePattern::new(pattern)?;
    tracing::debug!(
        recipe = %recipe.name,
        pattern = pattern.as_str(),
        glob = pattern.as_glob(),
        "Matching recipe files"
    );

    Ok(iter_files(recipe).filter(move |item| match item {
        Ok(spec) => pattern.matches(&spec.name),
        Err(_) => true,
    }))
}

/// Collect the files of `recipe` selected by `pattern`
pub fn resolve_files(recipe: &Recipe, pattern: &str) -> Result<Vec<FileSpec>, RecipeError> {
    match_files(recipe, pattern)?.collect()
}
