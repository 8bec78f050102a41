//! Runtime configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults (everything under `~/.databrewer`)
//! 2. the rc file: `--rcfile`, else `$DATABREWERRC`, else `~/.databrewerrc`
//! 3. `DATABREWER_<KEY>` environment variables
//! 4. command-line overrides
//!
//! The result is an immutable [`Settings`] value with absolute paths.

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Environment variable naming an alternative rc file
pub const RC_ENV: &str = "DATABREWERRC";

/// Prefix of per-key environment overrides
pub const ENV_PREFIX: &str = "DATABREWER_";

/// Default rc file name, in the home directory
pub const DEFAULT_RC_FILE: &str = ".databrewerrc";

pub const DEFAULT_ROOT_DIR: &str = "~/.databrewer";

/// Archive of the community recipe collection
pub const DEFAULT_RECIPES_URL: &str =
    "https://github.com/rolando/databrewer-recipes/archive/master.tar.gz";

/// `recipes_dir` may be a single path or a list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(path) => vec![path],
            OneOrMany::Many(paths) => paths,
        }
    }
}

/// One configuration layer as written by the user
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    root_dir: Option<String>,
    datasets_dir: Option<String>,
    recipes_dir: Option<OneOrMany>,
    recipes_default_url: Option<String>,
}

impl RawSettings {
    fn merge(&mut self, other: RawSettings) {
        if other.root_dir.is_some() {
            self.root_dir = other.root_dir;
        }
        if other.datasets_dir.is_some() {
            self.datasets_dir = other.datasets_dir;
        }
        if other.recipes_dir.is_some() {
            self.recipes_dir = other.recipes_dir;
        }
        if other.recipes_default_url.is_some() {
            self.recipes_default_url = other.recipes_default_url;
        }
    }
}

/// Command-line overrides
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Explicit rc file; must exist
    pub rcfile: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub datasets_dir: Option<PathBuf>,
    /// Replaces the configured recipe directories when non-empty
    pub recipes_dir: Vec<PathBuf>,
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub root_dir: PathBuf,
    /// Always `<root_dir>/index`
    pub index_dir: PathBuf,
    pub datasets_dir: PathBuf,
    /// Searched in order; later directories override earlier recipes
    pub recipes_dir: Vec<PathBuf>,
    /// Default recipes archive; `None` disables bootstrapping
    pub recipes_default_url: Option<String>,
}

impl Settings {
    /// Directory the default recipes are extracted into
    pub fn default_recipes_dir(&self) -> PathBuf {
        self.root_dir.join("recipes")
    }

    /// Where the files of `recipe` are stored
    pub fn dataset_dir(&self, recipe: &str) -> PathBuf {
        self.datasets_dir.join(recipe)
    }

    /// Create the root, index and datasets directories
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.root_dir, &self.index_dir, &self.datasets_dir] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(ConfigError::Dump)
    }
}

/// Resolves [`Settings`] against a home directory and an environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    home: PathBuf,
    cwd: PathBuf,
    env: HashMap<String, String>,
}

impl ConfigLoader {
    pub fn new(home: PathBuf, cwd: PathBuf, env: HashMap<String, String>) -> Self {
        Self { home, cwd, env }
    }

    /// Loader for the current process
    pub fn from_process() -> Result<Self, ConfigError> {
        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or(ConfigError::NoHomeDir)?;
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?;

        Ok(Self::new(home, cwd, std::env::vars().collect()))
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Expand a leading `~` and make the path absolute
    pub fn expand(&self, path: &str) -> PathBuf {
        let expanded = if path == "~" {
            self.home.clone()
        } else if let Some(rest) = path.strip_prefix("~/") {
            self.home.join(rest)
        } else {
            PathBuf::from(path)
        };

        if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        }
    }

    /// The rc file to read, if any
    ///
    /// An explicit path is returned as-is. A `$DATABREWERRC` naming a
    /// missing file is ignored with a warning.
    pub fn rc_path(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return self.expand(&path.to_string_lossy());
        }

        if let Some(named) = self.var(RC_ENV).filter(|v| !v.is_empty()) {
            let path = self.expand(named);
            if path.exists() {
                return path;
            }
            warn!("Could not find '{}', using defaults", path.display());
        }

        self.home.join(DEFAULT_RC_FILE)
    }

    fn read_rc(&self, path: &Path) -> Result<RawSettings, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed: Option<RawSettings> =
            serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Loaded config file {}", path.display());
        Ok(parsed.unwrap_or_default())
    }

    fn env_layer(&self) -> RawSettings {
        let get = |key: &str| self.var(&format!("{ENV_PREFIX}{key}")).map(str::to_string);

        let recipes_dir = get("RECIPES_DIR")
            .filter(|v| !v.is_empty())
            .map(|v| {
                OneOrMany::Many(
                    std::env::split_paths(&v)
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect(),
                )
            });

        RawSettings {
            root_dir: get("ROOT_DIR").filter(|v| !v.is_empty()),
            datasets_dir: get("DATASETS_DIR").filter(|v| !v.is_empty()),
            recipes_dir,
            // An empty value is meaningful here: it disables bootstrapping
            recipes_default_url: get("RECIPES_DEFAULT_URL"),
        }
    }

    fn overrides_layer(overrides: &Overrides) -> RawSettings {
        let text = |p: &PathBuf| p.to_string_lossy().into_owned();
        RawSettings {
            root_dir: overrides.root_dir.as_ref().map(text),
            datasets_dir: overrides.datasets_dir.as_ref().map(text),
            recipes_dir: (!overrides.recipes_dir.is_empty())
                .then(|| OneOrMany::Many(overrides.recipes_dir.iter().map(text).collect())),
            recipes_default_url: None,
        }
    }

    /// Resolve the settings
    pub fn load(&self, overrides: &Overrides) -> Result<Settings, ConfigError> {
        let mut raw = RawSettings::default();

        let rc = self.rc_path(overrides.rcfile.as_deref());
        if rc.exists() {
            raw.merge(self.read_rc(&rc)?);
        } else if overrides.rcfile.is_some() {
            return Err(ConfigError::Invalid(format!(
                "config file {} does not exist",
                rc.display()
            )));
        }

        raw.merge(self.env_layer());
        raw.merge(Self::overrides_layer(overrides));

        self.resolve(raw)
    }

    fn resolve(&self, raw: RawSettings) -> Result<Settings, ConfigError> {
        let root_dir = self.expand(raw.root_dir.as_deref().unwrap_or(DEFAULT_ROOT_DIR));

        let datasets_dir = match raw.datasets_dir.as_deref() {
            Some(dir) => self.expand(dir),
            None => root_dir.join("datasets"),
        };

        let recipes_dir = match raw.recipes_dir {
            Some(dirs) => {
                let dirs = dirs.into_vec();
                if dirs.is_empty() {
                    return Err(ConfigError::Invalid(
                        "recipes_dir must name at least one directory".to_string(),
                    ));
                }
                dirs.iter().map(|d| self.expand(d)).collect()
            }
            None => vec![root_dir.join("recipes")],
        };

        let recipes_default_url = match raw.recipes_default_url {
            Some(url) if url.is_empty() => None,
            Some(url) => Some(url),
            None => Some(DEFAULT_RECIPES_URL.to_string()),
        };

        Ok(Settings {
            index_dir: root_dir.join("index"),
            root_dir,
            datasets_dir,
            recipes_dir,
            recipes_default_url,
        })
    }
}
