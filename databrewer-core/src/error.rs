//! Error types for the recipe engine, catalog index and transfers
//!
//! Each layer has its own enum so callers can branch on the failure kind;
//! [`BrewerError`] aggregates them for code that drives a whole command.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Recipe loading, enumeration and matching errors
#[derive(Error, Debug)]
pub enum RecipeError {
    /// A recipe file or directory could not be read
    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A recipe document is not valid YAML or does not have the recipe shape
    #[error("Failed to parse recipe {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// A recipe has an empty name
    #[error("Recipe {path} has an empty name")]
    MissingName { path: PathBuf },

    /// A file entry declares both `url` and nested `files`
    #[error("File entry '{name}' declares both 'url' and 'files'")]
    AmbiguousNode { name: String },

    /// Neither an explicit filename nor the URL path gives a filename
    #[error("Could not find filename for '{url}'")]
    FilenameDerivation { url: String },

    /// A filename that would place the file outside its dataset directory
    #[error("Unsafe filename '{filename}': must be a plain file name")]
    UnsafeFilename { filename: String },

    /// The translated glob pattern was rejected by the matcher
    #[error("Invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Catalog index and lookup errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The index has never been populated
    #[error("Index is empty. Run 'databrewer update'")]
    Empty,

    /// No recipe with the given name is indexed
    #[error("Recipe '{0}' not found")]
    RecipeNotFound(String),

    /// A name-spec selected no files
    #[error("File '{0}' not found")]
    FileNotFound(String),

    /// Reading or writing the index failed
    #[error("Failed to access index at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A recipe could not be encoded for storage
    #[error("Failed to encode recipe '{id}'")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The stored index or a stored recipe could not be decoded
    #[error("Index at {path} is corrupted")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The default recipes archive could not be unpacked
    #[error("Failed to extract recipes archive {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Broad category of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not connect, or the connection dropped or timed out
    Connection,
    /// The server answered with a non-success status
    Status(u16),
    /// The server spoke something we could not follow
    Protocol,
    /// Local I/O while receiving the body
    Io,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connection => write!(f, "connection error"),
            TransportErrorKind::Status(code) => write!(f, "status {code}"),
            TransportErrorKind::Protocol => write!(f, "protocol error"),
            TransportErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

/// Download errors
#[derive(Error, Debug)]
pub enum TransferError {
    /// The recipe forbids automated downloads
    #[error("Dataset '{0}' is restricted and cannot be downloaded automatically")]
    Restricted(String),

    /// The URL scheme is not one of http, https, ftp
    #[error("Unsupported URL scheme '{scheme}': {url}")]
    UnsupportedScheme { scheme: String, url: String },

    /// The URL is not fully qualified
    #[error("Fully qualified URL required: {url}")]
    InvalidUrl { url: String },

    /// Network or protocol failure
    #[error("Failed to fetch {url} ({kind}): {message}")]
    Transport {
        url: String,
        kind: TransportErrorKind,
        message: String,
    },

    /// Writing the destination failed
    #[error("Failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file of a batch failed; the rest of the batch was not attempted
    #[error("Failed to download '{file}'")]
    Failed {
        file: String,
        #[source]
        source: Box<TransferError>,
    },

    /// The batch was interrupted before it completed
    #[error("Download interrupted")]
    Interrupted,
}

impl TransferError {
    /// Transport failure kind, looking through [`TransferError::Failed`]
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            TransferError::Transport { kind, .. } => Some(*kind),
            TransferError::Failed { source, .. } => source.transport_kind(),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The rc file exists but could not be read
    #[error("Failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rc file is not valid YAML or has unknown keys
    #[error("Failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// A configured directory could not be created
    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Settings could not be rendered
    #[error("Failed to serialize configuration")]
    Dump(#[source] serde_yaml_ng::Error),

    /// No home directory to resolve `~` against
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Any databrewer error
#[derive(Error, Debug)]
pub enum BrewerError {
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, BrewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_through_failed() {
        let inner = TransferError::Transport {
            url: "http://x/a.gz".to_string(),
            kind: TransportErrorKind::Status(404),
            message: "HTTP 404 Not Found".to_string(),
        };
        let err = TransferError::Failed {
            file: "a".to_string(),
            source: Box::new(inner),
        };

        assert_eq!(err.transport_kind(), Some(TransportErrorKind::Status(404)));
        assert_eq!(TransferError::Interrupted.transport_kind(), None);
    }

    #[test]
    fn test_empty_index_message_names_update() {
        assert!(CatalogError::Empty.to_string().contains("databrewer update"));
    }
}
