//! Error types for document loading

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::include::IncludeKind;

/// Result type for loading operations
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur while loading a document
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to resolve `<<` merge keys
    #[error("failed to apply merge keys in {path}: {source}")]
    MergeKeys {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Composed document does not match the requested type
    #[error("failed to deserialize {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Tag outside the registered set
    #[error("unknown tag '{tag}'")]
    UnknownTag { tag: String },

    /// Builtin function tag on a node that cannot be decoded
    #[error("malformed node for tag '{tag}'")]
    MalformedTag { tag: String },

    /// Tag operand has the wrong shape
    #[error("invalid value for tag '{tag}': {reason}")]
    InvalidTagValue { tag: String, reason: String },

    /// Include filename that is not a scalar
    #[error("invalid include path '{path}': {reason}")]
    InvalidIncludePath { path: String, reason: String },

    /// `!include []`
    #[error("include list is empty")]
    EmptyInclude,

    /// Included documents of different kinds
    #[error("found mixed data types in include: {path} is a {found}, expected a {first}")]
    MixedIncludeType {
        first: IncludeKind,
        found: IncludeKind,
        path: PathBuf,
    },

    /// Included document is a scalar and cannot be merged
    #[error("included file {path} is a scalar and cannot be merged")]
    UnsupportedIncludeResultType { path: PathBuf },

    /// Circular include detected
    #[error("circular include detected: {path}")]
    CircularInclude { path: PathBuf },
}

impl ComposeError {
    /// True when a file could not be opened because it does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ComposeError::ReadFile { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
