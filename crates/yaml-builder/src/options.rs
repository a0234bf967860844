//! Loader options
//!
//! Can be built in code or deserialized from a host application's own
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input to a load: a file on disk or an in-memory document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Document read from a file; its directory becomes the default root
    File(PathBuf),
    /// Document text with no location of its own
    Text(String),
}

impl Source {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn text(content: impl Into<String>) -> Self {
        Source::Text(content.into())
    }

    /// Directory of a file source, `None` for text
    pub fn dir(&self) -> Option<&Path> {
        match self {
            Source::File(path) => Some(path.parent().unwrap_or_else(|| Path::new(""))),
            Source::Text(_) => None,
        }
    }

    /// Name used in error messages
    pub fn display_path(&self) -> PathBuf {
        match self {
            Source::File(path) => path.clone(),
            Source::Text(_) => PathBuf::from("<string>"),
        }
    }
}

/// Options controlling how a document is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderOptions {
    /// Directory used to resolve included filenames.
    /// Defaults to the directory of the loaded file, or `.` for text.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Resolve YAML `<<` merge keys after tags are processed
    #[serde(default = "default_merge_keys")]
    pub merge_keys: bool,
}

fn default_merge_keys() -> bool {
    true
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            root: None,
            merge_keys: default_merge_keys(),
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit resolution root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_merge_keys(mut self, merge_keys: bool) -> Self {
        self.merge_keys = merge_keys;
        self
    }

    /// Resolution root for a source: explicit root, then the source's
    /// directory, then the current directory
    pub fn resolve_root(&self, source: &Source) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }

        match source.dir() {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        }
    }
}
