//! Composable YAML loading
//!
//! This crate loads YAML documents with support for custom tags:
//!
//! - `!include path` / `!include [a, b]` - Include other YAML files and merge them
//! - `!import` - Alias of `!include`
//! - `!env VAR` - Environment variable substitution (null when unset)
//! - `!Ref`, `!Base64`, `!Cidr`, `!FindInMap`, `!GetAtt`, `!GetAZs`, `!ImportValue`,
//!   `!Join`, `!Select`, `!Split`, `!Sub`, `!Transform`, `!And`, `!Equals`, `!If`,
//!   `!Not`, `!Or` - CloudFormation intrinsics, rewritten to `{"Fn::<Name>": value}`
//!
//! Included lists are collected as a list of lists; included mappings are
//! merged with later files overriding earlier keys.
//!
//! # Example
//!
//! ```ignore
//! use yaml_builder::{load, load_file, LoaderOptions, Source};
//!
//! // Includes resolve relative to the file's directory
//! let template = load_file("stacks/main.yaml")?;
//!
//! // Or pick the resolution root explicitly
//! let options = LoaderOptions::new().with_root("stacks");
//! let template = load(&Source::text("Resources: !include resources.yaml"), &options)?;
//! ```

mod error;
mod include;
mod loader;
mod options;
mod tags;

pub use error::{ComposeError, ComposeResult};
pub use include::{merge_includes, IncludeKind, IncludeResult};
pub use loader::{from_file, from_str, load, load_file, load_str, ComposeLoader};
pub use options::{LoaderOptions, Source};
pub use tags::{CustomTag, TagTable, BUILTIN_FUNCTIONS, FUNCTION_PREFIX};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
