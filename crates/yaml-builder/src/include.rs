//! Merging of included documents
//!
//! Every document named by one `!include` is classified, then all of them are
//! combined: sequences are appended as elements of a new sequence, mappings are
//! merged into a new mapping with later files winning. Scalars cannot be merged.

use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::PathBuf;

use crate::error::{ComposeError, ComposeResult};

/// Shape of an included document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Sequence,
    Mapping,
    Scalar,
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncludeKind::Sequence => write!(f, "sequence"),
            IncludeKind::Mapping => write!(f, "mapping"),
            IncludeKind::Scalar => write!(f, "scalar"),
        }
    }
}

/// A loaded include, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeResult {
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Scalar(Value),
}

impl IncludeResult {
    pub fn kind(&self) -> IncludeKind {
        match self {
            IncludeResult::Sequence(_) => IncludeKind::Sequence,
            IncludeResult::Mapping(_) => IncludeKind::Mapping,
            IncludeResult::Scalar(_) => IncludeKind::Scalar,
        }
    }
}

impl From<Value> for IncludeResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Sequence(seq) => IncludeResult::Sequence(seq),
            Value::Mapping(map) => IncludeResult::Mapping(map),
            // Tags are resolved before a document is returned, so only plain scalars land here
            other => IncludeResult::Scalar(other),
        }
    }
}

/// Merge included documents, given in file order with the path each came from.
///
/// A single include goes through the same path as a list: one sequence
/// document `[1, 2]` becomes `[[1, 2]]`, one mapping is copied.
pub fn merge_includes(included: Vec<(PathBuf, IncludeResult)>) -> ComposeResult<Value> {
    let first = match included.first() {
        Some((_, result)) => result.kind(),
        None => return Err(ComposeError::EmptyInclude),
    };

    if let Some((path, result)) = included.iter().find(|(_, r)| r.kind() != first) {
        return Err(ComposeError::MixedIncludeType {
            first,
            found: result.kind(),
            path: path.clone(),
        });
    }

    match first {
        IncludeKind::Sequence => {
            let mut merged = Vec::with_capacity(included.len());
            for (_, result) in included {
                if let IncludeResult::Sequence(seq) = result {
                    merged.push(Value::Sequence(seq));
                }
            }
            Ok(Value::Sequence(merged))
        }
        IncludeKind::Mapping => {
            let mut merged = Mapping::new();
            for (_, result) in included {
                if let IncludeResult::Mapping(map) = result {
                    for (k, v) in map {
                        merged.insert(k, v);
                    }
                }
            }
            Ok(Value::Mapping(merged))
        }
        IncludeKind::Scalar => {
            let (path, _) = included.into_iter().next().ok_or(ComposeError::EmptyInclude)?;
            Err(ComposeError::UnsupportedIncludeResultType { path })
        }
    }
}
