//! Custom tag registry
//!
//! Maps tag names to the handler that resolves them. The set is fixed:
//! `!include`/`!import`, `!env`, and one tag per CloudFormation intrinsic
//! function in [`BUILTIN_FUNCTIONS`].

use std::collections::HashMap;

/// CloudFormation intrinsic functions and condition operators rewritten to `Fn::<Name>`
pub const BUILTIN_FUNCTIONS: [&str; 17] = [
    "Ref",
    "Base64",
    "Cidr",
    "FindInMap",
    "GetAtt",
    "GetAZs",
    "ImportValue",
    "Join",
    "Select",
    "Split",
    "Sub",
    "Transform",
    "And",
    "Equals",
    "If",
    "Not",
    "Or",
];

/// Prefix of the key a builtin function tag is rewritten to
pub const FUNCTION_PREFIX: &str = "Fn::";

/// Handler selected for a custom tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomTag {
    /// `!include` / `!import`
    Include,
    /// `!env`
    Env,
    /// `!Ref`, `!GetAtt`, ...
    Builtin(&'static str),
}

impl CustomTag {
    /// Key a builtin is rewritten to, e.g. `Fn::Ref`
    pub fn function_key(name: &str) -> String {
        format!("{FUNCTION_PREFIX}{name}")
    }
}

/// Tag dispatch table, built once per loader
#[derive(Debug, Clone)]
pub struct TagTable {
    handlers: HashMap<String, CustomTag>,
}

impl TagTable {
    pub fn new() -> Self {
        let mut handlers = HashMap::with_capacity(BUILTIN_FUNCTIONS.len() + 3);
        handlers.insert("!include".to_string(), CustomTag::Include);
        handlers.insert("!import".to_string(), CustomTag::Include);
        handlers.insert("!env".to_string(), CustomTag::Env);

        for name in BUILTIN_FUNCTIONS {
            handlers.insert(format!("!{name}"), CustomTag::Builtin(name));
        }

        Self { handlers }
    }

    /// Look up the handler for a tag, including its leading `!`
    pub fn get(&self, tag: &str) -> Option<CustomTag> {
        self.handlers.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for TagTable {
    fn default() -> Self {
        Self::new()
    }
}
