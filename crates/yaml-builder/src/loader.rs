//! YAML loader with custom tag support
//!
//! Supported tags:
//! - `!include file` / `!include [a, b]` - Include and merge other YAML files (`!import` is an alias)
//! - `!env VAR` - Environment variable substitution, null when unset
//! - `!Ref`, `!GetAtt`, `!Sub`, ... - CloudFormation intrinsics, rewritten to `{"Fn::<Name>": value}`

use crate::error::{ComposeError, ComposeResult};
use crate::include::{merge_includes, IncludeResult};
use crate::options::{LoaderOptions, Source};
use crate::tags::{CustomTag, TagTable};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that resolves `!include`, `!env` and builtin function tags
pub struct ComposeLoader {
    /// Base directory for resolving included filenames
    root: PathBuf,
    /// Registered tag handlers
    tags: TagTable,
    /// Apply `<<` merge keys after tag processing
    merge_keys: bool,
    /// Files currently being loaded, outermost first
    include_stack: Vec<PathBuf>,
}

impl ComposeLoader {
    /// Create a loader for `source`, deriving the root from the options or the source location
    pub fn new(options: &LoaderOptions, source: &Source) -> Self {
        Self {
            root: options.resolve_root(source),
            tags: TagTable::new(),
            merge_keys: options.merge_keys,
            include_stack: Vec::new(),
        }
    }

    /// Create a loader with an explicit root directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tags: TagTable::new(),
            merge_keys: true,
            include_stack: Vec::new(),
        }
    }

    /// Fresh loader for an included file, rooted at that file's directory
    fn for_include(&self, path: &Path) -> Self {
        Self {
            root: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            tags: TagTable::new(),
            merge_keys: self.merge_keys,
            include_stack: self.include_stack.clone(),
        }
    }

    /// Load a document from any source
    pub fn load(&mut self, source: &Source) -> ComposeResult<Value> {
        match source {
            Source::File(path) => self.load_file(path),
            Source::Text(content) => self.load_string(content, &source.display_path()),
        }
    }

    /// Load and process a YAML file. The path is opened as given; only
    /// filenames named by `!include` are resolved against the root.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ComposeResult<Value> {
        let path = path.as_ref();
        debug!("Loading YAML file: {:?}", path);

        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.include_stack.contains(&key) {
            return Err(ComposeError::CircularInclude {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ComposeError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.include_stack.push(key);
        let result = self.load_string(&content, path);
        self.include_stack.pop();

        result
    }

    /// Load and process YAML from a string; `source_path` is only used in errors
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ComposeResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ComposeError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        let mut value = self.process_value(value)?;

        if self.merge_keys {
            value.apply_merge().map_err(|e| ComposeError::MergeKeys {
                path: source_path.to_path_buf(),
                source: e,
            })?;
        }

        Ok(value)
    }

    /// Process a YAML value, handling custom tags
    fn process_value(&mut self, value: Value) -> ComposeResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged),
            Value::Mapping(map) => {
                let mut result = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    let processed_key = self.process_value(k)?;
                    let processed_value = self.process_value(v)?;
                    result.insert(processed_key, processed_value);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ComposeResult<Vec<Value>> =
                    seq.into_iter().map(|v| self.process_value(v)).collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    /// Dispatch a tagged value to its handler
    fn process_tagged(&mut self, tagged: serde_yaml::value::TaggedValue) -> ComposeResult<Value> {
        let tag = tagged.tag.to_string();
        let value = tagged.value;

        trace!("Processing tag '{}' with value {:?}", tag, value);

        // Non-specific `!` tag: scalars read as strings, collections as untagged
        if tag.trim_start_matches('!').is_empty() {
            return match value {
                Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
                    self.process_value(value)
                }
                scalar => Ok(Value::String(scalar_to_string(&scalar).unwrap_or_default())),
            };
        }

        match self.tags.get(&tag) {
            Some(CustomTag::Include) => self.process_include(value),
            Some(CustomTag::Env) => self.process_env(&tag, value),
            Some(CustomTag::Builtin(name)) => self.process_builtin(&tag, name, value),
            None => Err(ComposeError::UnknownTag { tag }),
        }
    }

    /// Process !include / !import
    fn process_include(&mut self, value: Value) -> ComposeResult<Value> {
        let names = match value {
            Value::Sequence(seq) => seq
                .iter()
                .map(include_name)
                .collect::<ComposeResult<Vec<_>>>()?,
            other => vec![include_name(&other)?],
        };

        let mut included = Vec::with_capacity(names.len());
        for name in names {
            let path = self.resolve_path(&name);
            debug!("Including file: {:?}", path);
            let document = self.for_include(&path).load_file(&path)?;
            included.push((path, IncludeResult::from(document)));
        }

        merge_includes(included)
    }

    /// Process !env; an unset variable yields null
    fn process_env(&self, tag: &str, value: Value) -> ComposeResult<Value> {
        if value.is_null() {
            debug!("Env var with no name, substituting null");
            return Ok(Value::Null);
        }

        let var_name = scalar_to_string(&value).ok_or_else(|| ComposeError::InvalidTagValue {
            tag: tag.to_string(),
            reason: "environment variable name must be a scalar".to_string(),
        })?;

        match std::env::var(&var_name) {
            Ok(env_value) => {
                debug!("Substituted env var: {}", var_name);
                Ok(Value::String(env_value))
            }
            Err(_) => {
                debug!("Env var {} not set, substituting null", var_name);
                Ok(Value::Null)
            }
        }
    }

    /// Process a builtin function tag into `{"Fn::<name>": content}`
    fn process_builtin(&mut self, tag: &str, name: &str, value: Value) -> ComposeResult<Value> {
        let content = match value {
            Value::Tagged(_) => {
                return Err(ComposeError::MalformedTag {
                    tag: tag.to_string(),
                })
            }
            Value::Sequence(_) | Value::Mapping(_) => self.process_value(value)?,
            // Scalars are passed on as text; a bare tag becomes ""
            scalar => Value::String(scalar_to_string(&scalar).unwrap_or_default()),
        };

        let mut wrapped = Mapping::with_capacity(1);
        wrapped.insert(Value::String(CustomTag::function_key(name)), content);
        Ok(Value::Mapping(wrapped))
    }

    /// Resolve an included filename against the root
    fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Get the resolution root
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn include_name(value: &Value) -> ComposeResult<String> {
    scalar_to_string(value).ok_or_else(|| ComposeError::InvalidIncludePath {
        path: format!("{:?}", value),
        reason: "path must be a scalar".to_string(),
    })
}

/// Load a document with the given options
pub fn load(source: &Source, options: &LoaderOptions) -> ComposeResult<Value> {
    ComposeLoader::new(options, source).load(source)
}

/// Load a YAML file, resolving includes relative to its directory
pub fn load_file(path: impl AsRef<Path>) -> ComposeResult<Value> {
    let source = Source::file(path.as_ref());
    load(&source, &LoaderOptions::default())
}

/// Load a YAML string, resolving includes relative to the current directory
pub fn load_str(content: &str) -> ComposeResult<Value> {
    load(&Source::text(content), &LoaderOptions::default())
}

/// Load a YAML file and deserialize the composed document
pub fn from_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> ComposeResult<T> {
    let path = path.as_ref();
    let value = load_file(path)?;
    serde_yaml::from_value(value).map_err(|e| ComposeError::Deserialize {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load a YAML string and deserialize the composed document
pub fn from_str<T: DeserializeOwned>(content: &str) -> ComposeResult<T> {
    let source = Source::text(content);
    let value = load(&source, &LoaderOptions::default())?;
    serde_yaml::from_value(value).map_err(|e| ComposeError::Deserialize {
        path: source.display_path(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::BUILTIN_FUNCTIONS;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn yaml(content: &str) -> Value {
        serde_yaml::from_str(content).unwrap()
    }

    #[test]
    fn test_load_simple_yaml() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "config.yaml",
            r#"
key: value
number: 42
list:
  - one
  - two
"#,
        );

        let value = load_file(dir.path().join("config.yaml")).unwrap();
        assert!(value.is_mapping());
        assert_eq!(value["number"].as_i64(), Some(42));
    }

    #[test]
    fn test_include() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "included.yaml",
            "included_key: included_value\n",
        );
        write_file(
            dir.path(),
            "config.yaml",
            "main_key: main_value\nincluded: !include included.yaml\n",
        );

        let value = load_file(dir.path().join("config.yaml")).unwrap();
        assert_eq!(value["included"], yaml("included_key: included_value"));
    }

    #[test]
    fn test_import_is_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "x: 1\n");
        write_file(
            dir.path(),
            "config.yaml",
            "one: !include a.yaml\ntwo: !import a.yaml\n",
        );

        let value = load_file(dir.path().join("config.yaml")).unwrap();
        assert_eq!(value["one"], value["two"]);
    }

    #[test]
    fn test_include_from_text_with_root() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "x: 1\n");

        let options = LoaderOptions::new().with_root(dir.path());
        let value = load(&Source::text("a: !include a.yaml\n"), &options).unwrap();
        assert_eq!(value["a"]["x"].as_i64(), Some(1));
    }

    #[test]
    fn test_include_bad_path_node() {
        let result = load_str("a: !include {file: a.yaml}\n");
        assert!(matches!(
            result,
            Err(ComposeError::InvalidIncludePath { .. })
        ));
    }

    #[test]
    fn test_empty_include_list() {
        let result = load_str("a: !include []\n");
        assert!(matches!(result, Err(ComposeError::EmptyInclude)));
    }

    #[test]
    fn test_env_var() {
        std::env::set_var("TEST_YAML_BUILDER_LOADER_VAR", "env_value");

        let value = load_str("from_env: !env TEST_YAML_BUILDER_LOADER_VAR\n").unwrap();
        assert_eq!(value["from_env"].as_str(), Some("env_value"));

        std::env::remove_var("TEST_YAML_BUILDER_LOADER_VAR");
    }

    #[test]
    fn test_env_var_missing_is_null() {
        let value = load_str("from_env: !env TEST_YAML_BUILDER_NEVER_SET\n").unwrap();
        assert!(value["from_env"].is_null());
    }

    #[test]
    fn test_env_var_without_name_is_null() {
        let value = load_str("from_env: !env\n").unwrap();
        assert!(value["from_env"].is_null());
    }

    #[test]
    fn test_env_var_requires_scalar() {
        let result = load_str("from_env: !env [A, B]\n");
        assert!(matches!(result, Err(ComposeError::InvalidTagValue { .. })));
    }

    #[test]
    fn test_builtin_scalar() {
        let value = load_str("bucket: !Ref MyBucket\n").unwrap();
        assert_eq!(value["bucket"], yaml("Fn::Ref: MyBucket"));
    }

    #[test]
    fn test_builtin_scalar_is_text() {
        let value = load_str("azs: !GetAZs\nport: !Ref 8080\nflag: !Ref true\nnone: !Ref ~\n")
            .unwrap();
        assert_eq!(value["azs"]["Fn::GetAZs"].as_str(), Some(""));
        assert_eq!(value["port"]["Fn::Ref"].as_str(), Some("8080"));
        assert_eq!(value["flag"]["Fn::Ref"].as_str(), Some("true"));
        assert_eq!(value["none"]["Fn::Ref"].as_str(), Some(""));
    }

    #[test]
    fn test_builtin_sequence_keeps_types() {
        let value = load_str("az: !Select [0, !GetAZs \"\"]\n").unwrap();
        let args = value["az"]["Fn::Select"].as_sequence().unwrap();
        assert_eq!(args[0].as_i64(), Some(0));
        assert_eq!(args[1], yaml("Fn::GetAZs: \"\""));
    }

    #[test]
    fn test_non_specific_tag() {
        let value = load_str("a: ! 12\nb: ! [1, !Ref X]\n").unwrap();
        assert_eq!(value["a"].as_str(), Some("12"));
        assert_eq!(value["b"], yaml("- 1\n- Fn::Ref: X\n"));
    }

    #[test]
    fn test_every_builtin_rewrites() {
        for name in BUILTIN_FUNCTIONS {
            let value = load_str(&format!("v: !{name} [a, b]\n")).unwrap();
            let expected = yaml(&format!("Fn::{name}: [a, b]"));
            assert_eq!(value["v"], expected, "tag !{name}");
        }
    }

    #[test]
    fn test_builtin_mapping() {
        let value = load_str(
            r#"
v: !Transform
  Name: "AWS::Include"
  Parameters:
    Location: s3://bucket/snippet.yaml
"#,
        )
        .unwrap();
        assert_eq!(
            value["v"],
            yaml(
                r#"
Fn::Transform:
  Name: "AWS::Include"
  Parameters:
    Location: s3://bucket/snippet.yaml
"#
            )
        );
    }

    #[test]
    fn test_nested_builtins_resolve_inside_out() {
        let value = load_str(
            r#"
url: !Join ["", ["https://", !GetAtt [Site, DomainName], "/", !Ref Path]]
"#,
        )
        .unwrap();

        let expected = yaml(
            r#"
Fn::Join:
  - ""
  - - "https://"
    - Fn::GetAtt: [Site, DomainName]
    - "/"
    - Fn::Ref: Path
"#,
        );
        assert_eq!(value["url"], expected);
    }

    #[test]
    fn test_builtin_with_env_inside() {
        std::env::set_var("TEST_YAML_BUILDER_STAGE", "prod");

        let value = load_str("name: !Sub [\"app-${Stage}\", {Stage: !env TEST_YAML_BUILDER_STAGE}]\n")
            .unwrap();
        assert_eq!(value["name"], yaml("Fn::Sub: [\"app-${Stage}\", {Stage: prod}]"));

        std::env::remove_var("TEST_YAML_BUILDER_STAGE");
    }

    #[test]
    fn test_unknown_tag() {
        let result = load_str("password: !secret my_password\n");
        match result {
            Err(ComposeError::UnknownTag { tag }) => assert_eq!(tag, "!secret"),
            other => panic!("expected UnknownTag, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let result = load_str("key: [unclosed\n");
        assert!(matches!(result, Err(ComposeError::ParseYaml { .. })));
    }

    #[test]
    fn test_merge_keys_over_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "defaults.yaml", "timeout: 30\nmemory: 128\n");
        write_file(
            dir.path(),
            "config.yaml",
            "function:\n  <<: !include defaults.yaml\n  memory: 512\n",
        );

        let value = load_file(dir.path().join("config.yaml")).unwrap();
        assert_eq!(value["function"], yaml("memory: 512\ntimeout: 30"));
    }

    #[test]
    fn test_merge_keys_disabled() {
        let options = LoaderOptions::new().with_merge_keys(false);
        let value = load(&Source::text("a:\n  <<: {x: 1}\n"), &options).unwrap();
        assert!(value["a"].as_mapping().unwrap().contains_key("<<"));
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "include_b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "include_a: !include a.yaml\n");

        let result = load_file(dir.path().join("a.yaml"));
        assert!(matches!(result, Err(ComposeError::CircularInclude { .. })));
    }

    #[test]
    fn test_self_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "me: !include a.yaml\n");

        let result = load_file(dir.path().join("a.yaml"));
        assert!(matches!(result, Err(ComposeError::CircularInclude { .. })));
    }

    #[test]
    fn test_same_file_twice_is_not_a_cycle() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "x: 1\n");
        write_file(
            dir.path(),
            "config.yaml",
            "both: !include [a.yaml, a.yaml]\nagain: !include a.yaml\n",
        );

        let value = load_file(dir.path().join("config.yaml")).unwrap();
        assert_eq!(value["both"], yaml("x: 1"));
        assert_eq!(value["again"], yaml("x: 1"));
    }

    #[test]
    fn test_typed_load() {
        #[derive(serde::Deserialize)]
        struct Stack {
            name: String,
            bucket: Value,
        }

        let stack: Stack = from_str("name: demo\nbucket: !Ref Bucket\n").unwrap();
        assert_eq!(stack.name, "demo");
        assert_eq!(stack.bucket, yaml("Fn::Ref: Bucket"));
    }

    #[test]
    fn test_typed_load_mismatch() {
        let result: ComposeResult<Vec<String>> = from_str("a: 1\n");
        assert!(matches!(result, Err(ComposeError::Deserialize { .. })));
    }
}
