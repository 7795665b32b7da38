use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Separator used to address nested mappings in a workflow state tree.
pub const KEY_SEPARATOR: char = '|';

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error reading state document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse state document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No such key \"{path}\"")]
    KeyNotFound { path: String },

    #[error("No handler registered for tag \"!{tag}\"")]
    UnknownTag { tag: String },

    #[error("Tag \"!{tag}\" applied to unsupported node: {message}")]
    InvalidTagOperand { tag: String, message: String },
}

/// A custom tag handler, invoked on the tagged node after parsing.
pub type TagHandler = fn(&Value) -> Result<Value, StateError>;

/// Registry of custom YAML tag handlers, consulted before a document is
/// accepted. Tags are registered without the leading `!`.
pub struct TagRegistry {
    handlers: HashMap<String, TagHandler>,
}

impl TagRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: &str, handler: TagHandler) {
        self.handlers
            .insert(tag.trim_start_matches('!').to_string(), handler);
    }

    pub fn get(&self, tag: &str) -> Option<&TagHandler> {
        self.handlers.get(tag.trim_start_matches('!'))
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("join", join_tag);
        registry
    }
}

/// Joins a sequence of scalars into a single filesystem path.
fn join_tag(value: &Value) -> Result<Value, StateError> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| StateError::InvalidTagOperand {
            tag: "join".to_string(),
            message: "expected a sequence of scalars".to_string(),
        })?;

    let mut path = PathBuf::new();
    for item in seq {
        let segment = match item {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(StateError::InvalidTagOperand {
                    tag: "join".to_string(),
                    message: format!("cannot join non-scalar segment: {:?}", other),
                });
            }
        };
        path.push(segment);
    }

    Ok(Value::String(path.to_string_lossy().into_owned()))
}

fn resolve_tags(value: Value, registry: &TagRegistry) -> Result<Value, StateError> {
    match value {
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            let name = tag.to_string();
            let name = name.trim_start_matches('!');
            let handler = registry.get(name).ok_or_else(|| StateError::UnknownTag {
                tag: name.to_string(),
            })?;
            let resolved = resolve_tags(value, registry)?;
            handler(&resolved)
        }
        Value::Sequence(seq) => {
            let mut resolved = Vec::with_capacity(seq.len());
            for item in seq {
                resolved.push(resolve_tags(item, registry)?);
            }
            Ok(Value::Sequence(resolved))
        }
        Value::Mapping(map) => {
            let mut resolved = Mapping::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key, resolve_tags(item, registry)?);
            }
            Ok(Value::Mapping(resolved))
        }
        scalar => Ok(scalar),
    }
}

/// The in-memory tree of one workflow document.
///
/// Keys are addressed by `|`-separated paths into nested mappings, e.g.
/// `simulation|average_steps`. Lookups and assignments never swallow errors:
/// a missing segment or an indexed non-mapping aborts the calling operation
/// with [`StateError::KeyNotFound`].
#[derive(Debug, Clone)]
pub struct WorkflowState {
    root: Value,
}

impl WorkflowState {
    /// Loads a YAML document from `path`, resolving custom tags with the
    /// default registry (`!join`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        Self::load_with_registry(path, &TagRegistry::default())
    }

    /// Loads a YAML document from `path`, resolving custom tags with the
    /// given registry. Unknown tags are load-time errors.
    pub fn load_with_registry<P: AsRef<Path>>(
        path: P,
        registry: &TagRegistry,
    ) -> Result<Self, StateError> {
        let text = fs::read_to_string(path)?;
        let raw: Value = serde_yaml::from_str(&text)?;
        let root = resolve_tags(raw, registry)?;
        Ok(Self { root })
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Looks up a `|`-separated key path.
    pub fn get(&self, key: &str) -> Result<&Value, StateError> {
        let mut node = &self.root;
        for segment in key.split(KEY_SEPARATOR) {
            node = node
                .as_mapping()
                .and_then(|map| map.get(Value::String(segment.to_string())))
                .ok_or_else(|| StateError::KeyNotFound {
                    path: key.to_string(),
                })?;
        }
        Ok(node)
    }

    /// Assigns `value` at a `|`-separated key path. Every segment except the
    /// last must already resolve to a mapping; the final key is inserted or
    /// overwritten.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), StateError> {
        let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let (last, parents) = segments.split_last().ok_or_else(|| StateError::KeyNotFound {
            path: key.to_string(),
        })?;

        let mut node = &mut self.root;
        for segment in parents {
            node = node
                .as_mapping_mut()
                .and_then(|map| map.get_mut(Value::String(segment.to_string())))
                .ok_or_else(|| StateError::KeyNotFound {
                    path: key.to_string(),
                })?;
        }

        node.as_mapping_mut()
            .ok_or_else(|| StateError::KeyNotFound {
                path: key.to_string(),
            })?
            .insert(Value::String(last.to_string()), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn state_from(yaml: &str) -> WorkflowState {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        WorkflowState::load(file.path()).unwrap()
    }

    #[test]
    fn get_descends_nested_mappings() {
        let state = state_from("a:\n  b:\n    c: 42\n");
        assert_eq!(state.get("a|b|c").unwrap(), &Value::from(42));
    }

    #[test]
    fn get_missing_segment_fails_with_key_not_found() {
        let state = state_from("a:\n  b: 1\n");
        let err = state.get("a|c").unwrap_err();
        assert!(matches!(err, StateError::KeyNotFound { path } if path == "a|c"));
    }

    #[test]
    fn get_through_scalar_fails_with_key_not_found() {
        let state = state_from("a: 1\n");
        assert!(matches!(
            state.get("a|b"),
            Err(StateError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn get_is_idempotent_until_set() {
        let mut state = state_from("a:\n  b: 1\n");
        assert_eq!(state.get("a|b").unwrap(), &Value::from(1));
        assert_eq!(state.get("a|b").unwrap(), &Value::from(1));
        state.set("a|b", Value::from(2)).unwrap();
        assert_eq!(state.get("a|b").unwrap(), &Value::from(2));
    }

    #[test]
    fn set_inserts_new_final_key() {
        let mut state = state_from("a: {}\n");
        state.set("a|fresh", Value::from("x")).unwrap();
        assert_eq!(state.get("a|fresh").unwrap(), &Value::from("x"));
    }

    #[test]
    fn set_missing_parent_fails() {
        let mut state = state_from("a: {}\n");
        assert!(matches!(
            state.set("b|c", Value::from(1)),
            Err(StateError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn join_tag_builds_a_path() {
        let state = state_from("dir: !join [/tmp, run, \"7\"]\n");
        assert_eq!(
            state.get("dir").unwrap(),
            &Value::from("/tmp/run/7".to_string())
        );
    }

    #[test]
    fn unknown_tag_fails_at_load_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"dir: !mystery [a, b]\n").unwrap();
        let err = WorkflowState::load(file.path()).unwrap_err();
        assert!(matches!(err, StateError::UnknownTag { tag } if tag == "mystery"));
    }
}
