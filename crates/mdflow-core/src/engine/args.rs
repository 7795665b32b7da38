use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgError {
    #[error("Missing required argument \"{key}\"")]
    Missing { key: String },

    #[error("Argument \"{key}\" has wrong type (expected {expected})")]
    WrongType { key: String, expected: &'static str },

    #[error("Argument bundle must be a mapping, found {found}")]
    NotAMapping { found: &'static str },
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

/// The keyword-style argument bundle of one plugin entry invocation.
///
/// Wraps the YAML mapping given in the workflow `sequence` and exposes
/// typed accessors. The `strict` key is reserved: it controls the
/// error-handling policy of the invocation (see `Plugin::execute`) and
/// defaults to `true`.
#[derive(Debug, Clone, Default)]
pub struct ArgBundle {
    map: Mapping,
}

impl ArgBundle {
    /// Builds a bundle from a command value. `null` means "no arguments".
    pub fn new(value: Value) -> Result<Self, ArgError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(map) => Ok(Self { map }),
            other => Err(ArgError::NotAMapping {
                found: kind(&other),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(Value::String(key.to_string()))
    }

    pub fn require(&self, key: &str) -> Result<&Value, ArgError> {
        self.get(key).ok_or_else(|| ArgError::Missing {
            key: key.to_string(),
        })
    }

    pub fn str(&self, key: &str) -> Result<&str, ArgError> {
        self.require(key)?.as_str().ok_or(ArgError::WrongType {
            key: key.to_string(),
            expected: "string",
        })
    }

    pub fn str_or(&self, key: &str, default: &'static str) -> Result<&str, ArgError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.as_str().ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn path(&self, key: &str) -> Result<PathBuf, ArgError> {
        Ok(PathBuf::from(self.str(key)?))
    }

    pub fn path_opt(&self, key: &str) -> Result<Option<PathBuf>, ArgError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let s = value.as_str().ok_or(ArgError::WrongType {
                    key: key.to_string(),
                    expected: "string",
                })?;
                Ok(Some(PathBuf::from(s)))
            }
        }
    }

    pub fn bool(&self, key: &str) -> Result<bool, ArgError> {
        self.require(key)?.as_bool().ok_or(ArgError::WrongType {
            key: key.to_string(),
            expected: "bool",
        })
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ArgError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "bool",
            }),
        }
    }

    pub fn u64(&self, key: &str) -> Result<u64, ArgError> {
        self.require(key)?.as_u64().ok_or(ArgError::WrongType {
            key: key.to_string(),
            expected: "unsigned integer",
        })
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, ArgError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.as_u64().ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "unsigned integer",
            }),
        }
    }

    pub fn f64(&self, key: &str) -> Result<f64, ArgError> {
        self.require(key)?.as_f64().ok_or(ArgError::WrongType {
            key: key.to_string(),
            expected: "float",
        })
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ArgError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "float",
            }),
        }
    }

    pub fn seq(&self, key: &str) -> Result<&[Value], ArgError> {
        self.require(key)?
            .as_sequence()
            .map(Vec::as_slice)
            .ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "sequence",
            })
    }

    /// A nested argument bundle, e.g. the `analysis` sub-configuration.
    pub fn bundle_opt(&self, key: &str) -> Result<Option<ArgBundle>, ArgError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Mapping(map)) => Ok(Some(ArgBundle { map: map.clone() })),
            Some(_) => Err(ArgError::WrongType {
                key: key.to_string(),
                expected: "mapping",
            }),
        }
    }

    /// A mapping from particle type to float, e.g. per-type masses.
    pub fn f64_by_type(&self, key: &str) -> Result<HashMap<u32, f64>, ArgError> {
        let map = self.require(key)?.as_mapping().ok_or(ArgError::WrongType {
            key: key.to_string(),
            expected: "mapping",
        })?;

        let mut result = HashMap::with_capacity(map.len());
        for (type_key, value) in map {
            let particle_type = type_key.as_u64().ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "unsigned integer keys",
            })? as u32;
            let number = value.as_f64().ok_or(ArgError::WrongType {
                key: key.to_string(),
                expected: "float values",
            })?;
            result.insert(particle_type, number);
        }
        Ok(result)
    }

    /// The per-invocation error-handling policy. Defaults to strict.
    pub fn strict(&self) -> bool {
        self.get("strict").and_then(Value::as_bool).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(yaml: &str) -> ArgBundle {
        ArgBundle::new(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn null_bundle_is_empty() {
        let args = ArgBundle::new(Value::Null).unwrap();
        assert!(args.get("anything").is_none());
        assert!(args.strict());
    }

    #[test]
    fn scalar_bundle_is_rejected() {
        assert!(matches!(
            ArgBundle::new(Value::from(3)),
            Err(ArgError::NotAMapping { found: "number" })
        ));
    }

    #[test]
    fn typed_accessors_enforce_types() {
        let args = bundle("steps: 100\nname: run\n");
        assert_eq!(args.u64("steps").unwrap(), 100);
        assert_eq!(args.str("name").unwrap(), "run");
        assert!(matches!(
            args.u64("name"),
            Err(ArgError::WrongType { .. })
        ));
        assert!(matches!(args.f64("missing"), Err(ArgError::Missing { .. })));
    }

    #[test]
    fn defaults_apply_only_when_absent() {
        let args = bundle("pipelined: true\n");
        assert!(args.bool_or("pipelined", false).unwrap());
        assert_eq!(args.u64_or("skip_steps", 0).unwrap(), 0);
    }

    #[test]
    fn strict_defaults_to_true_and_honors_override() {
        assert!(bundle("a: 1\n").strict());
        assert!(!bundle("strict: false\n").strict());
    }

    #[test]
    fn masses_parse_as_type_map() {
        let args = bundle("masses:\n  1: 238.03\n  2: 131.29\n");
        let masses = args.f64_by_type("masses").unwrap();
        assert_eq!(masses.len(), 2);
        assert!((masses[&1] - 238.03).abs() < 1e-12);
    }
}
