//! Argument validation
//!
//! Checks a raw argument bag against a [`ToolDescriptor`]: required
//! parameters must be present with their declared kind. Optional parameters
//! that are absent, or present with the wrong kind, receive their declared
//! default. Undeclared arguments are dropped. Nothing is coerced.

use super::tools::ToolDescriptor;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Arguments must be a JSON object")]
    NotAnObject,

    #[error("Missing required parameter: {0}")]
    Missing(String),

    #[error("Invalid parameter '{name}': expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },

    #[error("Invalid arguments: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Name of the offending parameter, if one is known
    pub fn param(&self) -> Option<&str> {
        match self {
            ValidationError::Missing(name) => Some(name),
            ValidationError::WrongType { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Argument bag that passed validation, defaults filled in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Decode into a typed per-tool argument record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

/// Whole-number view of a numeric argument, truncated and clamped into
/// `min..=max`. JSON numbers arrive as `f64`, so `10.0` and `5e9` are both
/// legal inputs here.
pub fn clamp_count(value: f64, min: u32, max: u32) -> u32 {
    if value.is_nan() {
        return min;
    }
    value.trunc().clamp(f64::from(min), f64::from(max)) as u32
}

/// `deserialize_with` adapters for numeric arguments. Each accepts any JSON
/// number and clamps it into the range the upstream API understands.
pub mod count {
    use super::clamp_count;
    use serde::{Deserialize, Deserializer};

    /// GitHub `per_page` and JIRA `maxResults`: `1..=100`
    pub fn page_size<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        f64::deserialize(d).map(|v| clamp_count(v, 1, 100))
    }

    /// JIRA `startAt`
    pub fn offset<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        f64::deserialize(d).map(|v| clamp_count(v, 0, u32::MAX))
    }

    /// Slack `limit`; the client applies its own ceiling
    pub fn limit<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        f64::deserialize(d).map(|v| clamp_count(v, 1, u32::MAX))
    }

    /// Google Calendar `maxResults`: `1..=2500`
    pub fn event_count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        f64::deserialize(d).map(|v| clamp_count(v, 1, 2500))
    }
}

/// Validate `args` against `descriptor`.
pub fn validate(
    descriptor: &ToolDescriptor,
    args: Option<Value>,
) -> Result<ValidatedArgs, ValidationError> {
    let mut raw = match args {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ValidationError::NotAnObject),
    };

    let mut validated = Map::new();
    for spec in &descriptor.params {
        match raw.remove(spec.name) {
            Some(value) if spec.kind.matches(&value) => {
                validated.insert(spec.name.to_string(), value);
            }
            Some(value) if spec.required && !value.is_null() => {
                return Err(ValidationError::WrongType {
                    name: spec.name.to_string(),
                    expected: spec.kind.as_str(),
                });
            }
            Some(value) if !value.is_null() => {
                debug!(
                    param = spec.name,
                    expected = spec.kind.as_str(),
                    "Ignoring optional argument of the wrong kind"
                );
                if let Some(ref default) = spec.default {
                    validated.insert(spec.name.to_string(), default.clone());
                }
            }
            _ if spec.required => {
                return Err(ValidationError::Missing(spec.name.to_string()));
            }
            _ => {
                if let Some(ref default) = spec.default {
                    validated.insert(spec.name.to_string(), default.clone());
                }
            }
        }
    }

    Ok(ValidatedArgs(validated))
}
