//! Manifest parameter value
//!
//! Manifests written for the agent store parameters either as bare YAML
//! values (`dimensions: [3, 224, 224]`) or wrapped in a single-key mapping
//! (`dimensions: { value: [3, 224, 224] }`). Older manifests also carry
//! lists as strings (`mean: "[104, 117, 123]"`). All three forms collapse
//! into the same `ParameterValue`.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// A single manifest parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct ParameterValue(Value);

impl ParameterValue {
    /// Wrap a raw YAML value
    pub fn new(value: impl Into<Value>) -> Self {
        Self::from(value.into())
    }

    /// Get the underlying YAML value
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Get the value as a string, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Get the value as a float, accepting numeric strings
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        number_of(&self.0)
    }

    /// Get the value as a boolean, accepting `"true"`/`"false"` strings
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match &self.0 {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a list of floats
    ///
    /// Accepts a YAML sequence of numbers or a string holding one.
    #[must_use]
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        match &self.0 {
            Value::Sequence(items) => items.iter().map(number_of).collect(),
            Value::String(s) => match serde_yaml::from_str::<Value>(s).ok()? {
                Value::Sequence(items) => items.iter().map(number_of).collect(),
                _ => None,
            },
            _ => None,
        }
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<Value> for ParameterValue {
    fn from(value: Value) -> Self {
        if let Value::Mapping(map) = &value {
            if map.len() == 1 {
                if let Some(inner) = map.get("value") {
                    return Self(inner.clone());
                }
            }
        }
        Self(value)
    }
}

impl From<ParameterValue> for Value {
    fn from(param: ParameterValue) -> Self {
        param.0
    }
}
