//! Framework identity declared by a manifest

use std::fmt;

use serde::{Deserialize, Serialize};

/// A deep-learning framework a model was built for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameworkManifest {
    /// Framework name, e.g. `Caffe2`
    pub name: String,
    /// Framework version, e.g. `0.8.1`; empty or `*` matches any version
    #[serde(default, deserialize_with = "version_string")]
    pub version: String,
}

impl FrameworkManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Lowercase `name:version` key
    #[must_use]
    pub fn canonical_name(&self) -> String {
        format!(
            "{}:{}",
            self.name.trim().to_lowercase(),
            self.version.trim()
        )
    }

    /// Whether a manifest asking for `other` can run on this framework
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if !self.name.trim().eq_ignore_ascii_case(other.name.trim()) {
            return false;
        }
        let wanted = other.version.trim();
        wanted.is_empty() || wanted == "*" || wanted == self.version.trim()
    }
}

impl fmt::Display for FrameworkManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Versions such as `1.0` are read by YAML as floats
pub(crate) fn version_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a version string, got {other:?}"
            )));
        },
    })
}
