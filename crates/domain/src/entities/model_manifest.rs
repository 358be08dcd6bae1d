//! Model manifest
//!
//! A manifest is the YAML description of a trained model: which framework it
//! runs on, the shape and normalization of its input, where its label list
//! lives and where to fetch the graph and weight files.
//!
//! ```yaml
//! name: SqueezeNet
//! version: 1.0
//! framework:
//!   name: Caffe2
//!   version: 0.8.1
//! inputs:
//!   - type: image
//!     parameters:
//!       dimensions: [3, 224, 224]
//!       mean: [104.0, 117.0, 123.0]
//! output:
//!   type: feature
//!   parameters:
//!     features_url: https://example.com/synset.txt
//! model:
//!   base_url: https://example.com/squeezenet/
//!   graph_path: model.onnx
//!   weights_path: model.onnx
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::framework::version_string;
use crate::value_objects::{
    ChannelOrder, FrameworkManifest, ImageDimensions, MeanSource, ParameterValue,
};

/// Input parameter holding the tensor shape
pub const DIMENSIONS_PARAM: &str = "dimensions";
/// Input parameter holding the per-channel mean or a mean blob URL
pub const MEAN_PARAM: &str = "mean";
/// Input parameter holding the divisor applied after mean subtraction
pub const SCALE_PARAM: &str = "scale";
/// Input parameter selecting BGR or RGB planes
pub const COLOR_MODE_PARAM: &str = "color_mode";
/// Output parameter holding the label file URL
pub const FEATURES_URL_PARAM: &str = "features_url";

/// Description of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Model name, e.g. `SqueezeNet`
    pub name: String,
    /// Model version
    #[serde(default, deserialize_with = "version_string")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Framework the model was trained for
    pub framework: FrameworkManifest,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub references: Vec<String>,
    /// Input tensors
    #[serde(default)]
    pub inputs: Vec<ModelInput>,
    /// Output tensor
    #[serde(default)]
    pub output: ModelOutput,
    /// Where to fetch the graph and weights
    pub model: ModelAssets,
    /// Free-form attributes such as training dataset or author
    #[serde(default)]
    pub attributes: BTreeMap<String, ParameterValue>,
    /// Hidden manifests are not offered by catalogs
    #[serde(default)]
    pub hidden: bool,
}

/// A model input tensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    /// Input kind, `image` for this predictor
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

/// The model output tensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Output kind, typically `feature`
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

/// Remote location of the model artifacts
///
/// Checksums are carried along for consumers that want them; downloads do
/// not verify them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAssets {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub graph_path: String,
    #[serde(default)]
    pub weights_path: String,
    /// When set, `base_url` points at an archive holding both files
    #[serde(default)]
    pub is_archive: bool,
    #[serde(default)]
    pub graph_checksum: String,
    #[serde(default)]
    pub weights_checksum: String,
}

impl ModelInput {
    /// Look up a parameter by name
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }
}

impl ModelOutput {
    /// Look up a parameter by name
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }
}

impl ModelAssets {
    /// Join `base_url` and a relative path with exactly one slash
    fn resolve(&self, path: &str) -> String {
        if self.is_archive {
            return self.base_url.clone();
        }
        if self.base_url.is_empty() {
            return path.to_string();
        }
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl ModelManifest {
    /// Parse and validate a manifest from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self, DomainError> {
        let manifest: Self =
            serde_yaml::from_str(yaml).map_err(|e| DomainError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest from a reader
    pub fn from_yaml_reader(reader: impl Read) -> Result<Self, DomainError> {
        let manifest: Self = serde_yaml::from_reader(reader)
            .map_err(|e| DomainError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the fields every predictor depends on
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "manifest name must not be empty".into(),
            ));
        }
        if self.framework.name.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "manifest '{}' has no framework name",
                self.name
            )));
        }
        if self.model.is_archive {
            if self.model.base_url.trim().is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "archive manifest '{}' has no base_url",
                    self.name
                )));
            }
        } else if self.model.graph_path.trim().is_empty()
            || self.model.weights_path.trim().is_empty()
        {
            return Err(DomainError::ValidationError(format!(
                "manifest '{}' must name both graph_path and weights_path",
                self.name
            )));
        }
        Ok(())
    }

    /// Lowercase `name:version` key
    #[must_use]
    pub fn canonical_name(&self) -> String {
        format!("{}:{}", self.name.trim().to_lowercase(), self.version.trim())
    }

    /// Relative directory that holds this model's downloaded artifacts
    ///
    /// `framework/framework_version/model/model_version`, each segment
    /// lowercased and restricted to filesystem-safe characters.
    #[must_use]
    pub fn work_dir_suffix(&self) -> PathBuf {
        [
            self.framework.name.as_str(),
            self.framework.version.as_str(),
            self.name.as_str(),
            self.version.as_str(),
        ]
        .into_iter()
        .map(path_segment)
        .collect()
    }

    /// The single image input of the model
    pub fn image_input(&self) -> Result<&ModelInput, DomainError> {
        let [input] = self.inputs.as_slice() else {
            return Err(DomainError::UnsupportedInputCount(self.inputs.len()));
        };
        if !input.kind.eq_ignore_ascii_case("image") {
            return Err(DomainError::UnsupportedInputType(input.kind.clone()));
        }
        Ok(input)
    }

    /// Input tensor shape; image models must have three channels
    pub fn image_dimensions(&self) -> Result<ImageDimensions, DomainError> {
        let param = self
            .image_input()?
            .parameter(DIMENSIONS_PARAM)
            .ok_or_else(|| DomainError::MissingParameter(DIMENSIONS_PARAM.into()))?;
        let values = param.as_f64_list().ok_or_else(|| {
            DomainError::invalid_parameter(DIMENSIONS_PARAM, "expected a list of integers")
        })?;
        let dims = ImageDimensions::from_values(&values)?;
        if dims.channels() != 3 {
            return Err(DomainError::invalid_parameter(
                DIMENSIONS_PARAM,
                format!("expected 3 channels, got {}", dims.channels()),
            ));
        }
        Ok(dims)
    }

    /// Mean subtracted from each channel; zero when not given
    pub fn mean(&self) -> Result<MeanSource, DomainError> {
        let Some(param) = self.image_input()?.parameter(MEAN_PARAM) else {
            return Ok(MeanSource::default());
        };
        if let Some(values) = param.as_f64_list() {
            return match values.as_slice() {
                [v] => Ok(MeanSource::PerChannel([*v as f32; 3])),
                [b, g, r] => Ok(MeanSource::PerChannel([*b as f32, *g as f32, *r as f32])),
                other => Err(DomainError::invalid_parameter(
                    MEAN_PARAM,
                    format!("expected 1 or 3 values, got {}", other.len()),
                )),
            };
        }
        if let Some(v) = param.as_f64() {
            return Ok(MeanSource::PerChannel([v as f32; 3]));
        }
        match param.as_str().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(MeanSource::Url(url.to_string())),
            _ => Err(DomainError::invalid_parameter(
                MEAN_PARAM,
                "expected numbers or a URL",
            )),
        }
    }

    /// Divisor applied after mean subtraction; 1 when not given
    pub fn scale(&self) -> Result<f32, DomainError> {
        let Some(param) = self.image_input()?.parameter(SCALE_PARAM) else {
            return Ok(1.0);
        };
        let scale = param
            .as_f64()
            .ok_or_else(|| DomainError::invalid_parameter(SCALE_PARAM, "expected a number"))?;
        if scale == 0.0 || !scale.is_finite() {
            return Err(DomainError::invalid_parameter(
                SCALE_PARAM,
                format!("must be finite and non-zero, got {scale}"),
            ));
        }
        Ok(scale as f32)
    }

    /// Plane order the model was trained with; BGR when not given
    pub fn channel_order(&self) -> Result<ChannelOrder, DomainError> {
        match self.image_input()?.parameter(COLOR_MODE_PARAM) {
            None => Ok(ChannelOrder::default()),
            Some(param) => param
                .as_str()
                .ok_or_else(|| DomainError::invalid_parameter(COLOR_MODE_PARAM, "expected a string"))?
                .parse(),
        }
    }

    /// URL of the label file, one label per line
    #[must_use]
    pub fn features_url(&self) -> Option<&str> {
        self.output
            .parameter(FEATURES_URL_PARAM)
            .and_then(ParameterValue::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Where to download the graph from
    #[must_use]
    pub fn graph_url(&self) -> String {
        self.model.resolve(&self.model.graph_path)
    }

    /// Where to download the weights from
    #[must_use]
    pub fn weights_url(&self) -> String {
        self.model.resolve(&self.model.weights_path)
    }
}

/// Lowercase `raw` and replace characters that are unsafe in a file name
#[must_use]
pub fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}
