//! Classification results

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// One class of a classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFeature {
    /// Position in the model's output vector
    pub index: i64,
    /// Label read from the features file
    pub name: String,
    pub probability: f32,
}

impl fmt::Display for PredictionFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5} {} ({})", self.probability, self.name, self.index)
    }
}

/// All classes of a classification result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionFeatures(Vec<PredictionFeature>);

impl PredictionFeatures {
    pub const fn new(features: Vec<PredictionFeature>) -> Self {
        Self(features)
    }

    /// Pair every output value with the label on the same line index
    ///
    /// # Errors
    ///
    /// Returns `DomainError::LabelMismatch` if there are more outputs than
    /// labels.
    pub fn from_probabilities(
        probabilities: &[f32],
        labels: &[String],
    ) -> Result<Self, DomainError> {
        if probabilities.len() > labels.len() {
            return Err(DomainError::LabelMismatch {
                outputs: probabilities.len(),
                labels: labels.len(),
            });
        }
        Ok(Self(
            probabilities
                .iter()
                .zip(labels)
                .zip(0_i64..)
                .map(|((probability, name), index)| PredictionFeature {
                    index,
                    name: name.clone(),
                    probability: *probability,
                })
                .collect(),
        ))
    }

    /// Order by descending probability, ties by ascending index
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.0.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then(a.index.cmp(&b.index))
        });
        self
    }

    /// The `k` most probable classes
    #[must_use]
    pub fn top_k(self, k: usize) -> Self {
        let mut sorted = self.sorted();
        sorted.0.truncate(k);
        sorted
    }

    /// The most probable class
    #[must_use]
    pub fn best(&self) -> Option<&PredictionFeature> {
        self.0.iter().max_by(|a, b| {
            a.probability
                .total_cmp(&b.probability)
                .then(b.index.cmp(&a.index))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PredictionFeature> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[PredictionFeature] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<PredictionFeature> {
        self.0
    }
}

impl IntoIterator for PredictionFeatures {
    type Item = PredictionFeature;
    type IntoIter = std::vec::IntoIter<PredictionFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PredictionFeatures {
    type Item = &'a PredictionFeature;
    type IntoIter = std::slice::Iter<'a, PredictionFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
