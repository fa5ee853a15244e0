use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// Label encoder: maps each known class to its index in the sorted class list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Builds an encoder from class labels; duplicates are rejected
    pub fn new(mut classes: Vec<String>) -> Result<Self, ArtifactError> {
        classes.sort();
        if let Some(pair) = classes.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ArtifactError::Inconsistent(format!("duplicate class '{}'", pair[0])));
        }
        Ok(Self { classes })
    }

    /// Fits the encoder on observed labels, deduplicating them
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|class| class.as_str().cmp(label)).ok()
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    /// Deserialized encoders must still hold a sorted, duplicate-free list
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.classes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ArtifactError::Inconsistent(
                "label encoder classes are not sorted and unique".to_string(),
            ));
        }
        Ok(())
    }
}
