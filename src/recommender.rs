//! Mountain recommendations by location text and height
//!
//! Every mountain is described by the TF-IDF vector of its province followed
//! by its min-max scaled height. A query is embedded the same way and
//! compared with every mountain by cosine similarity; open mountains above
//! the similarity threshold are returned best first.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ArtifactError, RecommendError};
use crate::persistence::{ArtifactMetadata, PersistentArtifact, SerializableArray2};
use crate::preprocessing::{MinMaxScaler, TfidfVectorizer};

/// Access status of a mountain that can currently be climbed
pub const OPEN_ACCESS: &str = "Buka";

/// One row of the mountain table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mountain {
    #[serde(rename = "Nama")]
    pub name: String,
    #[serde(rename = "Provinsi")]
    pub province: String,
    /// Metres above sea level
    #[serde(rename = "Ketinggian (dpl)")]
    pub height: i64,
    #[serde(rename = "Akses")]
    pub access: String,
}

impl Mountain {
    pub fn is_open(&self) -> bool {
        self.access.trim() == OPEN_ACCESS
    }
}

/// Query parameters of one recommendation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecommendOptions {
    pub top_n: usize,
    pub similarity_threshold: f64,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        RecommendOptions { top_n: 5, similarity_threshold: 0.3 }
    }
}

/// Artifact bundle of the recommender
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommenderArtifacts {
    pub vectorizer: TfidfVectorizer,
    pub height_scaler: MinMaxScaler,
    /// One row per mountain: TF-IDF columns then the scaled height
    pub features: SerializableArray2,
    pub mountains: Vec<Mountain>,
}

impl PersistentArtifact for RecommenderArtifacts {}

#[derive(Clone, Debug)]
pub struct Recommender {
    vectorizer: TfidfVectorizer,
    height_scaler: MinMaxScaler,
    features: Array2<f64>,
    mountains: Vec<Mountain>,
}

impl Recommender {
    /// Fits the vectorizer on provinces and the scaler on heights
    pub fn fit(mountains: Vec<Mountain>) -> Result<Recommender, ArtifactError> {
        if mountains.is_empty() {
            return Err(ArtifactError::Inconsistent("mountain table is empty".to_string()));
        }
        let provinces: Vec<&str> = mountains.iter().map(|m| m.province.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&provinces);
        let heights = Array2::from_shape_vec(
            (mountains.len(), 1),
            mountains.iter().map(|m| m.height as f64).collect(),
        )
        .map_err(|e| ArtifactError::Shape(e.to_string()))?;
        let height_scaler = MinMaxScaler::fit(&heights)?;

        let width = vectorizer.n_features() + 1;
        let mut features = Array2::zeros((mountains.len(), width));
        for (mut row, mountain) in features.axis_iter_mut(Axis(0)).zip(&mountains) {
            let vector = embed(&vectorizer, &height_scaler, &mountain.province, mountain.height as f64);
            row.assign(&vector);
        }

        Ok(Recommender { vectorizer, height_scaler, features, mountains })
    }

    pub fn from_artifacts(artifacts: RecommenderArtifacts) -> Result<Recommender, ArtifactError> {
        artifacts.vectorizer.validate()?;
        artifacts.height_scaler.validate()?;
        let features = artifacts.features.into_array()?;

        if artifacts.height_scaler.n_features() != 1 {
            return Err(ArtifactError::Inconsistent(format!(
                "height scaler must have one column, has {}",
                artifacts.height_scaler.n_features()
            )));
        }
        if features.dim() != (artifacts.mountains.len(), artifacts.vectorizer.n_features() + 1) {
            return Err(ArtifactError::Shape(format!(
                "feature matrix is {:?}, expected ({}, {})",
                features.dim(),
                artifacts.mountains.len(),
                artifacts.vectorizer.n_features() + 1
            )));
        }

        Ok(Recommender {
            vectorizer: artifacts.vectorizer,
            height_scaler: artifacts.height_scaler,
            features,
            mountains: artifacts.mountains,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Recommender, ArtifactError> {
        let (artifacts, metadata) = RecommenderArtifacts::load(path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            name = %metadata.name,
            mountains = artifacts.mountains.len(),
            "loaded recommender artifact"
        );
        Self::from_artifacts(artifacts)
    }

    pub fn to_artifacts(&self) -> RecommenderArtifacts {
        RecommenderArtifacts {
            vectorizer: self.vectorizer.clone(),
            height_scaler: self.height_scaler.clone(),
            features: (&self.features).into(),
            mountains: self.mountains.clone(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, metadata: &ArtifactMetadata) -> Result<(), ArtifactError> {
        self.to_artifacts().save(path, metadata)
    }

    pub fn mountains(&self) -> &[Mountain] {
        &self.mountains
    }

    /// Open mountains most similar to `location` and `height`, best first.
    ///
    /// An empty result is not an error.
    pub fn recommend(
        &self,
        location: &str,
        height: f64,
        options: &RecommendOptions,
    ) -> Result<Vec<Mountain>, RecommendError> {
        validate_location(location)?;
        if !height.is_finite() {
            return Err(RecommendError::Validation("ketinggian must be a number".to_string()));
        }

        let query = embed(&self.vectorizer, &self.height_scaler, location, height);
        if query.len() != self.features.ncols() {
            return Err(RecommendError::Internal(format!(
                "query has {} columns, feature matrix has {}",
                query.len(),
                self.features.ncols()
            )));
        }

        let mut qualified: Vec<(usize, f64)> = self
            .features
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, row)| (i, cosine_similarity(query.view(), row)))
            .filter(|&(i, score)| score >= options.similarity_threshold && self.mountains[i].is_open())
            .collect();
        // stable: equal scores keep table order
        qualified.sort_by(|a, b| b.1.total_cmp(&a.1));
        qualified.truncate(options.top_n);

        debug!(location, height, matches = qualified.len(), "recommendation scores: {:?}", qualified);
        Ok(qualified.into_iter().map(|(i, _)| self.mountains[i].clone()).collect())
    }
}

fn validate_location(location: &str) -> Result<(), RecommendError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(RecommendError::Validation(
            "must fill all fields: lokasi and ketinggian".to_string(),
        ));
    }
    if location.chars().all(char::is_numeric) {
        return Err(RecommendError::Validation("lokasi must not contain only digits".to_string()));
    }
    Ok(())
}

fn embed(vectorizer: &TfidfVectorizer, height_scaler: &MinMaxScaler, text: &str, height: f64) -> Array1<f64> {
    let mut vector = vectorizer.transform(text);
    vector.push(height_scaler.transform_value(0, height));
    Array1::from(vector)
}

/// Cosine of the angle between `a` and `b`; zero when either is all zeros
pub fn cosine_similarity(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let norms = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if norms == 0.0 {
        return 0.0;
    }
    a.dot(&b) / norms
}
