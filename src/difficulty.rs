//! Hike difficulty and walking time estimation
//!
//! A single forward pass: request fields are picked in the order of the
//! artifact's feature list, min-max scaled and fed to a [`DifficultyMlp`]
//! whose two outputs are the difficulty score and the time in hours.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ArtifactError, DifficultyError};
use crate::models::difficulty_mlp::DifficultyMlp;
use crate::persistence::{ArtifactMetadata, PersistentArtifact, SerializableDifficultyMlp};
use crate::preprocessing::MinMaxScaler;
use crate::utils::round_to;

/// Fields accepted by the estimator
pub const INPUT_FIELDS: [&str; 7] = [
    "ketinggian",
    "jarak",
    "elevation_gain",
    "temp",
    "precipprob",
    "windspeed",
    "humidity",
];

/// Route and weather description of one hike
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HikeInput {
    /// Summit height in metres above sea level
    pub ketinggian: f64,
    /// Route length
    pub jarak: f64,
    pub elevation_gain: f64,
    pub temp: f64,
    pub precipprob: f64,
    pub windspeed: f64,
    pub humidity: f64,
}

impl HikeInput {
    /// Looks a field up by artifact name; spaces stand for underscores
    pub fn field(&self, name: &str) -> Option<f64> {
        match field_key(name).as_str() {
            "ketinggian" => Some(self.ketinggian),
            "jarak" => Some(self.jarak),
            "elevation_gain" => Some(self.elevation_gain),
            "temp" => Some(self.temp),
            "precipprob" => Some(self.precipprob),
            "windspeed" => Some(self.windspeed),
            "humidity" => Some(self.humidity),
            _ => None,
        }
    }
}

fn field_key(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Estimator result as served
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyEstimate {
    /// `"<H> jam <M> menit"`
    pub estimated_time: String,
    pub difficulty_score: f64,
}

/// Formats fractional hours as `"<H> jam <M> menit"`, rounded to the nearest minute
pub fn hours_to_hh_mm(hours: f64) -> String {
    let total_minutes = (hours * 60.0).round() as i64;
    format!("{} jam {} menit", total_minutes.div_euclid(60), total_minutes.rem_euclid(60))
}

/// Artifact bundle of the estimator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DifficultyArtifacts {
    pub model: SerializableDifficultyMlp,
    pub scaler: MinMaxScaler,
    pub features: Vec<String>,
}

impl PersistentArtifact for DifficultyArtifacts {}

#[derive(Clone, Debug)]
pub struct DifficultyEstimator {
    network: DifficultyMlp,
    scaler: MinMaxScaler,
    features: Vec<String>,
}

impl DifficultyEstimator {
    pub fn from_artifacts(artifacts: DifficultyArtifacts) -> Result<DifficultyEstimator, ArtifactError> {
        let network = artifacts.model.into_network()?;
        artifacts.scaler.validate()?;

        if let Some(unknown) = artifacts
            .features
            .iter()
            .find(|name| !INPUT_FIELDS.contains(&field_key(name).as_str()))
        {
            return Err(ArtifactError::Inconsistent(format!("unknown difficulty feature '{}'", unknown)));
        }
        if artifacts.features.len() != network.input_size || artifacts.scaler.n_features() != network.input_size {
            return Err(ArtifactError::Inconsistent(format!(
                "network expects {} inputs, {} features listed, scaler fitted on {}",
                network.input_size,
                artifacts.features.len(),
                artifacts.scaler.n_features()
            )));
        }

        Ok(DifficultyEstimator { network, scaler: artifacts.scaler, features: artifacts.features })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<DifficultyEstimator, ArtifactError> {
        let (artifacts, metadata) = DifficultyArtifacts::load(path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            name = %metadata.name,
            version = %metadata.version,
            features = ?artifacts.features,
            "loaded difficulty artifact"
        );
        Self::from_artifacts(artifacts)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, metadata: &ArtifactMetadata) -> Result<(), ArtifactError> {
        DifficultyArtifacts {
            model: (&self.network).into(),
            scaler: self.scaler.clone(),
            features: self.features.clone(),
        }
        .save(path, metadata)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn estimate(&self, input: &HikeInput) -> Result<DifficultyEstimate, DifficultyError> {
        let mut row = Vec::with_capacity(self.features.len());
        for name in &self.features {
            let value = input
                .field(name)
                .ok_or_else(|| DifficultyError::Prediction(format!("unknown feature '{}'", name)))?;
            if !value.is_finite() {
                return Err(DifficultyError::InvalidInput(format!("{} must be a finite number", name)));
            }
            row.push(value);
        }

        let scaled = self
            .scaler
            .transform_row(&row)
            .map_err(|e| DifficultyError::Prediction(e.to_string()))?;
        let (difficulty, hours) = self
            .network
            .forward(&scaled)
            .ok_or_else(|| DifficultyError::Prediction("network rejected the input row".to_string()))?;
        if !difficulty.is_finite() || !hours.is_finite() {
            return Err(DifficultyError::Prediction("network produced a non-finite value".to_string()));
        }

        Ok(DifficultyEstimate { estimated_time: hours_to_hh_mm(hours), difficulty_score: round_to(difficulty, 2) })
    }
}
