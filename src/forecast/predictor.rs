use std::path::Path;

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ArtifactError, ForecastError};
use crate::features::FeatureSet;
use crate::models::weather_lstm::WeatherLstm;
use crate::persistence::{ArtifactMetadata, PersistentArtifact, SerializableWeatherLstm};
use crate::preprocessing::{LabelEncoder, MinMaxScaler};

/// Network outputs, in order
pub const TARGET_NAMES: [&str; 4] = ["precipprob", "windspeed", "temp", "humidity"];

/// The four values one predictor call produces
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetValues {
    pub precipprob: f64,
    pub windspeed: f64,
    pub temp: f64,
    pub humidity: f64,
}

impl TargetValues {
    /// Reads values laid out as [`TARGET_NAMES`]
    pub fn from_slice(values: &[f64]) -> Option<TargetValues> {
        match values {
            [precipprob, windspeed, temp, humidity] => Some(TargetValues {
                precipprob: *precipprob,
                windspeed: *windspeed,
                temp: *temp,
                humidity: *humidity,
            }),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.precipprob, self.windspeed, self.temp, self.humidity]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One forecast day for one kecamatan
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionStep {
    pub entity: String,
    pub date: NaiveDate,
    pub precipprob: f64,
    pub windspeed: f64,
    pub temp: f64,
    pub humidity: f64,
}

impl PredictionStep {
    pub fn new(entity: &str, date: NaiveDate, values: TargetValues) -> PredictionStep {
        PredictionStep {
            entity: entity.to_string(),
            date,
            precipprob: values.precipprob,
            windspeed: values.windspeed,
            temp: values.temp,
            humidity: values.humidity,
        }
    }
}

/// Anything that maps a window of engineered features to the next day's targets.
///
/// The forecast driver only depends on this trait, so the loop can be driven
/// by the trained network or by a fixed fake in tests.
pub trait StepPredictor {
    /// Number of records the predictor consumes per call
    fn window_len(&self) -> usize;

    /// Column layout of the window
    fn features(&self) -> &FeatureSet;

    /// Whether `entity` is part of the training vocabulary
    fn knows_entity(&self, entity: &str) -> bool;

    /// Predicts the day after the last window row.
    ///
    /// `window` is unscaled, `(window_len, features.len())`, oldest row first.
    fn predict(&self, entity: &str, window: &Array2<f64>) -> Result<TargetValues, ForecastError>;
}

/// Everything the weather predictor loads from disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeatherArtifacts {
    pub model: SerializableWeatherLstm,
    pub feature_scaler: MinMaxScaler,
    pub target_scaler: MinMaxScaler,
    pub label_encoder: LabelEncoder,
    pub features: Vec<String>,
    pub time_steps: usize,
}

impl PersistentArtifact for WeatherArtifacts {}

/// [`StepPredictor`] backed by the trained LSTM and its fitted transforms
#[derive(Clone, Debug)]
pub struct LstmStepPredictor {
    network: WeatherLstm,
    feature_scaler: MinMaxScaler,
    target_scaler: MinMaxScaler,
    label_encoder: LabelEncoder,
    features: FeatureSet,
    time_steps: usize,
}

impl LstmStepPredictor {
    /// Rebuilds the predictor and checks that every piece agrees on widths
    pub fn from_artifacts(artifacts: WeatherArtifacts) -> Result<LstmStepPredictor, ArtifactError> {
        let network = artifacts.model.into_network()?;
        let features = FeatureSet::from_names(&artifacts.features)?;
        artifacts.feature_scaler.validate()?;
        artifacts.target_scaler.validate()?;
        artifacts.label_encoder.validate()?;

        if artifacts.time_steps == 0 {
            return Err(ArtifactError::Inconsistent("time_steps must be positive".to_string()));
        }
        if network.input_size != features.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "network expects {} inputs but {} features are listed",
                network.input_size,
                features.len()
            )));
        }
        if artifacts.feature_scaler.n_features() != features.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "feature scaler fitted on {} columns, {} features listed",
                artifacts.feature_scaler.n_features(),
                features.len()
            )));
        }
        if network.output_size != TARGET_NAMES.len() || artifacts.target_scaler.n_features() != TARGET_NAMES.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "expected {} targets, network emits {} and target scaler has {}",
                TARGET_NAMES.len(),
                network.output_size,
                artifacts.target_scaler.n_features()
            )));
        }
        if artifacts.label_encoder.len() != network.num_entities() {
            return Err(ArtifactError::Inconsistent(format!(
                "encoder knows {} kecamatan but the embedding has {} rows",
                artifacts.label_encoder.len(),
                network.num_entities()
            )));
        }

        Ok(LstmStepPredictor {
            network,
            feature_scaler: artifacts.feature_scaler,
            target_scaler: artifacts.target_scaler,
            label_encoder: artifacts.label_encoder,
            features,
            time_steps: artifacts.time_steps,
        })
    }

    /// Loads and validates a weather artifact (`.json` or binary)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<LstmStepPredictor, ArtifactError> {
        let (artifacts, metadata) = WeatherArtifacts::load(path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            name = %metadata.name,
            version = %metadata.version,
            created_at = %metadata.created_at,
            "loaded weather artifact"
        );
        Self::from_artifacts(artifacts)
    }

    pub fn to_artifacts(&self) -> WeatherArtifacts {
        WeatherArtifacts {
            model: (&self.network).into(),
            feature_scaler: self.feature_scaler.clone(),
            target_scaler: self.target_scaler.clone(),
            label_encoder: self.label_encoder.clone(),
            features: self.features.names(),
            time_steps: self.time_steps,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, metadata: &ArtifactMetadata) -> Result<(), ArtifactError> {
        self.to_artifacts().save(path, metadata)
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    pub fn network(&self) -> &WeatherLstm {
        &self.network
    }
}

impl StepPredictor for LstmStepPredictor {
    fn window_len(&self) -> usize {
        self.time_steps
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn knows_entity(&self, entity: &str) -> bool {
        self.label_encoder.transform(entity).is_some()
    }

    fn predict(&self, entity: &str, window: &Array2<f64>) -> Result<TargetValues, ForecastError> {
        let code = self
            .label_encoder
            .transform(entity)
            .ok_or_else(|| ForecastError::UnknownEntity(entity.to_string()))?;
        if window.nrows() != self.time_steps {
            return Err(ForecastError::Internal(format!(
                "window has {} rows, predictor expects {}",
                window.nrows(),
                self.time_steps
            )));
        }

        let scaled = self
            .feature_scaler
            .transform(window)
            .map_err(|e| ForecastError::Internal(e.to_string()))?;
        let output = self
            .network
            .forward(&scaled, code)
            .ok_or_else(|| ForecastError::Internal("network rejected the window".to_string()))?;
        let values = self
            .target_scaler
            .inverse_transform_row(&output)
            .map_err(|e| ForecastError::Internal(e.to_string()))?;

        let targets = TargetValues::from_slice(&values)
            .ok_or_else(|| ForecastError::Internal(format!("network emitted {} values", values.len())))?;
        if !targets.is_finite() {
            return Err(ForecastError::Internal("network produced a non-finite value".to_string()));
        }
        Ok(targets)
    }
}
