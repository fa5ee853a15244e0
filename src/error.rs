//! Error types for every layer of the crate.
//!
//! Request-level failures of the weather forecast live in [`ForecastError`];
//! artifact, dataset and configuration loading each get their own enum so the
//! binaries can report *what* failed to load.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of a single forecast request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Bad date, horizon or catch-up distance.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The entity is not part of the encoder vocabulary.
    #[error("kecamatan '{0}' was not seen during training")]
    UnknownEntity(String),

    /// Fewer than `required` records exist strictly before `before`.
    #[error("not enough historical data for kecamatan '{entity}' before {before}: need {required} days, found {found}")]
    InsufficientHistory {
        entity: String,
        before: NaiveDate,
        required: usize,
        found: usize,
    },

    /// A feature the predictor needs could not be populated.
    #[error("cannot assemble feature '{feature}' for {date}")]
    FeatureAssembly { feature: String, date: NaiveDate },

    /// Records of one entity are not strictly ordered by date.
    #[error("malformed history for '{entity}': {date} does not follow {previous}")]
    MalformedHistory {
        entity: String,
        previous: NaiveDate,
        date: NaiveDate,
    },

    /// Model artifacts or the historical dataset failed to load.
    #[error("predictor unavailable: {0}")]
    PredictorUnavailable(String),

    /// An invariant between the loaded artifacts and the forecast loop broke.
    #[error("internal forecast error: {0}")]
    Internal(String),
}

/// Errors raised while reading, writing or validating model artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("shape error: {0}")]
    Shape(String),

    /// The pieces of an artifact bundle disagree with each other.
    #[error("inconsistent artifact: {0}")]
    Inconsistent(String),

    /// Loading the historical dataset that accompanies an artifact failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl From<serde_json::Error> for ArtifactError {
    fn from(error: serde_json::Error) -> Self {
        ArtifactError::Serialization(error.to_string())
    }
}

impl From<bincode::Error> for ArtifactError {
    fn from(error: bincode::Error) -> Self {
        ArtifactError::Serialization(error.to_string())
    }
}

/// Errors raised while ingesting the historical weather dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("{path}:{line}: {message}")]
    InvalidValue {
        path: String,
        line: u64,
        message: String,
    },

    #[error("duplicate record for '{entity}' on {date}")]
    DuplicateDate { entity: String, date: NaiveDate },

    #[error("no CSV files found under {0}")]
    Empty(String),
}

/// Errors raised while loading the TOML configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures of a difficulty & time estimate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DifficultyError {
    /// A request field is NaN or infinite.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Failures of a mountain recommendation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecommendError {
    #[error("{0}")]
    Validation(String),

    #[error("internal recommender error: {0}")]
    Internal(String),
}

/// Failures of the weather scraper.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("http request error: {0}")]
    Http(String),

    #[error("json document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid scraper configuration: {0}")]
    Config(String),
}

impl From<ureq::Error> for ScrapeError {
    fn from(e: ureq::Error) -> ScrapeError {
        ScrapeError::Http(e.to_string())
    }
}
