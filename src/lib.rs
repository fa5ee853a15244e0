//! # HiPlan
//!
//! Prediction services for hike planning: a multi-step daily weather
//! forecast per kecamatan, a hike difficulty and duration estimator, and a
//! mountain recommender, served over HTTP.
//!
//! ## Core Components
//!
//! - **Forecast**: autoregressive loop that feeds each predicted day back
//!   into a sliding feature window, with catch-up when the history ends
//!   before the requested start date
//! - **Models**: inference-only stacked LSTM with a kecamatan embedding, and
//!   a dense difficulty regressor
//! - **Preprocessing**: scalers, label encoder and TF-IDF replayed from
//!   training artifacts
//! - **Service**: artifacts loaded once per process and shared by requests
//! - **Scraper**: daily weather history download per kecamatan
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use hiplan::dataset::HistoryStore;
//! use hiplan::forecast::{ForecastDriver, ForecastRequest, LstmStepPredictor};
//!
//! let predictor = LstmStepPredictor::load("weather.bin")?;
//! let history = HistoryStore::load("data/")?;
//! let request = ForecastRequest {
//!     entity: "Berastagi".to_string(),
//!     start_date: NaiveDate::from_ymd_opt(2025, 8, 8).unwrap(),
//!     days: 7,
//! };
//! for step in ForecastDriver::new(&predictor, &history).forecast(&request)? {
//!     println!("{} {:.1}°C", step.date, step.temp);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dataset;
pub mod difficulty;
pub mod error;
pub mod features;
pub mod forecast;
pub mod layers;
pub mod models;
pub mod persistence;
pub mod preprocessing;
pub mod recommender;
pub mod scraper;
pub mod server;
pub mod service;
pub mod utils;

// Re-export commonly used items
pub use dataset::HistoryStore;
pub use difficulty::{DifficultyEstimate, DifficultyEstimator, HikeInput};
pub use error::{ArtifactError, ConfigError, DatasetError, DifficultyError, ForecastError, RecommendError, ScrapeError};
pub use features::{FeatureSet, HistoricalRecord, Observation};
pub use forecast::{ForecastDriver, ForecastRequest, LstmStepPredictor, PredictionStep, StepPredictor};
pub use persistence::{ArtifactMetadata, ArtifactPersistence, PersistentArtifact};
pub use recommender::{Mountain, Recommender};
pub use service::{AppState, ArtifactSlot, WeatherService};
