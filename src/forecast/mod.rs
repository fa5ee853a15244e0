//! Multi-step weather forecasting.
//!
//! The driver initialises a [`FeatureBuffer`] from history ending before the
//! requested start date, then repeats predict → synthesize → slide until the
//! horizon is covered.

pub mod buffer;
pub mod driver;
pub mod predictor;
pub mod synthesizer;

pub use buffer::FeatureBuffer;
pub use driver::{ForecastDriver, ForecastLimits, ForecastPlan, ForecastRequest};
pub use predictor::{LstmStepPredictor, PredictionStep, StepPredictor, TargetValues, WeatherArtifacts, TARGET_NAMES};
pub use synthesizer::synthesize_next;
