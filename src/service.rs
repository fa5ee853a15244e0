//! Process-wide service context.
//!
//! Artifacts and the historical dataset are loaded at most once per process
//! and shared read-only by every request. Each service sits behind an
//! [`ArtifactSlot`]; the first caller triggers the load and every concurrent
//! caller waits on that same load.

use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::{self, Config};
use crate::dataset::HistoryStore;
use crate::difficulty::DifficultyEstimator;
use crate::error::{ArtifactError, ForecastError};
use crate::forecast::{ForecastDriver, ForecastLimits, ForecastRequest, LstmStepPredictor, PredictionStep, StepPredictor};
use crate::recommender::{RecommendOptions, Recommender};

type Loader<T> = Arc<dyn Fn() -> Result<T, String> + Send + Sync>;

/// Lazily loaded, single-flight, read-only value.
///
/// The loader runs at most once, on a blocking thread. Its outcome is cached:
/// a failed load is reported as [`ForecastError::PredictorUnavailable`] to
/// the caller that triggered it, to everyone waiting on it and to every later
/// caller.
pub struct ArtifactSlot<T> {
    name: &'static str,
    loader: Loader<T>,
    cell: OnceCell<Result<Arc<T>, String>>,
}

impl<T: Send + Sync + 'static> ArtifactSlot<T> {
    pub fn new<F, E>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Display,
    {
        ArtifactSlot {
            name,
            loader: Arc::new(move || loader().map_err(|e| e.to_string())),
            cell: OnceCell::new(),
        }
    }

    /// A slot that is already loaded
    pub fn ready(name: &'static str, value: T) -> Self {
        ArtifactSlot {
            name,
            loader: Arc::new(move || Err(format!("{} is preloaded", name))),
            cell: OnceCell::new_with(Some(Ok(Arc::new(value)))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a load has finished, successfully or not
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<T>, ForecastError> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                info!(artifact = self.name, "loading");
                let loader = Arc::clone(&self.loader);
                let outcome = match tokio::task::spawn_blocking(move || (*loader)()).await {
                    Ok(Ok(value)) => Ok(Arc::new(value)),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(format!("loader task failed: {}", e)),
                };
                match &outcome {
                    Ok(_) => info!(artifact = self.name, "ready"),
                    Err(e) => error!(artifact = self.name, "load failed: {}", e),
                }
                outcome
            })
            .await;

        match outcome {
            Ok(value) => Ok(Arc::clone(value)),
            Err(e) => Err(ForecastError::PredictorUnavailable(format!("{}: {}", self.name, e))),
        }
    }
}

/// Step predictor plus the history it forecasts from
pub struct WeatherService {
    predictor: Box<dyn StepPredictor + Send + Sync>,
    history: HistoryStore,
    limits: ForecastLimits,
}

impl WeatherService {
    /// Drops history rows the predictor could not consume
    pub fn new(
        predictor: Box<dyn StepPredictor + Send + Sync>,
        mut history: HistoryStore,
        limits: ForecastLimits,
    ) -> WeatherService {
        history.retain_complete(predictor.features());
        WeatherService { predictor, history, limits }
    }

    pub fn load(section: &config::Weather) -> Result<WeatherService, ArtifactError> {
        let predictor = LstmStepPredictor::load(&section.artifact_path)?;
        let history = HistoryStore::load(&section.dataset_path)?;
        Ok(WeatherService::new(Box::new(predictor), history, section.limits()))
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn limits(&self) -> ForecastLimits {
        self.limits
    }

    pub fn forecast(&self, request: &ForecastRequest) -> Result<Vec<PredictionStep>, ForecastError> {
        ForecastDriver::new(self.predictor.as_ref(), &self.history)
            .with_limits(self.limits)
            .forecast(request)
    }
}

/// Shared state handed to every request handler
pub struct AppState {
    pub weather: Option<ArtifactSlot<WeatherService>>,
    pub difficulty: Option<ArtifactSlot<DifficultyEstimator>>,
    pub recommender: Option<ArtifactSlot<Recommender>>,
    pub recommend_options: RecommendOptions,
}

impl AppState {
    /// Slots for every configured service; nothing is loaded yet
    pub fn from_config(config: &Config) -> AppState {
        let weather = config.weather.clone().map(|section| {
            ArtifactSlot::new("weather", move || WeatherService::load(&section))
        });
        let difficulty = config.difficulty.clone().map(|section| {
            ArtifactSlot::new("difficulty", move || DifficultyEstimator::load(&section.artifact_path))
        });
        let recommend_options = config
            .recommender
            .as_ref()
            .map(|section| section.options())
            .unwrap_or_default();
        let recommender = config.recommender.clone().map(|section| {
            ArtifactSlot::new("recommender", move || Recommender::load(&section.artifact_path))
        });

        AppState { weather, difficulty, recommender, recommend_options }
    }

    /// Loads every configured slot, stopping at the first failure
    pub async fn preload(&self) -> Result<(), ForecastError> {
        if let Some(slot) = &self.weather {
            slot.get().await?;
        }
        if let Some(slot) = &self.difficulty {
            slot.get().await?;
        }
        if let Some(slot) = &self.recommender {
            slot.get().await?;
        }
        Ok(())
    }
}
