//! TOML configuration of the service and of the scraper.
//!
//! Relative paths are resolved against the directory of the configuration
//! file so a deployment can ship its config next to its artifacts.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::Level;

use crate::dataset::parse_date;
use crate::error::ConfigError;
use crate::forecast::ForecastLimits;
use crate::recommender::RecommendOptions;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct General {
    pub log_level: String,
    /// Load every artifact before serving instead of on first request
    pub eager_load: bool,
}

impl Default for General {
    fn default() -> Self {
        General { log_level: "info".to_string(), eager_load: true }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl Default for Server {
    fn default() -> Self {
        Server { host: "0.0.0.0".to_string(), port: 8000, cors: true }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Weather {
    pub artifact_path: PathBuf,
    /// CSV file or directory of CSV files
    pub dataset_path: PathBuf,
    #[serde(default = "default_max_forecast_days")]
    pub max_forecast_days: usize,
    #[serde(default = "default_max_catch_up_days")]
    pub max_catch_up_days: usize,
}

impl Weather {
    pub fn limits(&self) -> ForecastLimits {
        ForecastLimits { max_days: self.max_forecast_days, max_catch_up_days: self.max_catch_up_days }
    }
}

fn default_max_forecast_days() -> usize {
    30
}

fn default_max_catch_up_days() -> usize {
    366
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Difficulty {
    pub artifact_path: PathBuf,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Recommender {
    pub artifact_path: PathBuf,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Recommender {
    pub fn options(&self) -> RecommendOptions {
        RecommendOptions { top_n: self.top_n, similarity_threshold: self.similarity_threshold }
    }
}

fn default_top_n() -> usize {
    5
}

fn default_similarity_threshold() -> f64 {
    0.3
}

/// Service configuration; only the configured services are mounted
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub server: Server,
    pub weather: Option<Weather>,
    pub difficulty: Option<Difficulty>,
    pub recommender: Option<Recommender>,
}

impl Config {
    pub fn from_toml_str(toml: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_level(&self.general.log_level)?;
        if self.weather.is_none() && self.difficulty.is_none() && self.recommender.is_none() {
            return Err(ConfigError::Invalid(
                "at least one of [weather], [difficulty] or [recommender] must be configured".to_string(),
            ));
        }
        if let Some(weather) = &self.weather {
            if weather.max_forecast_days == 0 {
                return Err(ConfigError::Invalid("weather.max_forecast_days must be at least 1".to_string()));
            }
        }
        if let Some(recommender) = &self.recommender {
            if recommender.top_n == 0 {
                return Err(ConfigError::Invalid("recommender.top_n must be at least 1".to_string()));
            }
            if !recommender.similarity_threshold.is_finite() {
                return Err(ConfigError::Invalid("recommender.similarity_threshold must be a number".to_string()));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(weather) = &mut self.weather {
            weather.artifact_path = resolve(base, &weather.artifact_path);
            weather.dataset_path = resolve(base, &weather.dataset_path);
        }
        if let Some(difficulty) = &mut self.difficulty {
            difficulty.artifact_path = resolve(base, &difficulty.artifact_path);
        }
        if let Some(recommender) = &mut self.recommender {
            recommender.artifact_path = resolve(base, &recommender.artifact_path);
        }
    }
}

/// Loads the service configuration file
///
/// # Arguments
///
/// * 'config_path' - path to the configuration file
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<Config, ConfigError> {
    let toml = fs::read_to_string(config_path.as_ref())?;
    let mut config = Config::from_toml_str(&toml)?;
    config.resolve_paths(base_dir(config_path.as_ref()));
    Ok(config)
}

/// Weather scraper configuration
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    /// Tried in order; a rate-limited key is replaced by the next one
    pub api_keys: Vec<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub end_date: String,
    /// CSV with a `Kecamatan` column
    pub regions_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_max_429_errors")]
    pub max_429_errors: usize,
    #[serde(default = "default_request_pause_ms")]
    pub request_pause_ms: u64,
    #[serde(default = "default_key_switch_pause_ms")]
    pub key_switch_pause_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_base_url() -> String {
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline".to_string()
}

fn default_max_429_errors() -> usize {
    3
}

fn default_request_pause_ms() -> u64 {
    1000
}

fn default_key_switch_pause_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ScraperConfig {
    pub fn from_toml_str(toml: &str) -> Result<ScraperConfig, ConfigError> {
        let config: ScraperConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_level(&self.log_level)?;
        if self.api_keys.iter().all(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("api_keys must hold at least one key".to_string()));
        }
        if self.max_429_errors == 0 {
            return Err(ConfigError::Invalid("max_429_errors must be at least 1".to_string()));
        }
        let (start, end) = self.date_range()?;
        if start > end {
            return Err(ConfigError::Invalid(format!("start_date {} is after end_date {}", start, end)));
        }
        Ok(())
    }

    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        let parse = |field: &str, value: &str| {
            parse_date(value).ok_or_else(|| ConfigError::Invalid(format!("{} '{}' is not a date", field, value)))
        };
        Ok((parse("start_date", &self.start_date)?, parse("end_date", &self.end_date)?))
    }
}

/// Loads the scraper configuration file
pub fn load_scraper_config<P: AsRef<Path>>(config_path: P) -> Result<ScraperConfig, ConfigError> {
    let toml = fs::read_to_string(config_path.as_ref())?;
    let mut config = ScraperConfig::from_toml_str(&toml)?;
    let base = base_dir(config_path.as_ref());
    config.regions_path = resolve(base, &config.regions_path);
    config.output_dir = resolve(base, &config.output_dir);
    Ok(config)
}

/// Parses `trace`, `debug`, `info`, `warn` or `error` (any case)
pub fn parse_level(level: &str) -> Result<Level, ConfigError> {
    Level::from_str(level.trim()).map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", level)))
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
