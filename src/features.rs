//! Engineered weather features
//!
//! A [`HistoricalRecord`] is one day of raw measurements for one kecamatan
//! together with the fields derived from it and from the day before. The
//! predictor consumes records through a [`FeatureSet`], the ordered list of
//! feature names the network was trained on.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::error::{ArtifactError, ForecastError};

/// Features the crate knows how to compute or predict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    Temp,
    Humidity,
    PrecipProb,
    WindSpeed,
    Pressure,
    Dew,
    Year,
    Month,
    Day,
    Weekday,
    PressureDiff,
    DewPointSpread,
    HumidityLag1,
}

impl Feature {
    pub const ALL: [Feature; 13] = [
        Feature::Temp,
        Feature::Humidity,
        Feature::PrecipProb,
        Feature::WindSpeed,
        Feature::Pressure,
        Feature::Dew,
        Feature::Year,
        Feature::Month,
        Feature::Day,
        Feature::Weekday,
        Feature::PressureDiff,
        Feature::DewPointSpread,
        Feature::HumidityLag1,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Temp => "temp",
            Feature::Humidity => "humidity",
            Feature::PrecipProb => "precipprob",
            Feature::WindSpeed => "windspeed",
            Feature::Pressure => "pressure",
            Feature::Dew => "dew",
            Feature::Year => "year",
            Feature::Month => "month",
            Feature::Day => "day",
            Feature::Weekday => "weekday",
            Feature::PressureDiff => "pressure_diff",
            Feature::DewPointSpread => "dew_point_spread",
            Feature::HumidityLag1 => "humidity_lag1",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|feature| feature.name() == name)
    }
}

/// A feature as named by the model artifact
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    Known(Feature),
    /// Any other numeric dataset column; carried forward during feedback.
    Extra(String),
}

impl FeatureKey {
    pub fn parse(name: &str) -> FeatureKey {
        match Feature::from_name(name) {
            Some(feature) => FeatureKey::Known(feature),
            None => FeatureKey::Extra(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FeatureKey::Known(feature) => feature.name(),
            FeatureKey::Extra(name) => name,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, duplicate-free list of model input features
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    keys: Vec<FeatureKey>,
}

impl FeatureSet {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<FeatureSet, ArtifactError> {
        if names.is_empty() {
            return Err(ArtifactError::Inconsistent("feature list is empty".to_string()));
        }
        let mut keys: Vec<FeatureKey> = Vec::with_capacity(names.len());
        for name in names {
            let key = FeatureKey::parse(name.as_ref().trim());
            if keys.contains(&key) {
                return Err(ArtifactError::Inconsistent(format!("feature '{}' listed twice", key)));
            }
            keys.push(key);
        }
        Ok(FeatureSet { keys })
    }

    pub fn keys(&self) -> &[FeatureKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(|key| key.name().to_string()).collect()
    }

    pub fn extras(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().filter_map(|key| match key {
            FeatureKey::Extra(name) => Some(name.as_str()),
            FeatureKey::Known(_) => None,
        })
    }
}

/// Raw measurements of one day, as read from the dataset
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub temp: f64,
    pub humidity: f64,
    pub precipprob: f64,
    pub windspeed: f64,
    pub pressure: f64,
    pub dew: f64,
    pub extras: BTreeMap<String, f64>,
}

/// One day of measured and derived features for one kecamatan
///
/// Date parts are computed from `date`; the other derived fields depend only
/// on this day's raw values and the immediately preceding record.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub temp: f64,
    pub humidity: f64,
    pub precipprob: f64,
    pub windspeed: f64,
    pub pressure: f64,
    pub dew: f64,
    pub pressure_diff: f64,
    pub dew_point_spread: f64,
    pub humidity_lag1: f64,
    pub extras: BTreeMap<String, f64>,
}

impl HistoricalRecord {
    /// Engineers a record from `current` and the observation just before it
    pub fn derive(current: Observation, previous: &Observation) -> HistoricalRecord {
        HistoricalRecord {
            date: current.date,
            temp: current.temp,
            humidity: current.humidity,
            precipprob: current.precipprob,
            windspeed: current.windspeed,
            pressure: current.pressure,
            dew: current.dew,
            pressure_diff: current.pressure - previous.pressure,
            dew_point_spread: current.temp - current.dew,
            humidity_lag1: previous.humidity,
            extras: current.extras,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    /// Monday = 0 … Sunday = 6
    pub fn weekday(&self) -> u32 {
        self.date.weekday().num_days_from_monday()
    }

    pub fn value(&self, key: &FeatureKey) -> Option<f64> {
        match key {
            FeatureKey::Known(feature) => Some(match feature {
                Feature::Temp => self.temp,
                Feature::Humidity => self.humidity,
                Feature::PrecipProb => self.precipprob,
                Feature::WindSpeed => self.windspeed,
                Feature::Pressure => self.pressure,
                Feature::Dew => self.dew,
                Feature::Year => f64::from(self.year()),
                Feature::Month => f64::from(self.month()),
                Feature::Day => f64::from(self.day()),
                Feature::Weekday => f64::from(self.weekday()),
                Feature::PressureDiff => self.pressure_diff,
                Feature::DewPointSpread => self.dew_point_spread,
                Feature::HumidityLag1 => self.humidity_lag1,
            }),
            FeatureKey::Extra(name) => self.extras.get(name).copied(),
        }
    }

    /// True when every measured and derived field is finite. A missing cell
    /// is read as NaN, which also poisons the next day's lag and delta.
    pub fn has_measurements(&self) -> bool {
        [
            self.temp,
            self.humidity,
            self.precipprob,
            self.windspeed,
            self.pressure,
            self.dew,
            self.pressure_diff,
            self.dew_point_spread,
            self.humidity_lag1,
        ]
        .iter()
        .all(|value| value.is_finite())
    }

    /// True when every feature of `features` has a finite value
    pub fn is_complete(&self, features: &FeatureSet) -> bool {
        features
            .keys()
            .iter()
            .all(|key| self.value(key).is_some_and(f64::is_finite))
    }

    /// The feature vector in `features` order
    pub fn row(&self, features: &FeatureSet) -> Result<Vec<f64>, ForecastError> {
        features
            .keys()
            .iter()
            .map(|key| {
                self.value(key)
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ForecastError::FeatureAssembly {
                        feature: key.name().to_string(),
                        date: self.date,
                    })
            })
            .collect()
    }
}

/// Turns date-ascending observations of one kecamatan into records.
///
/// The first observation has no predecessor, so its lag and delta are
/// undefined and it yields no record.
pub fn engineer(observations: &[Observation]) -> Vec<HistoricalRecord> {
    observations
        .windows(2)
        .map(|pair| HistoricalRecord::derive(pair[1].clone(), &pair[0]))
        .collect()
}
