use crate::error::ForecastError;
use crate::features::{FeatureSet, HistoricalRecord};
use crate::forecast::predictor::PredictionStep;

/// Builds the record that follows `previous` from a fresh prediction.
///
/// - date is the day after `previous`; date parts follow from it
/// - the four targets are taken from the prediction as-is
/// - dew point and pressure are not predicted and carry forward, so the
///   pressure delta is zero
/// - dew point spread uses the predicted temperature and the carried dew point
/// - the humidity lag is the humidity of `previous`
/// - extra columns carry forward unchanged
///
/// Fails with `FeatureAssembly` when the new record cannot supply every
/// feature of `features`; missing values are never replaced with zero.
pub fn synthesize_next(
    previous: &HistoricalRecord,
    step: &PredictionStep,
    features: &FeatureSet,
) -> Result<HistoricalRecord, ForecastError> {
    let date = previous.date.succ_opt().ok_or_else(|| ForecastError::FeatureAssembly {
        feature: "datetime".to_string(),
        date: previous.date,
    })?;
    if step.date != date {
        return Err(ForecastError::Internal(format!(
            "prediction for {} cannot follow record of {}",
            step.date, previous.date
        )));
    }

    let pressure = previous.pressure;
    let record = HistoricalRecord {
        date,
        temp: step.temp,
        humidity: step.humidity,
        precipprob: step.precipprob,
        windspeed: step.windspeed,
        pressure,
        dew: previous.dew,
        pressure_diff: pressure - previous.pressure,
        dew_point_spread: step.temp - previous.dew,
        humidity_lag1: previous.humidity,
        extras: previous.extras.clone(),
    };

    record.row(features)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn previous() -> HistoricalRecord {
        HistoricalRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            temp: 22.0,
            humidity: 81.0,
            precipprob: 35.0,
            windspeed: 6.0,
            pressure: 1009.5,
            dew: 17.25,
            pressure_diff: -0.5,
            dew_point_spread: 4.75,
            humidity_lag1: 78.0,
            extras: BTreeMap::from([("cloudcover".to_string(), 64.0)]),
        }
    }

    fn step(date: NaiveDate) -> PredictionStep {
        PredictionStep {
            entity: "berastagi".to_string(),
            date,
            precipprob: 72.5,
            windspeed: 9.5,
            temp: 19.75,
            humidity: 88.0,
        }
    }

    #[test]
    fn test_synthesizes_next_row() {
        let features = FeatureSet::from_names(&[
            "temp", "humidity", "precipprob", "windspeed", "pressure", "dew", "month", "day",
            "weekday", "pressure_diff", "dew_point_spread", "humidity_lag1", "cloudcover",
        ])
        .unwrap();
        let next_date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        let record = synthesize_next(&previous(), &step(next_date), &features).unwrap();

        assert_eq!(record.date, next_date);
        assert_eq!(record.month(), 2);
        assert_eq!(record.day(), 1);
        // 2025-02-01 is a Saturday
        assert_eq!(record.weekday(), 5);
        assert_eq!(record.temp, 19.75);
        assert_eq!(record.humidity, 88.0);
        assert_eq!(record.precipprob, 72.5);
        assert_eq!(record.windspeed, 9.5);
        assert_eq!(record.dew.to_bits(), 17.25f64.to_bits());
        assert_eq!(record.pressure.to_bits(), 1009.5f64.to_bits());
        assert_eq!(record.pressure_diff, 0.0);
        assert_eq!(record.dew_point_spread, 19.75 - 17.25);
        assert_eq!(record.humidity_lag1, 81.0);
        assert_eq!(record.extras.get("cloudcover"), Some(&64.0));
    }

    #[test]
    fn test_missing_feature_fails() {
        let features = FeatureSet::from_names(&["temp", "visibility"]).unwrap();
        let next_date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        match synthesize_next(&previous(), &step(next_date), &features) {
            Err(ForecastError::FeatureAssembly { feature, date }) => {
                assert_eq!(feature, "visibility");
                assert_eq!(date, next_date);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_prediction_fails() {
        let features = FeatureSet::from_names(&["temp"]).unwrap();
        let mut bad = step(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        bad.temp = f64::NAN;
        assert!(matches!(
            synthesize_next(&previous(), &bad, &features),
            Err(ForecastError::FeatureAssembly { .. })
        ));
    }

    #[test]
    fn test_step_date_must_follow_previous() {
        let features = FeatureSet::from_names(&["temp"]).unwrap();
        let wrong = step(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert!(matches!(
            synthesize_next(&previous(), &wrong, &features),
            Err(ForecastError::Internal(_))
        ));
    }
}
