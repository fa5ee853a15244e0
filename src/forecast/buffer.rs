use std::collections::VecDeque;

use chrono::NaiveDate;
use ndarray::Array2;

use crate::error::ForecastError;
use crate::features::{FeatureSet, HistoricalRecord};

/// Rolling window of the `capacity` most recent records of one kecamatan,
/// oldest first.
///
/// The length never changes after construction: every slide drops exactly the
/// oldest record and appends exactly one newer record.
#[derive(Clone, Debug)]
pub struct FeatureBuffer {
    entity: String,
    rows: VecDeque<HistoricalRecord>,
    capacity: usize,
}

impl FeatureBuffer {
    /// Builds the window from the last `n` records dated strictly before `as_of`.
    ///
    /// `records` must be strictly ascending by date.
    pub fn initialize(
        entity: &str,
        records: &[HistoricalRecord],
        as_of: NaiveDate,
        n: usize,
    ) -> Result<FeatureBuffer, ForecastError> {
        if n == 0 {
            return Err(ForecastError::Internal("window length must be positive".to_string()));
        }
        check_ordering(entity, records)?;

        let end = records.partition_point(|record| record.date < as_of);
        if end < n {
            return Err(ForecastError::InsufficientHistory {
                entity: entity.to_string(),
                before: as_of,
                required: n,
                found: end,
            });
        }

        Ok(FeatureBuffer {
            entity: entity.to_string(),
            rows: records[end - n..end].iter().cloned().collect(),
            capacity: n,
        })
    }

    /// Drops the oldest record and appends `row`, which must be dated after
    /// the current newest record.
    pub fn slide(&mut self, row: HistoricalRecord) -> Result<(), ForecastError> {
        let newest = self.newest().date;
        if row.date <= newest {
            return Err(ForecastError::MalformedHistory {
                entity: self.entity.clone(),
                previous: newest,
                date: row.date,
            });
        }
        self.rows.pop_front();
        self.rows.push_back(row);
        debug_assert_eq!(self.rows.len(), self.capacity);
        Ok(())
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn newest(&self) -> &HistoricalRecord {
        // initialize() guarantees at least one row and slide() keeps the length
        &self.rows[self.rows.len() - 1]
    }

    pub fn oldest(&self) -> &HistoricalRecord {
        &self.rows[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoricalRecord> {
        self.rows.iter()
    }

    /// Unscaled `(len, features.len())` model input, oldest row first
    pub fn to_matrix(&self, features: &FeatureSet) -> Result<Array2<f64>, ForecastError> {
        let mut flat = Vec::with_capacity(self.rows.len() * features.len());
        for record in &self.rows {
            flat.extend(record.row(features)?);
        }
        Array2::from_shape_vec((self.rows.len(), features.len()), flat)
            .map_err(|e| ForecastError::Internal(format!("window matrix: {}", e)))
    }
}

fn check_ordering(entity: &str, records: &[HistoricalRecord]) -> Result<(), ForecastError> {
    match records.windows(2).find(|pair| pair[1].date <= pair[0].date) {
        Some(pair) => Err(ForecastError::MalformedHistory {
            entity: entity.to_string(),
            previous: pair[0].date,
            date: pair[1].date,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(day: u32) -> HistoricalRecord {
        HistoricalRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            temp: 20.0 + day as f64,
            humidity: 80.0,
            precipprob: 50.0,
            windspeed: 5.0,
            pressure: 1010.0,
            dew: 18.0,
            pressure_diff: 0.0,
            dew_point_spread: 2.0 + day as f64,
            humidity_lag1: 80.0,
            extras: BTreeMap::new(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[test]
    fn test_initialize_takes_last_n_before_date() {
        let records: Vec<_> = (1..=10).map(record).collect();
        let buffer = FeatureBuffer::initialize("a", &records, date(8), 3).unwrap();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest().date, date(5));
        assert_eq!(buffer.newest().date, date(7));
    }

    #[test]
    fn test_initialize_with_exactly_n_minus_one_records_fails() {
        let records: Vec<_> = (1..=10).map(record).collect();
        match FeatureBuffer::initialize("a", &records, date(3), 3) {
            Err(ForecastError::InsufficientHistory { required, found, .. }) => {
                assert_eq!(required, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_initialize_rejects_unordered_records() {
        let records = vec![record(1), record(3), record(3)];
        assert!(matches!(
            FeatureBuffer::initialize("a", &records, date(9), 2),
            Err(ForecastError::MalformedHistory { .. })
        ));
    }

    #[test]
    fn test_slide_keeps_length() {
        let records: Vec<_> = (1..=5).map(record).collect();
        let mut buffer = FeatureBuffer::initialize("a", &records, date(6), 4).unwrap();

        buffer.slide(record(6)).unwrap();
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.oldest().date, date(3));
        assert_eq!(buffer.newest().date, date(6));

        assert!(buffer.slide(record(6)).is_err());
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_to_matrix_orders_rows_oldest_first() {
        let records: Vec<_> = (1..=4).map(record).collect();
        let buffer = FeatureBuffer::initialize("a", &records, date(5), 2).unwrap();
        let features = FeatureSet::from_names(&["temp", "day"]).unwrap();

        let matrix = buffer.to_matrix(&features).unwrap();
        assert_eq!(matrix, ndarray::arr2(&[[23.0, 3.0], [24.0, 4.0]]));
    }
}
