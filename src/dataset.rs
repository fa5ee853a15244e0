//! Historical weather dataset
//!
//! The dataset is one CSV file, or a directory of CSV files such as the
//! scraper's per-kecamatan output. Rows are grouped by kecamatan, ordered by
//! date and engineered into [`HistoricalRecord`]s once at load time.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::DatasetError;
use crate::features::{engineer, FeatureSet, HistoricalRecord, Observation};

pub const ENTITY_COLUMN: &str = "kecamatan";
pub const DATE_COLUMN: &str = "datetime";
const MEASURED_COLUMNS: [&str; 6] = ["temp", "humidity", "precipprob", "windspeed", "pressure", "dew"];

/// Engineered history of every kecamatan, oldest record first
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    entities: BTreeMap<String, Vec<HistoricalRecord>>,
}

impl HistoryStore {
    /// Loads a CSV file or every `*.csv` file of a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HistoryStore, DatasetError> {
        let path = path.as_ref();
        let files = if path.is_dir() { csv_files(path)? } else { vec![path.to_path_buf()] };

        let mut rows = Vec::new();
        for file in &files {
            let before = rows.len();
            read_observations(file, &mut rows)?;
            debug!(file = %file.display(), rows = rows.len() - before, "read dataset file");
        }

        let store = HistoryStore::from_observations(rows)?;
        info!(
            path = %path.display(),
            files = files.len(),
            entities = store.entities.len(),
            records = store.len(),
            "historical dataset loaded"
        );
        Ok(store)
    }

    /// Groups observations by kecamatan, orders them and engineers records.
    ///
    /// Records left with a non-finite measured or derived value are dropped
    /// after engineering. Two observations of the same kecamatan on the same
    /// date are rejected.
    pub fn from_observations(rows: Vec<(String, Observation)>) -> Result<HistoryStore, DatasetError> {
        let mut grouped: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for (entity, observation) in rows {
            grouped.entry(entity).or_default().push(observation);
        }

        let mut entities = BTreeMap::new();
        for (entity, mut observations) in grouped {
            observations.sort_by_key(|observation| observation.date);
            if let Some(pair) = observations.windows(2).find(|pair| pair[0].date == pair[1].date) {
                return Err(DatasetError::DuplicateDate { entity, date: pair[0].date });
            }
            let mut records = engineer(&observations);
            let before = records.len();
            records.retain(HistoricalRecord::has_measurements);
            if records.len() < before {
                warn!(entity = %entity, dropped = before - records.len(), "dropped records with missing measurements");
            }
            entities.insert(entity, records);
        }

        Ok(HistoryStore { entities })
    }

    pub fn records(&self, entity: &str) -> Option<&[HistoricalRecord]> {
        self.entities.get(entity).map(Vec::as_slice)
    }

    pub fn last_date(&self, entity: &str) -> Option<NaiveDate> {
        self.entities.get(entity)?.last().map(|record| record.date)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Total number of records over all kecamatan
    pub fn len(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops records lacking a finite value for any of `features`; returns
    /// how many were dropped.
    pub fn retain_complete(&mut self, features: &FeatureSet) -> usize {
        let mut dropped = 0;
        for records in self.entities.values_mut() {
            let before = records.len();
            records.retain(|record| record.is_complete(features));
            dropped += before - records.len();
        }
        if dropped > 0 {
            warn!(dropped, "dropped historical records with missing model features");
        }
        dropped
    }
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(DatasetError::Empty(dir.display().to_string()));
    }
    files.sort();
    Ok(files)
}

/// Accepts `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM:SS` (also with a space)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.date()))
}

fn read_observations(path: &Path, rows: &mut Vec<(String, Observation)>) -> Result<(), DatasetError> {
    let file_name = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();
    let column = |name: &str| {
        columns.get(name).copied().ok_or_else(|| DatasetError::MissingColumn {
            path: file_name.clone(),
            column: name.to_string(),
        })
    };

    let entity_index = column(ENTITY_COLUMN)?;
    let date_index = column(DATE_COLUMN)?;
    let mut measured = [0usize; 6];
    for (slot, name) in measured.iter_mut().zip(MEASURED_COLUMNS) {
        *slot = column(name)?;
    }
    let extra_columns: Vec<(&String, usize)> = columns
        .iter()
        .filter(|(name, _)| {
            name.as_str() != ENTITY_COLUMN && name.as_str() != DATE_COLUMN && !MEASURED_COLUMNS.contains(&name.as_str())
        })
        .map(|(name, &i)| (name, i))
        .collect();

    let mut skipped = 0usize;
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let invalid = |message: String| DatasetError::InvalidValue { path: file_name.clone(), line, message };

        let entity = record.get(entity_index).unwrap_or("").to_string();
        if entity.is_empty() {
            skipped += 1;
            continue;
        }
        let raw_date = record.get(date_index).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| invalid(format!("invalid date '{}'", raw_date)))?;

        // empty cells stay NaN until the records are engineered
        let mut values = [f64::NAN; 6];
        for (value, (&index, name)) in values.iter_mut().zip(measured.iter().zip(MEASURED_COLUMNS)) {
            let cell = record.get(index).unwrap_or("");
            if cell.is_empty() {
                continue;
            }
            *value = cell
                .parse()
                .map_err(|_| invalid(format!("column '{}' is not numeric: '{}'", name, cell)))?;
        }

        let extras = extra_columns
            .iter()
            .filter_map(|(name, index)| {
                let value: f64 = record.get(*index)?.parse().ok()?;
                Some(((*name).clone(), value))
            })
            .collect();

        let [temp, humidity, precipprob, windspeed, pressure, dew] = values;
        rows.push((
            entity,
            Observation { date, temp, humidity, precipprob, windspeed, pressure, dew, extras },
        ));
    }

    if skipped > 0 {
        warn!(file = %file_name, skipped, "skipped rows without a kecamatan");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::io::Write;

    const CSV: &str = "\
Kecamatan,datetime,temp,humidity,precipprob,windspeed,pressure,dew,cloudcover,conditions
berastagi,2025-01-02,20.5,85,60,8.1,1011,17.2,70,Rain
berastagi,2025-01-01,21.0,80,40,7.5,1010,17.0,,Cloudy
berastagi,2025-01-03T00:00:00,19.8,90,,9.0,1012,17.5,90,Rain
berastagi,2025-01-04,20.0,88,70,9.4,1013,17.6,85,Rain
cibodas,2025-01-01,18.0,92,80,5.0,1009,16.0,95,Rain
cibodas,2025-01-02,18.5,90,75,5.5,1008,16.1,92,Rain
";

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_groups_sorts_and_engineers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "weather.csv", CSV);

        let store = HistoryStore::load(&path).unwrap();
        assert_eq!(store.entities().collect::<Vec<_>>(), vec!["berastagi", "cibodas"]);

        // berastagi: 01-03 has no precipprob and is dropped; 01-01 only seeds the lag
        let records = store.records("berastagi").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(records[0].humidity_lag1, 80.0);
        assert_eq!(records[0].extras.get("cloudcover"), Some(&70.0));
        assert!(!records[0].extras.contains_key("conditions"));
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2025, 1, 4).unwrap());
        assert_eq!(records[1].pressure_diff, 1.0);
        assert_eq!(records[1].humidity_lag1, 90.0);

        assert_eq!(store.last_date("cibodas"), NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_incomplete_rows_are_dropped_after_engineering() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "gaps.csv",
            "kecamatan,datetime,temp,humidity,precipprob,windspeed,pressure,dew\n\
             a,2025-01-01,20,80,40,5,1010,15\n\
             a,2025-01-02,20,85,40,5,1011,15\n\
             a,2025-01-03,20,90,,5,1012,15\n\
             a,2025-01-04,20,95,40,5,1013,15\n\
             a,2025-01-05,20,70,40,5,,15\n\
             a,2025-01-06,20,75,40,5,1014,15\n\
             a,2025-01-07,20,65,40,5,1016,15\n\
             ,2025-01-08,20,65,40,5,1016,15\n",
        );

        let store = HistoryStore::load(&path).unwrap();
        let records = store.records("a").unwrap();
        let dates: Vec<u32> = records.iter().map(|record| record.date.day()).collect();
        // 01-05 lacks pressure, which also leaves 01-06 without a pressure_diff
        assert_eq!(dates, vec![2, 4, 7]);

        assert_eq!(records[1].pressure_diff, 1.0);
        assert_eq!(records[1].humidity_lag1, 90.0);
        assert_eq!(records[2].pressure_diff, 2.0);
        assert_eq!(records[2].humidity_lag1, 75.0);
        assert!(records.iter().all(HistoricalRecord::has_measurements));
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        let header = "kecamatan,datetime,temp,humidity,precipprob,windspeed,pressure,dew\n";
        write_csv(dir.path(), "weather_a.csv", &format!("{}a,2025-01-01,1,2,3,4,5,6\na,2025-01-02,1,2,3,4,5,6\n", header));
        write_csv(dir.path(), "weather_b.CSV", &format!("{}b,2025-01-01,1,2,3,4,5,6\nb,2025-01-02,1,2,3,4,5,6\n", header));
        write_csv(dir.path(), "notes.txt", "ignored");

        let store = HistoryStore::load(dir.path()).unwrap();
        assert_eq!(store.entities().count(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_dates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "dup.csv",
            "kecamatan,datetime,temp,humidity,precipprob,windspeed,pressure,dew\n\
             a,2025-01-01,1,2,3,4,5,6\na,2025-01-01,1,2,3,4,5,6\n",
        );
        assert!(matches!(HistoryStore::load(&path), Err(DatasetError::DuplicateDate { .. })));
    }

    #[test]
    fn test_missing_column_and_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bad.csv", "kecamatan,datetime,temp\na,2025-01-01,1\n");
        assert!(matches!(HistoryStore::load(&path), Err(DatasetError::MissingColumn { .. })));

        let path = write_csv(
            dir.path(),
            "bad2.csv",
            "kecamatan,datetime,temp,humidity,precipprob,windspeed,pressure,dew\na,01/02/2025,1,2,3,4,5,6\n",
        );
        assert!(matches!(HistoryStore::load(&path), Err(DatasetError::InvalidValue { .. })));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(HistoryStore::load(empty.path()), Err(DatasetError::Empty(_))));
    }

    #[test]
    fn test_retain_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "weather.csv", CSV);
        let mut store = HistoryStore::load(&path).unwrap();

        let features = FeatureSet::from_names(&["temp", "cloudcover"]).unwrap();
        assert_eq!(store.retain_complete(&features), 0);

        let features = FeatureSet::from_names(&["temp", "visibility"]).unwrap();
        assert_eq!(store.retain_complete(&features), 3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 8, 8);
        assert_eq!(parse_date("2025-08-08"), expected);
        assert_eq!(parse_date("2025-08-08T00:00:00"), expected);
        assert_eq!(parse_date("2025-08-08 12:30:00"), expected);
        assert_eq!(parse_date("08-08-2025"), None);
    }
}
