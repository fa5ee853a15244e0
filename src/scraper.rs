//! Daily weather scraper for the historical dataset
//!
//! Fetches one Visual Crossing timeline per kecamatan and writes it to
//! `weather_<name>.csv`, the layout [`crate::dataset::HistoryStore`] reads.
//! Rate-limited keys are rotated; the run stops when keys run out or too
//! many rate limits were hit.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use ureq::Agent;

use crate::config::ScraperConfig;
use crate::dataset::ENTITY_COLUMN;
use crate::error::ScrapeError;

/// Column of the regions CSV holding kecamatan names
pub const REGION_COLUMN: &str = "Kecamatan";

/// Result of one timeline request
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Days(Vec<Map<String, Value>>),
    /// HTTP 429 for the key used
    RateLimited,
}

/// Source of daily weather records
pub trait WeatherSource {
    fn fetch(&self, region: &str, api_key: &str) -> Result<Fetch, ScrapeError>;
}

#[derive(Deserialize)]
struct Timeline {
    #[serde(default)]
    days: Vec<Map<String, Value>>,
}

/// Visual Crossing timeline API
pub struct VisualCrossing {
    agent: Agent,
    base_url: String,
    start_date: String,
    end_date: String,
}

impl VisualCrossing {
    pub fn new(config: &ScraperConfig) -> Result<VisualCrossing, ScrapeError> {
        let (start, end) = config.date_range().map_err(|e| ScrapeError::Config(e.to_string()))?;
        let agent_config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(VisualCrossing {
            agent: agent_config.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
        })
    }

    fn url(&self, region: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, encode_path_segment(region), self.start_date, self.end_date)
    }
}

impl WeatherSource for VisualCrossing {
    fn fetch(&self, region: &str, api_key: &str) -> Result<Fetch, ScrapeError> {
        let response = self
            .agent
            .get(self.url(region))
            .query("unitGroup", "metric")
            .query("include", "days")
            .query("key", api_key)
            .query("contentType", "json")
            .call();

        match response {
            Ok(mut response) => {
                let json = response.body_mut().read_to_string()?;
                let timeline: Timeline = serde_json::from_str(&json)?;
                Ok(Fetch::Days(timeline.days))
            }
            Err(ureq::Error::StatusCode(429)) => Ok(Fetch::RateLimited),
            Err(e) => Err(e.into()),
        }
    }
}

/// Outcome counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub saved: usize,
    /// Output file already present
    pub skipped: usize,
    /// Response without days
    pub empty: usize,
    pub failed: usize,
    /// Keys exhausted or rate limit budget spent
    pub aborted: bool,
}

/// Pacing and rate limit budget of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeLimits {
    pub max_429_errors: usize,
    pub request_pause: Duration,
    pub key_switch_pause: Duration,
}

impl From<&ScraperConfig> for ScrapeLimits {
    fn from(config: &ScraperConfig) -> Self {
        ScrapeLimits {
            max_429_errors: config.max_429_errors,
            request_pause: Duration::from_millis(config.request_pause_ms),
            key_switch_pause: Duration::from_millis(config.key_switch_pause_ms),
        }
    }
}

/// Reads the distinct, non-blank kecamatan names in file order
pub fn read_regions<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ScrapeError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path.as_ref())?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header.eq_ignore_ascii_case(REGION_COLUMN))
        .ok_or_else(|| {
            ScrapeError::Config(format!("{} has no '{}' column", path.as_ref().display(), REGION_COLUMN))
        })?;

    let mut seen = HashSet::new();
    let mut regions = Vec::new();
    for record in reader.records() {
        let record = record?;
        match record.get(column) {
            Some(name) if !name.is_empty() && seen.insert(name.to_string()) => regions.push(name.to_string()),
            _ => {}
        }
    }
    Ok(regions)
}

/// `weather_<name>.csv` with spaces and slashes removed from the name
pub fn output_file(output_dir: &Path, region: &str) -> PathBuf {
    let safe: String = region.chars().filter(|c| *c != ' ' && *c != '/').collect();
    output_dir.join(format!("weather_{}.csv", safe))
}

/// Fetches every region in turn.
///
/// A 429 moves to the next key and retries the same region. Any other
/// failure is logged and the region is left for a later run.
pub fn scrape<S: WeatherSource + ?Sized>(
    source: &S,
    regions: &[String],
    api_keys: &[String],
    output_dir: &Path,
    limits: ScrapeLimits,
) -> Result<ScrapeSummary, ScrapeError> {
    let keys: Vec<&str> = api_keys.iter().map(|key| key.trim()).filter(|key| !key.is_empty()).collect();
    if keys.is_empty() {
        return Err(ScrapeError::Config("no API keys configured".to_string()));
    }
    fs::create_dir_all(output_dir)?;

    let mut summary = ScrapeSummary::default();
    let mut key_index = 0;
    let mut rate_limit_errors = 0;

    'regions: for region in regions {
        let path = output_file(output_dir, region);
        if path.exists() {
            info!(file = %path.display(), "already exists, skipping");
            summary.skipped += 1;
            continue;
        }

        loop {
            info!(region = %region, "fetching");
            match source.fetch(region, keys[key_index]) {
                Ok(Fetch::RateLimited) => {
                    rate_limit_errors += 1;
                    warn!(region = %region, key_index, rate_limit_errors, "rate limited");
                    if rate_limit_errors >= limits.max_429_errors {
                        error!("too many rate limit errors, aborting");
                        summary.aborted = true;
                        break 'regions;
                    }
                    key_index += 1;
                    if key_index >= keys.len() {
                        error!("all API keys exhausted, aborting");
                        summary.aborted = true;
                        break 'regions;
                    }
                    info!(key_index, "switching API key");
                    sleep(limits.key_switch_pause);
                }
                Ok(Fetch::Days(days)) if days.is_empty() => {
                    warn!(region = %region, "no data");
                    summary.empty += 1;
                    break;
                }
                Ok(Fetch::Days(days)) => {
                    match write_days(&path, region, &days) {
                        Ok(()) => {
                            info!(file = %path.display(), days = days.len(), "saved");
                            summary.saved += 1;
                        }
                        Err(e) => {
                            error!(region = %region, "cannot write {}: {}", path.display(), e);
                            // a partial file would be skipped by the next run
                            let _ = fs::remove_file(&path);
                            summary.failed += 1;
                        }
                    }
                    break;
                }
                Err(e) => {
                    error!(region = %region, "{}", e);
                    summary.failed += 1;
                    break;
                }
            }
        }

        sleep(limits.request_pause);
    }

    info!(
        saved = summary.saved,
        skipped = summary.skipped,
        empty = summary.empty,
        failed = summary.failed,
        aborted = summary.aborted,
        "scrape finished"
    );
    Ok(summary)
}

/// Runs a whole scrape as configured
pub fn run(config: &ScraperConfig) -> Result<ScrapeSummary, ScrapeError> {
    let regions = read_regions(&config.regions_path)?;
    info!(regions = regions.len(), output_dir = %config.output_dir.display(), "starting scrape");
    let source = VisualCrossing::new(config)?;
    scrape(&source, &regions, &config.api_keys, &config.output_dir, ScrapeLimits::from(config))
}

/// Writes days as CSV: the union of day fields in first-seen order plus the
/// kecamatan column.
pub fn write_days(path: &Path, region: &str, days: &[Map<String, Value>]) -> Result<(), ScrapeError> {
    let mut columns: Vec<&str> = Vec::new();
    for day in days {
        for key in day.keys() {
            if key != ENTITY_COLUMN && !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter().copied().chain(std::iter::once(ENTITY_COLUMN)))?;
    for day in days {
        let mut row: Vec<String> = columns.iter().map(|column| cell(day.get(*column))).collect();
        row.push(region.to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b',' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
