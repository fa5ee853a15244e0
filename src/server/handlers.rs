use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::difficulty::{DifficultyEstimate, HikeInput};
use crate::error::ForecastError;
use crate::forecast::{ForecastRequest, PredictionStep};
use crate::server::error::ApiError;
use crate::service::AppState;
use crate::utils::round_to;

fn default_forecast_days() -> i64 {
    7
}

/// `POST /forecast` body
#[derive(Deserialize, Debug, Clone)]
pub struct ForecastBody {
    pub kecamatan_name: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: i64,
}

impl ForecastBody {
    pub fn into_request(self) -> Result<ForecastRequest, ForecastError> {
        let start_date = NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").map_err(|_| {
            ForecastError::InvalidRequest("Invalid start_date format. Please use YYYY-MM-DD.".to_string())
        })?;
        let days = usize::try_from(self.forecast_days)
            .map_err(|_| ForecastError::InvalidRequest("forecast_days must be a positive number".to_string()))?;
        Ok(ForecastRequest { entity: self.kecamatan_name.trim().to_string(), start_date, days })
    }
}

/// One served forecast day, rounded for the wire
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub datetime: NaiveDate,
    pub kecamatan: String,
    pub precipprob: f64,
    pub windspeed: f64,
    pub temp: f64,
    pub humidity: f64,
}

impl From<&PredictionStep> for ForecastDay {
    fn from(step: &PredictionStep) -> Self {
        ForecastDay {
            datetime: step.date,
            kecamatan: step.entity.clone(),
            precipprob: round_to(step.precipprob, 4),
            windspeed: round_to(step.windspeed, 2),
            temp: round_to(step.temp, 2),
            humidity: round_to(step.humidity, 2),
        }
    }
}

/// `POST /rekomendasi` body
#[derive(Deserialize, Debug, Clone)]
pub struct RecommendBody {
    pub lokasi: String,
    pub ketinggian: f64,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))
}

fn not_configured(service: &str) -> ApiError {
    ApiError::not_found(format!("the {} service is not configured", service))
}

pub async fn home(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut endpoints = Vec::new();
    if state.weather.is_some() {
        endpoints.push("/forecast");
    }
    if state.difficulty.is_some() {
        endpoints.push("/predict");
    }
    if state.recommender.is_some() {
        endpoints.push("/rekomendasi");
    }
    Json(json!({
        "message": "HiPlan prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

#[instrument(skip_all)]
pub async fn forecast(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ForecastBody>, JsonRejection>,
) -> Result<Json<Vec<ForecastDay>>, ApiError> {
    let request = json_body(body)?.into_request()?;
    let slot = state.weather.as_ref().ok_or_else(|| not_configured("weather"))?;
    let service = slot.get().await?;

    info!(entity = %request.entity, start_date = %request.start_date, days = request.days, "forecast requested");
    let steps = tokio::task::spawn_blocking(move || service.forecast(&request))
        .await
        .map_err(ApiError::internal)??;

    Ok(Json(steps.iter().map(ForecastDay::from).collect()))
}

#[instrument(skip_all)]
pub async fn predict_difficulty(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HikeInput>, JsonRejection>,
) -> Result<Json<DifficultyEstimate>, ApiError> {
    let input = json_body(body)?;
    let slot = state.difficulty.as_ref().ok_or_else(|| not_configured("difficulty"))?;
    let estimator = slot.get().await?;

    let estimate = tokio::task::spawn_blocking(move || estimator.estimate(&input))
        .await
        .map_err(ApiError::internal)??;
    info!(difficulty = estimate.difficulty_score, time = %estimate.estimated_time, "difficulty estimated");
    Ok(Json(estimate))
}

#[instrument(skip_all)]
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RecommendBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let slot = state.recommender.as_ref().ok_or_else(|| not_configured("recommender"))?;
    let recommender = slot.get().await?;
    let options = state.recommend_options;

    let RecommendBody { lokasi, ketinggian } = body;
    let (lokasi, mountains) = tokio::task::spawn_blocking(move || {
        let mountains = recommender.recommend(&lokasi, ketinggian, &options);
        (lokasi, mountains)
    })
    .await
    .map_err(ApiError::internal)?;
    let mountains = mountains?;
    info!(lokasi = %lokasi, matches = mountains.len(), "recommendation served");
    if mountains.is_empty() {
        return Ok(Json(json!({ "message": "No matching mountain found." })));
    }
    Ok(Json(json!({ "rekomendasi": mountains })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_body_parsing() {
        let body: ForecastBody =
            serde_json::from_str(r#"{"kecamatan_name": " berastagi ", "start_date": "2025-08-08"}"#).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.entity, "berastagi");
        assert_eq!(request.days, 7);
        assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2025, 8, 8).unwrap());

        let bad_date = ForecastBody {
            kecamatan_name: "berastagi".to_string(),
            start_date: "08/08/2025".to_string(),
            forecast_days: 3,
        };
        assert!(matches!(bad_date.into_request(), Err(ForecastError::InvalidRequest(_))));

        let negative = ForecastBody {
            kecamatan_name: "berastagi".to_string(),
            start_date: "2025-08-08".to_string(),
            forecast_days: -2,
        };
        assert!(matches!(negative.into_request(), Err(ForecastError::InvalidRequest(_))));
    }

    #[test]
    fn test_forecast_day_rounding() {
        let step = PredictionStep {
            entity: "berastagi".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 8, 8).unwrap(),
            precipprob: 61.234567,
            windspeed: 7.456,
            temp: 19.994,
            humidity: 88.125001,
        };
        let day = ForecastDay::from(&step);
        assert_eq!(day.precipprob, 61.2346);
        assert_eq!(day.windspeed, 7.46);
        assert_eq!(day.temp, 19.99);
        assert_eq!(day.humidity, 88.13);

        let wire = serde_json::to_value(&day).unwrap();
        assert_eq!(wire["datetime"], "2025-08-08");
        assert_eq!(wire["kecamatan"], "berastagi");
    }
}
