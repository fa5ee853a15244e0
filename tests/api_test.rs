use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use hiplan::dataset::HistoryStore;
use hiplan::difficulty::{DifficultyArtifacts, DifficultyEstimator};
use hiplan::error::ForecastError;
use hiplan::features::{FeatureSet, Observation};
use hiplan::forecast::{ForecastLimits, StepPredictor, TargetValues};
use hiplan::models::difficulty_mlp::DifficultyMlp;
use hiplan::preprocessing::MinMaxScaler;
use hiplan::recommender::{Mountain, RecommendOptions, Recommender};
use hiplan::server::create_router;
use hiplan::service::{AppState, ArtifactSlot, WeatherService};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Predicts fixed values with a slightly drifting temperature
struct FixedPredictor {
    features: FeatureSet,
}

impl StepPredictor for FixedPredictor {
    fn window_len(&self) -> usize {
        4
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn knows_entity(&self, entity: &str) -> bool {
        entity == "Berastagi" || entity == "Sembalun"
    }

    fn predict(&self, _entity: &str, window: &Array2<f64>) -> Result<TargetValues, ForecastError> {
        Ok(TargetValues {
            precipprob: 42.123456,
            windspeed: 5.5678,
            temp: window[[window.nrows() - 1, 0]] + 0.333,
            humidity: 88.0,
        })
    }
}

fn history() -> HistoryStore {
    let first = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
    let mut rows: Vec<(String, Observation)> = (0..30)
        .map(|i| {
            (
                "Berastagi".to_string(),
                Observation {
                    date: first + Duration::days(i),
                    temp: 20.0,
                    humidity: 85.0,
                    precipprob: 50.0,
                    windspeed: 4.0,
                    pressure: 1010.0,
                    dew: 17.0,
                    extras: BTreeMap::new(),
                },
            )
        })
        .collect();
    // too short for a window
    rows.extend((0..3).map(|i| {
        (
            "Sembalun".to_string(),
            Observation {
                date: first + Duration::days(i),
                temp: 18.0,
                humidity: 80.0,
                precipprob: 30.0,
                windspeed: 6.0,
                pressure: 1012.0,
                dew: 12.0,
                extras: BTreeMap::new(),
            },
        )
    }));
    HistoryStore::from_observations(rows).unwrap()
}

fn weather_service() -> WeatherService {
    let predictor = FixedPredictor {
        features: FeatureSet::from_names(&["temp", "humidity", "dew_point_spread", "humidity_lag1", "weekday"]).unwrap(),
    };
    WeatherService::new(Box::new(predictor), history(), ForecastLimits::default())
}

fn estimator() -> DifficultyEstimator {
    let features = ["ketinggian", "jarak", "elevation_gain", "temp", "precipprob", "windspeed", "humidity"];
    let network = DifficultyMlp::new_using(features.len(), &[8], &mut StdRng::seed_from_u64(11));
    DifficultyEstimator::from_artifacts(DifficultyArtifacts {
        model: (&network).into(),
        scaler: MinMaxScaler::new(vec![0.0; 7], vec![4000.0, 30.0, 3000.0, 40.0, 100.0, 60.0, 100.0]).unwrap(),
        features: features.iter().map(|s| s.to_string()).collect(),
    })
    .unwrap()
}

fn recommender() -> Recommender {
    let mountain = |name: &str, province: &str, height: i64, access: &str| Mountain {
        name: name.to_string(),
        province: province.to_string(),
        height,
        access: access.to_string(),
    };
    Recommender::fit(vec![
        mountain("Gunung Sibayak", "Sumatera Utara", 2212, "Buka"),
        mountain("Gunung Sinabung", "Sumatera Utara", 2460, "Tutup"),
        mountain("Gunung Kerinci", "Jambi", 3805, "Buka"),
        mountain("Gunung Rinjani", "Nusa Tenggara Barat", 3726, "Buka"),
    ])
    .unwrap()
}

fn full_app() -> Router {
    let state = AppState {
        weather: Some(ArtifactSlot::ready("weather", weather_service())),
        difficulty: Some(ArtifactSlot::ready("difficulty", estimator())),
        recommender: Some(ArtifactSlot::ready("recommender", recommender())),
        recommend_options: RecommendOptions::default(),
    };
    create_router(Arc::new(state), true)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, value)
}

#[tokio::test]
async fn test_home_lists_mounted_endpoints() {
    let (status, body) = send(full_app(), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"], json!(["/forecast", "/predict", "/rekomendasi"]));
}

#[tokio::test]
async fn test_forecast_returns_rounded_consecutive_days() {
    let request = json!({"kecamatan_name": "Berastagi", "start_date": "2025-08-02", "forecast_days": 3});
    let (status, body) = send(full_app(), "POST", "/forecast", Some(request)).await;
    assert_eq!(status, StatusCode::OK);

    let days = body.as_array().unwrap();
    assert_eq!(days.len(), 3);
    let dates: Vec<&str> = days.iter().map(|d| d["datetime"].as_str().unwrap()).collect();
    assert_eq!(dates, vec!["2025-08-02", "2025-08-03", "2025-08-04"]);
    assert_eq!(days[0]["kecamatan"], "Berastagi");
    assert_eq!(days[0]["precipprob"], 42.1235);
    assert_eq!(days[0]["windspeed"], 5.57);
    assert_eq!(days[0]["humidity"], 88.0);
}

#[tokio::test]
async fn test_forecast_days_defaults_to_seven() {
    let request = json!({"kecamatan_name": "Berastagi", "start_date": "2025-07-31"});
    let (status, body) = send(full_app(), "POST", "/forecast", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_forecast_client_errors() {
    let cases = [
        (
            json!({"kecamatan_name": "Berastagi", "start_date": "02-08-2025", "forecast_days": 3}),
            StatusCode::BAD_REQUEST,
        ),
        (json!({"kecamatan_name": "Berastagi", "start_date": "2025-08-02", "forecast_days": 0}), StatusCode::BAD_REQUEST),
        (json!({"kecamatan_name": "Berastagi", "start_date": "2025-08-02", "forecast_days": 31}), StatusCode::BAD_REQUEST),
        (json!({"kecamatan_name": "Atlantis", "start_date": "2025-08-02", "forecast_days": 3}), StatusCode::NOT_FOUND),
        (json!({"kecamatan_name": "Sembalun", "start_date": "2025-07-05", "forecast_days": 3}), StatusCode::BAD_REQUEST),
        (json!({"start_date": "2025-08-02"}), StatusCode::UNPROCESSABLE_ENTITY),
    ];

    for (request, expected) in cases {
        let (status, body) = send(full_app(), "POST", "/forecast", Some(request.clone())).await;
        assert_eq!(status, expected, "request {}", request);
        assert!(body["detail"].is_string(), "request {}", request);
    }

    let request = json!({"kecamatan_name": "Berastagi", "start_date": "2025/08/02"});
    let (_, body) = send(full_app(), "POST", "/forecast", Some(request)).await;
    assert_eq!(body["detail"], "Invalid start_date format. Please use YYYY-MM-DD.");
}

#[tokio::test]
async fn test_failed_artifact_load_is_service_unavailable() {
    let state = AppState {
        weather: Some(ArtifactSlot::new("weather", || Err::<WeatherService, _>("weather.bin: no such file"))),
        difficulty: None,
        recommender: None,
        recommend_options: RecommendOptions::default(),
    };
    let app = create_router(Arc::new(state), false);

    let request = json!({"kecamatan_name": "Berastagi", "start_date": "2025-08-02"});
    for _ in 0..2 {
        let (status, body) = send(app.clone(), "POST", "/forecast", Some(request.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body["detail"].as_str().unwrap().contains("weather.bin"));
    }

    let (status, _) = send(app, "POST", "/predict", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predict_difficulty() {
    let request = json!({
        "ketinggian": 2212.0,
        "jarak": 7.5,
        "elevation_gain": 800.0,
        "temp": 19.0,
        "precipprob": 40.0,
        "windspeed": 8.0,
        "humidity": 85.0
    });
    let (status, body) = send(full_app(), "POST", "/predict", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    let time = body["estimated_time"].as_str().unwrap();
    assert!(time.contains(" jam ") && time.ends_with(" menit"), "{}", time);
    assert!(body["difficulty_score"].is_number());

    let (status, _) = send(full_app(), "POST", "/predict", Some(json!({"ketinggian": 2212.0}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_recommendations() {
    let (status, body) =
        send(full_app(), "POST", "/rekomendasi", Some(json!({"lokasi": "Sumatera Utara", "ketinggian": 2300}))).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["rekomendasi"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["Nama"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Gunung Sibayak"));
    assert!(!names.contains(&"Gunung Sinabung"));

    let (status, body) =
        send(full_app(), "POST", "/rekomendasi", Some(json!({"lokasi": "papua", "ketinggian": 100}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No matching mountain found.");

    for lokasi in ["", "12345"] {
        let (status, body) =
            send(full_app(), "POST", "/rekomendasi", Some(json!({"lokasi": lokasi, "ketinggian": 2000}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_recommendations_agree() {
    let app = full_app();
    let request = json!({"lokasi": "Sumatera Utara", "ketinggian": 2300});
    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(send(app.clone(), "POST", "/rekomendasi", Some(request.clone()))))
        .collect();

    let mut bodies = Vec::new();
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }
    assert!(bodies[0]["rekomendasi"].is_array());
    assert!(bodies.iter().all(|body| *body == bodies[0]));
}
