use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::error::{DifficultyError, ForecastError, RecommendError};

/// Body of every internal failure; details stay in the server log
pub const INTERNAL_ERROR_DETAIL: &str = "An internal server error occurred.";

const UNAVAILABLE_DETAIL: &str = "The model is not available. Please try again later.";

/// Error response with a `{"detail": ...}` body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> ApiError {
        ApiError { status, detail: detail.into() }
    }

    pub fn bad_request(detail: impl Into<String>) -> ApiError {
        ApiError::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> ApiError {
        ApiError::new(StatusCode::NOT_FOUND, detail)
    }

    /// Logs `cause` and hides it from the client
    pub fn internal(cause: impl std::fmt::Display) -> ApiError {
        error!("internal error: {}", cause);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL)
    }

    pub fn unavailable(cause: impl std::fmt::Display) -> ApiError {
        error!("service unavailable: {}", cause);
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_DETAIL)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

impl From<ForecastError> for ApiError {
    fn from(e: ForecastError) -> ApiError {
        match e {
            ForecastError::InvalidRequest(message) => ApiError::bad_request(message),
            ForecastError::InsufficientHistory { .. } => ApiError::bad_request(e.to_string()),
            ForecastError::UnknownEntity(_) => ApiError::not_found(e.to_string()),
            ForecastError::FeatureAssembly { .. } => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ForecastError::PredictorUnavailable(_) => ApiError::unavailable(e),
            ForecastError::MalformedHistory { .. } | ForecastError::Internal(_) => ApiError::internal(e),
        }
    }
}

impl From<DifficultyError> for ApiError {
    fn from(e: DifficultyError) -> ApiError {
        match e {
            DifficultyError::InvalidInput(_) => ApiError::bad_request(e.to_string()),
            DifficultyError::Prediction(_) => ApiError::internal(e),
        }
    }
}

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> ApiError {
        match e {
            RecommendError::Validation(message) => ApiError::bad_request(message),
            RecommendError::Internal(_) => ApiError::internal(e),
        }
    }
}
