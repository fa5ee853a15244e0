//! HTTP surface: one router mounting the configured services.
//!
//! | route              | service     |
//! |--------------------|-------------|
//! | `GET /`            | banner      |
//! | `POST /forecast`   | weather     |
//! | `POST /predict`    | difficulty  |
//! | `POST /rekomendasi`| recommender |

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config;
use crate::service::AppState;

pub use error::ApiError;

/// Builds the router; routes of unconfigured services are not mounted
pub fn create_router(state: Arc<AppState>, cors: bool) -> Router {
    let mut router = Router::new().route("/", get(handlers::home));
    if state.weather.is_some() {
        router = router.route("/forecast", post(handlers::forecast));
    }
    if state.difficulty.is_some() {
        router = router.route("/predict", post(handlers::predict_difficulty));
    }
    if state.recommender.is_some() {
        router = router.route("/rekomendasi", post(handlers::recommend));
    }

    let mut router = router.with_state(state).layer(TraceLayer::new_for_http());
    if cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

/// Serves until Ctrl-C
pub async fn serve(server: &config::Server, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port)).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state, server.cors))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
