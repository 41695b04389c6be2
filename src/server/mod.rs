//! HTTP API
//!
//! Routes, shared state and error mapping. `build_router` is the whole
//! surface; `main` only binds it to a socket.

pub mod error;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, SharedState};

/// Build the application router
pub fn build_router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Liveness
        .route("/", get(routes::health::index))
        .route("/health", get(routes::health::health_check))

        // Prediction
        .route("/api/predict/", post(routes::predict::predict))
        .route("/api/predict", post(routes::predict::predict))
        .route("/api/predict/disease", post(routes::predict::predict_disease))
        .route("/api/predict/variety", post(routes::predict::predict_variety))
        .route("/api/predict/age", post(routes::predict::predict_age))

        // History and images
        .route("/api/history/", get(routes::history::get_history))
        .route("/api/history", get(routes::history::get_history))
        .route("/api/image/:id", get(routes::image::get_image))

        .with_state(state)

        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
