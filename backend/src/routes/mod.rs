//! Route definitions for the irrigation backend

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Crop base-water table
        .route("/crop-info", get(handlers::crop_info))
        // Model inference
        .route("/predict", post(handlers::predict))
}
