//! Prediction HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use crate::error::AppError;
use crate::AppState;

/// Predict the water requirement for one observation
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    // Without a model, say so before looking at the body
    if let Err(e) = state.predictor.artifact() {
        return e.into_response();
    }

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return AppError::Validation {
                fields: Vec::new(),
                message: rejection.body_text(),
            }
            .into_response()
        }
    };

    match state.predictor.predict_request(body) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}
