//! Crop table handlers

use std::collections::BTreeMap;

use axum::Json;

/// Base water per known crop, liters per hectare
pub async fn crop_info() -> Json<BTreeMap<String, f64>> {
    Json(shared::crop_table())
}
