//! Observation models

use serde::{Deserialize, Serialize};

use super::crop::{crop_water_base, normalize_crop_type};

/// One crop/environment reading in feature-contract form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Normalized crop name (lower-case, trimmed)
    pub crop_type: String,
    pub soil_moisture_percent: f64,
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub rainfall_mm: f64,
    /// Baseline liters per hectare from the crop table
    pub crop_water_base: f64,
}

impl Observation {
    /// Build an observation, normalizing the crop name and deriving its base water
    pub fn new(
        crop_type: &str,
        soil_moisture_percent: f64,
        temperature_celsius: f64,
        humidity_percent: f64,
        rainfall_mm: f64,
    ) -> Self {
        let crop_type = normalize_crop_type(crop_type);
        let crop_water_base = crop_water_base(&crop_type);
        Self {
            crop_type,
            soil_moisture_percent,
            temperature_celsius,
            humidity_percent,
            rainfall_mm,
            crop_water_base,
        }
    }
}

/// An observation paired with its water requirement, one training row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabeledObservation {
    #[serde(flatten)]
    pub observation: Observation,
    pub water_requirement_liters_per_hectare: f64,
}

/// Successful prediction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    /// Predicted requirement, rounded to 2 decimals
    pub water_requirement_liters_per_hectare: f64,
    /// Echo of the request body
    pub input_data: serde_json::Value,
}

/// Round a requirement for display
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
