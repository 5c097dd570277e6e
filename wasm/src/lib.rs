//! WebAssembly module for the Irrigation Water Requirement Predictor
//!
//! Provides client-side computation for:
//! - Crop base-water lookups
//! - Rule-based water requirement estimates (no model needed)
//! - Prediction request building and pre-validation

use serde::Serialize;
use serde_json::json;
use wasm_bindgen::prelude::*;

use shared::{
    noiseless_target, round_to_cents, validate_prediction_request, Observation, CROP_TYPE,
    CROP_WATER_BASE, HUMIDITY_PERCENT, RAINFALL_MM, SOIL_MOISTURE_PERCENT, TEMPERATURE_CELSIUS,
};

/// Base water for a crop; unknown crops get the default
#[wasm_bindgen]
pub fn crop_water_base(crop_type: &str) -> f64 {
    shared::crop_water_base(crop_type)
}

/// Whether the crop has its own table entry
#[wasm_bindgen]
pub fn is_known_crop(crop_type: &str) -> bool {
    shared::is_known_crop(crop_type)
}

/// The crop base-water table as a JSON object
#[wasm_bindgen]
pub fn crop_table_json() -> String {
    serde_json::to_string(&shared::crop_table()).unwrap_or_else(|_| "{}".to_string())
}

/// Noiseless formula estimate, rounded to 2 decimals
#[wasm_bindgen]
pub fn rule_based_requirement(
    crop_type: &str,
    soil_moisture_percent: f64,
    temperature_celsius: f64,
    humidity_percent: f64,
    rainfall_mm: f64,
) -> f64 {
    let obs = Observation::new(
        crop_type,
        soil_moisture_percent,
        temperature_celsius,
        humidity_percent,
        rainfall_mm,
    );
    round_to_cents(noiseless_target(&obs))
}

/// Request body for `/predict` with the matching base water filled in
#[wasm_bindgen]
pub fn build_prediction_request(
    crop_type: &str,
    soil_moisture_percent: f64,
    temperature_celsius: f64,
    humidity_percent: f64,
    rainfall_mm: f64,
) -> String {
    let crop_type = shared::normalize_crop_type(crop_type);
    json!({
        CROP_TYPE: crop_type,
        SOIL_MOISTURE_PERCENT: soil_moisture_percent,
        TEMPERATURE_CELSIUS: temperature_celsius,
        HUMIDITY_PERCENT: humidity_percent,
        RAINFALL_MM: rainfall_mm,
        CROP_WATER_BASE: shared::crop_water_base(&crop_type),
    })
    .to_string()
}

#[derive(Serialize)]
struct RequestCheck {
    valid: bool,
    fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Validate a request body before sending it.
///
/// Returns JSON `{ valid, fields, message? }` naming the offending fields.
#[wasm_bindgen]
pub fn check_prediction_request(body_json: &str) -> String {
    let check = match serde_json::from_str::<serde_json::Value>(body_json) {
        Err(e) => RequestCheck {
            valid: false,
            fields: Vec::new(),
            message: Some(format!("Invalid JSON: {}", e)),
        },
        Ok(body) => match validate_prediction_request(&body) {
            Ok(_) => RequestCheck {
                valid: true,
                fields: Vec::new(),
                message: None,
            },
            Err(e) => RequestCheck {
                valid: false,
                fields: e.fields(),
                message: Some(e.to_string()),
            },
        },
    };
    serde_json::to_string(&check).unwrap_or_else(|_| r#"{"valid":false,"fields":[]}"#.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_based_reference_row() {
        assert_eq!(rule_based_requirement("Rice", 50.0, 25.0, 70.0, 2.0), 6475.0);
    }

    #[test]
    fn test_crop_lookup() {
        assert_eq!(crop_water_base("papaya"), 4850.0);
        assert_eq!(crop_water_base("cotton"), 4000.0);
        assert!(is_known_crop(" MANGO "));
        assert!(crop_table_json().contains("\"watermelon\":4700.0"));
    }

    #[test]
    fn test_built_request_validates() {
        let body = build_prediction_request(" Banana", 45.0, 27.0, 75.0, 3.0);
        assert!(body.contains("\"crop_water_base\":5100.0"));
        assert_eq!(check_prediction_request(&body), r#"{"valid":true,"fields":[]}"#);
    }

    #[test]
    fn test_check_names_missing_fields() {
        let check = check_prediction_request(r#"{"crop_type": "rice", "soil_moisture_percent": 50}"#);
        assert!(check.contains("\"valid\":false"));
        assert!(check.contains("rainfall_mm"));
        assert!(check_prediction_request("not json").contains("Invalid JSON"));
    }
}
