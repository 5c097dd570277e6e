//! Validation of prediction requests against the feature contract
//!
//! Requests arrive as loose JSON. Every contract field is required; numeric
//! fields accept JSON numbers or numeric strings. Nothing is defaulted except the
//! crop table's own fallback for unknown crops.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::features::{
    CROP_TYPE, CROP_WATER_BASE, FEATURE_COLUMNS, HUMIDITY_PERCENT, RAINFALL_MM,
    SOIL_MOISTURE_PERCENT, TEMPERATURE_CELSIUS,
};
use crate::models::{crop_water_base, Observation};

/// Tolerance when comparing a supplied base water against the table
const BASE_WATER_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing fields: {0:?}")]
    MissingFields(Vec<String>),

    #[error("Invalid fields (expected finite numbers or a crop name): {0:?}")]
    InvalidFields(Vec<String>),

    #[error("crop_water_base {supplied} does not match {expected} for crop '{crop_type}'")]
    BaseWaterMismatch {
        crop_type: String,
        supplied: f64,
        expected: f64,
    },
}

impl ValidationError {
    /// Names of the offending fields
    pub fn fields(&self) -> Vec<String> {
        match self {
            ValidationError::NotAnObject => Vec::new(),
            ValidationError::MissingFields(fields) | ValidationError::InvalidFields(fields) => {
                fields.clone()
            }
            ValidationError::BaseWaterMismatch { .. } => vec![CROP_WATER_BASE.to_string()],
        }
    }
}

/// Coerce a JSON value to a finite number
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Report every contract field absent from the object, in contract order
pub fn missing_fields(body: &Map<String, Value>) -> Vec<String> {
    FEATURE_COLUMNS
        .iter()
        .filter(|field| !body.contains_key(**field))
        .map(|field| field.to_string())
        .collect()
}

/// Validate a request body and build the observation it describes
pub fn validate_prediction_request(body: &Value) -> Result<Observation, ValidationError> {
    let object = body.as_object().ok_or(ValidationError::NotAnObject)?;

    let missing = missing_fields(object);
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let mut invalid = Vec::new();

    let crop_type = match &object[CROP_TYPE] {
        Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
        _ => {
            invalid.push(CROP_TYPE.to_string());
            None
        }
    };

    let mut number = |field: &str| -> f64 {
        coerce_number(&object[field]).unwrap_or_else(|| {
            invalid.push(field.to_string());
            f64::NAN
        })
    };
    let soil_moisture = number(SOIL_MOISTURE_PERCENT);
    let temperature = number(TEMPERATURE_CELSIUS);
    let humidity = number(HUMIDITY_PERCENT);
    let rainfall = number(RAINFALL_MM);
    let supplied_base = number(CROP_WATER_BASE);

    let Some(crop_type) = crop_type.filter(|_| invalid.is_empty()) else {
        return Err(ValidationError::InvalidFields(invalid));
    };

    let observation = Observation::new(crop_type, soil_moisture, temperature, humidity, rainfall);
    let expected = crop_water_base(&observation.crop_type);
    if (supplied_base - expected).abs() > BASE_WATER_TOLERANCE {
        return Err(ValidationError::BaseWaterMismatch {
            crop_type: observation.crop_type,
            supplied: supplied_base,
            expected,
        });
    }

    Ok(observation)
}
