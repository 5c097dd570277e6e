//! Feature contract shared by training and serving
//!
//! Column names and their order are part of the persisted artifact. Serving
//! builds rows through the same functions used during training, so a column
//! cannot drift between the two.

use serde::{Deserialize, Serialize};

use crate::models::Observation;

/// Guard added to denominators of ratio features
pub const RATIO_EPSILON: f64 = 1e-6;

/// Categorical column name
pub const CROP_TYPE: &str = "crop_type";
pub const SOIL_MOISTURE_PERCENT: &str = "soil_moisture_percent";
pub const TEMPERATURE_CELSIUS: &str = "temperature_celsius";
pub const HUMIDITY_PERCENT: &str = "humidity_percent";
pub const RAINFALL_MM: &str = "rainfall_mm";
pub const CROP_WATER_BASE: &str = "crop_water_base";

/// Target column name
pub const TARGET_COLUMN: &str = "water_requirement_liters_per_hectare";

/// Ordered request/training columns
pub const FEATURE_COLUMNS: [&str; 6] = [
    CROP_TYPE,
    SOIL_MOISTURE_PERCENT,
    TEMPERATURE_CELSIUS,
    HUMIDITY_PERCENT,
    RAINFALL_MM,
    CROP_WATER_BASE,
];

/// Numeric part of [`FEATURE_COLUMNS`], in order
pub const NUMERIC_COLUMNS: [&str; 5] = [
    SOIL_MOISTURE_PERCENT,
    TEMPERATURE_CELSIUS,
    HUMIDITY_PERCENT,
    RAINFALL_MM,
    CROP_WATER_BASE,
];

/// Derived columns appended by [`FeatureSet::Extended`], in order
pub const DERIVED_COLUMNS: [&str; 10] = [
    "temp_humidity_ratio",
    "humidity_rainfall_ratio",
    "temp_moisture_interaction",
    "moisture_humidity_product",
    "moisture_rainfall_product",
    "water_saturation_deficit",
    "soil_water_deficit",
    "net_water_input",
    "temp_squared",
    "moisture_squared",
];

/// Request fields each derived column is computed from, in [`DERIVED_COLUMNS`] order
const DERIVED_INPUTS: [&[&str]; 10] = [
    &[TEMPERATURE_CELSIUS, HUMIDITY_PERCENT],
    &[HUMIDITY_PERCENT, RAINFALL_MM],
    &[TEMPERATURE_CELSIUS, SOIL_MOISTURE_PERCENT],
    &[SOIL_MOISTURE_PERCENT, HUMIDITY_PERCENT],
    &[SOIL_MOISTURE_PERCENT, RAINFALL_MM],
    &[HUMIDITY_PERCENT, TEMPERATURE_CELSIUS],
    &[SOIL_MOISTURE_PERCENT],
    &[RAINFALL_MM, TEMPERATURE_CELSIUS],
    &[TEMPERATURE_CELSIUS],
    &[SOIL_MOISTURE_PERCENT],
];

/// Contract fields a numeric column depends on.
///
/// A contract column depends on itself; a derived column on its inputs.
/// Unknown names depend on nothing.
pub fn input_fields(column: &str) -> Vec<&'static str> {
    if let Some(field) = NUMERIC_COLUMNS.iter().find(|c| **c == column) {
        return vec![*field];
    }
    DERIVED_COLUMNS
        .iter()
        .position(|c| *c == column)
        .map(|i| DERIVED_INPUTS[i].to_vec())
        .unwrap_or_default()
}

/// Deduplicated contract fields behind `columns`, in contract order
pub fn contract_fields<'a>(columns: impl IntoIterator<Item = &'a str>) -> Vec<&'static str> {
    let involved: Vec<&'static str> = columns.into_iter().flat_map(input_fields).collect();
    NUMERIC_COLUMNS
        .iter()
        .copied()
        .filter(|field| involved.contains(field))
        .collect()
}

/// Which column list a model is trained on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// The six contract columns
    #[default]
    Standard,
    /// The six contract columns followed by the ten derived columns
    Extended,
}

impl FeatureSet {
    /// Complete ordered column list, categorical column first
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        if *self == FeatureSet::Extended {
            columns.extend(DERIVED_COLUMNS.iter().map(|c| c.to_string()));
        }
        columns
    }

    /// Ordered numeric columns
    pub fn numeric_columns(&self) -> Vec<&'static str> {
        let mut columns = NUMERIC_COLUMNS.to_vec();
        if *self == FeatureSet::Extended {
            columns.extend_from_slice(&DERIVED_COLUMNS);
        }
        columns
    }

    /// Numeric values of an observation in [`FeatureSet::numeric_columns`] order
    pub fn numeric_values(&self, obs: &Observation) -> Vec<f64> {
        let mut values = vec![
            obs.soil_moisture_percent,
            obs.temperature_celsius,
            obs.humidity_percent,
            obs.rainfall_mm,
            obs.crop_water_base,
        ];
        if *self == FeatureSet::Extended {
            values.extend_from_slice(&derived_features(obs));
        }
        values
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureSet::Standard => write!(f, "standard"),
            FeatureSet::Extended => write!(f, "extended"),
        }
    }
}

/// Ratio, interaction, stress and polynomial terms in [`DERIVED_COLUMNS`] order
pub fn derived_features(obs: &Observation) -> [f64; 10] {
    let t = obs.temperature_celsius;
    let h = obs.humidity_percent;
    let r = obs.rainfall_mm;
    let m = obs.soil_moisture_percent;

    [
        t / (h + RATIO_EPSILON),
        h / (r + RATIO_EPSILON),
        t * m,
        m * h,
        m * r,
        (100.0 - h) * (t / 25.0),
        100.0 - m,
        r - t / 5.0,
        t * t,
        m * m,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_columns_order() {
        let columns = FeatureSet::Standard.columns();
        assert_eq!(
            columns,
            vec![
                "crop_type",
                "soil_moisture_percent",
                "temperature_celsius",
                "humidity_percent",
                "rainfall_mm",
                "crop_water_base",
            ]
        );
    }

    #[test]
    fn test_extended_columns_append_derived() {
        let columns = FeatureSet::Extended.columns();
        assert_eq!(columns.len(), 16);
        assert_eq!(columns[6], "temp_humidity_ratio");
        assert_eq!(columns[15], "moisture_squared");
        assert_eq!(FeatureSet::Extended.numeric_columns().len(), 15);
    }

    #[test]
    fn test_numeric_values_match_columns() {
        let obs = Observation::new("rice", 50.0, 25.0, 70.0, 2.0);
        assert_eq!(
            FeatureSet::Standard.numeric_values(&obs),
            vec![50.0, 25.0, 70.0, 2.0, 6500.0]
        );
        assert_eq!(
            FeatureSet::Extended.numeric_values(&obs).len(),
            FeatureSet::Extended.numeric_columns().len()
        );
    }

    #[test]
    fn test_derived_features_values() {
        let obs = Observation::new("rice", 50.0, 25.0, 70.0, 2.0);
        let derived = derived_features(&obs);
        assert!((derived[0] - 25.0 / 70.0).abs() < 1e-6);
        assert_eq!(derived[2], 1250.0);
        assert_eq!(derived[5], 30.0);
        assert_eq!(derived[6], 50.0);
        assert_eq!(derived[7], -3.0);
        assert_eq!(derived[8], 625.0);
    }

    #[test]
    fn test_derived_inputs_trace_to_contract_fields() {
        assert_eq!(input_fields("rainfall_mm"), vec!["rainfall_mm"]);
        assert_eq!(
            input_fields("temp_moisture_interaction"),
            vec!["temperature_celsius", "soil_moisture_percent"]
        );
        assert!(input_fields("crop_type").is_empty());
        assert_eq!(
            contract_fields(["temp_squared", "moisture_squared", "temp_moisture_interaction"]),
            vec!["soil_moisture_percent", "temperature_celsius"]
        );
    }

    #[test]
    fn test_zero_rainfall_ratio_is_finite() {
        let obs = Observation::new("maize", 40.0, 30.0, 0.0, 0.0);
        assert!(derived_features(&obs).iter().all(|v| v.is_finite()));
    }
}
