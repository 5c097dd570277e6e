//! Preprocessing pipeline
//!
//! Numeric contract columns are standardized with statistics frozen at fit
//! time; `crop_type` is expanded to one indicator per crop seen in training.
//! Output layout: scaled numeric columns in contract order, then indicators in
//! sorted crop order. An unseen crop produces an all-zero indicator block.

use serde::{Deserialize, Serialize};
use shared::{contract_fields, FeatureSet, Observation, CROP_TYPE};
use smartcore::linalg::basic::arrays::ArrayView2;

use super::dense_matrix;
use crate::error::{AppError, AppResult};

/// Deviations smaller than this are replaced by a unit scale
const MIN_SCALE: f64 = 1e-12;

/// Per-column standardization with frozen mean and population deviation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> AppResult<Self> {
        if rows.is_empty() {
            return Err(AppError::Training("Cannot fit scaler on zero rows".into()));
        }
        let matrix = dense_matrix(rows)?;
        let mean = matrix.mean_by(0);
        let scale = matrix
            .std_dev(0)
            .into_iter()
            .map(|std| if std.is_finite() && std >= MIN_SCALE { std } else { 1.0 })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Indicator expansion over a vocabulary learned at fit time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut categories: Vec<String> = values.into_iter().map(str::to_string).collect();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Unknown values encode to all zeros
    pub fn encode(&self, value: &str) -> Vec<f64> {
        let mut out = vec![0.0; self.categories.len()];
        if let Ok(idx) = self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
            out[idx] = 1.0;
        }
        out
    }
}

/// Fitted column transformer for one feature set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preprocessor {
    feature_set: FeatureSet,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl Preprocessor {
    pub fn fit(observations: &[Observation], feature_set: FeatureSet) -> AppResult<Self> {
        Self::fit_transform(observations, feature_set).map(|(pre, _)| pre)
    }

    /// Fit and return the transformed training rows
    pub fn fit_transform(
        observations: &[Observation],
        feature_set: FeatureSet,
    ) -> AppResult<(Self, Vec<Vec<f64>>)> {
        let numeric: Vec<Vec<f64>> = observations
            .iter()
            .map(|obs| feature_set.numeric_values(obs))
            .collect();
        for values in &numeric {
            check_finite(feature_set, values, values)
                .map_err(|e| AppError::Training(format!("Training rows are not finite: {e}")))?;
        }
        let scaler = StandardScaler::fit(&numeric)?;
        let encoder = OneHotEncoder::fit(observations.iter().map(|obs| obs.crop_type.as_str()));

        let preprocessor = Self {
            feature_set,
            scaler,
            encoder,
        };
        let rows = observations
            .iter()
            .zip(&numeric)
            .map(|(obs, values)| preprocessor.assemble(values, &obs.crop_type))
            .collect::<AppResult<_>>()?;
        Ok((preprocessor, rows))
    }

    fn assemble(&self, numeric: &[f64], crop_type: &str) -> AppResult<Vec<f64>> {
        let mut row = self.scaler.transform_row(numeric);
        check_finite(self.feature_set, numeric, &row)?;
        row.extend(self.encoder.encode(crop_type));
        Ok(row)
    }

    /// Transform one observation with the frozen parameters.
    ///
    /// Fails when a raw or scaled numeric value is not finite, naming the
    /// request fields it was computed from.
    pub fn transform(&self, obs: &Observation) -> AppResult<Vec<f64>> {
        self.assemble(&self.feature_set.numeric_values(obs), &obs.crop_type)
    }

    pub fn transform_many(&self, observations: &[Observation]) -> AppResult<Vec<Vec<f64>>> {
        observations.iter().map(|obs| self.transform(obs)).collect()
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn categories(&self) -> &[String] {
        self.encoder.categories()
    }

    /// Width of a transformed row
    pub fn n_outputs(&self) -> usize {
        self.scaler.mean().len() + self.encoder.categories().len()
    }

    /// Names of the transformed columns, in output order
    pub fn output_names(&self) -> Vec<String> {
        self.feature_set
            .numeric_columns()
            .iter()
            .map(|c| format!("num__{c}"))
            .chain(
                self.encoder
                    .categories()
                    .iter()
                    .map(|c| format!("cat__{CROP_TYPE}_{c}")),
            )
            .collect()
    }
}

/// Overflowing derived terms surface as a validation error, not a NaN row
fn check_finite(feature_set: FeatureSet, raw: &[f64], scaled: &[f64]) -> AppResult<()> {
    let columns = feature_set.numeric_columns();
    let offending: Vec<&str> = columns
        .iter()
        .zip(raw.iter().zip(scaled))
        .filter(|(_, (r, s))| !r.is_finite() || !s.is_finite())
        .map(|(column, _)| *column)
        .collect();
    if offending.is_empty() {
        return Ok(());
    }

    Err(AppError::Validation {
        fields: contract_fields(offending.iter().copied())
            .into_iter()
            .map(str::to_string)
            .collect(),
        message: format!("Inputs overflow feature columns: {}", offending.join(", ")),
    })
}
