//! Regressor families and the fitted preprocessing + regressor pipeline
//!
//! Estimators are smartcore's, fitted on the dense matrix the preprocessor
//! produces. Hyperparameters are kept in our own serde types so artifacts and
//! reports describe a model without depending on smartcore's parameter layout.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared::{FeatureSet, Observation, NUMERIC_COLUMNS};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

use super::dense_matrix;
use super::preprocessing::Preprocessor;
use crate::error::{AppError, AppResult};

type Matrix = DenseMatrix<f64>;
type ForestModel = RandomForestRegressor<f64, f64, Matrix, Vec<f64>>;
type TreeModel = DecisionTreeRegressor<f64, f64, Matrix, Vec<f64>>;
type LinearModel = LinearRegression<f64, f64, Matrix, Vec<f64>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: shared::DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Least-squares solver.
///
/// One-hot crop indicators sum to the intercept column and `crop_water_base`
/// is a combination of them, so the design matrix is rank deficient. SVD
/// handles that; QR rejects it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolver {
    #[default]
    Svd,
    Qr,
}

impl From<LinearSolver> for LinearRegressionSolverName {
    fn from(solver: LinearSolver) -> Self {
        match solver {
            LinearSolver::Svd => LinearRegressionSolverName::SVD,
            LinearSolver::Qr => LinearRegressionSolverName::QR,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LinearParams {
    pub solver: LinearSolver,
}

/// Hyperparameters of one candidate model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RegressorParams {
    RandomForest(ForestParams),
    DecisionTree(TreeParams),
    Linear(LinearParams),
}

impl RegressorParams {
    pub fn family(&self) -> &'static str {
        match self {
            RegressorParams::RandomForest(_) => "Random Forest",
            RegressorParams::DecisionTree(_) => "Decision Tree",
            RegressorParams::Linear(_) => "Linear Regression",
        }
    }
}

fn depth_limit(depth: usize) -> u16 {
    u16::try_from(depth).unwrap_or(u16::MAX)
}

/// A fitted regressor
#[derive(Serialize, Deserialize)]
pub enum Regressor {
    RandomForest(ForestModel),
    DecisionTree(TreeModel),
    Linear(LinearModel),
}

impl fmt::Debug for Regressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self {
            Regressor::RandomForest(_) => "RandomForest",
            Regressor::DecisionTree(_) => "DecisionTree",
            Regressor::Linear(_) => "Linear",
        };
        f.debug_tuple("Regressor").field(&family).finish()
    }
}

impl Regressor {
    pub fn fit(params: &RegressorParams, x: &[Vec<f64>], y: &[f64]) -> AppResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AppError::Training(format!(
                "Cannot fit on {} rows with {} targets",
                x.len(),
                y.len()
            )));
        }
        let matrix = dense_matrix(x)?;
        let targets = y.to_vec();
        let n_features = x[0].len();

        let fitted = match params {
            RegressorParams::RandomForest(p) => {
                if p.n_estimators == 0 {
                    return Err(AppError::Training("n_estimators must be at least 1".into()));
                }
                let parameters = RandomForestRegressorParameters {
                    max_depth: p.max_depth.map(depth_limit),
                    min_samples_leaf: p.min_samples_leaf,
                    min_samples_split: p.min_samples_split,
                    n_trees: p.n_estimators,
                    // Every split considers every column
                    m: Some(n_features),
                    keep_samples: false,
                    seed: p.seed,
                };
                ForestModel::fit(&matrix, &targets, parameters).map(Regressor::RandomForest)
            }
            RegressorParams::DecisionTree(p) => {
                let mut parameters = DecisionTreeRegressorParameters::default()
                    .with_min_samples_leaf(p.min_samples_leaf)
                    .with_min_samples_split(p.min_samples_split);
                if let Some(depth) = p.max_depth {
                    parameters = parameters.with_max_depth(depth_limit(depth));
                }
                TreeModel::fit(&matrix, &targets, parameters).map(Regressor::DecisionTree)
            }
            RegressorParams::Linear(p) => {
                let parameters = LinearRegressionParameters::default().with_solver(p.solver.into());
                LinearModel::fit(&matrix, &targets, parameters).map(Regressor::Linear)
            }
        };

        fitted.map_err(|e| AppError::Training(format!("{} fit failed: {e}", params.family())))
    }

    /// Raw predictions for already transformed rows
    pub fn predict(&self, rows: &[Vec<f64>]) -> AppResult<Vec<f64>> {
        let matrix = dense_matrix(rows)?;
        let predicted = match self {
            Regressor::RandomForest(m) => m.predict(&matrix),
            Regressor::DecisionTree(m) => m.predict(&matrix),
            Regressor::Linear(m) => m.predict(&matrix),
        };
        predicted.map_err(|e| AppError::Internal(format!("Regressor prediction failed: {e}")))
    }
}

/// Preprocessor and regressor fitted together on the same rows
#[derive(Debug, Serialize, Deserialize)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    params: RegressorParams,
    regressor: Regressor,
}

impl Pipeline {
    pub fn fit(
        params: &RegressorParams,
        feature_set: FeatureSet,
        observations: &[Observation],
        targets: &[f64],
    ) -> AppResult<Self> {
        let (preprocessor, rows) = Preprocessor::fit_transform(observations, feature_set)?;
        let regressor = Regressor::fit(params, &rows, targets)?;
        Ok(Self {
            preprocessor,
            params: *params,
            regressor,
        })
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn params(&self) -> RegressorParams {
        self.params
    }

    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }

    /// Raw regressor output, one value per observation.
    ///
    /// Non-finite features or outputs are rejected, never passed on.
    pub fn predict(&self, observations: &[Observation]) -> AppResult<Vec<f64>> {
        let rows = self.preprocessor.transform_many(observations)?;
        let predicted = self.regressor.predict(&rows)?;
        if predicted.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Validation {
                fields: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
                message: "Inputs produce a non-finite prediction".into(),
            });
        }
        Ok(predicted)
    }

    pub fn predict_one(&self, obs: &Observation) -> AppResult<f64> {
        self.predict(std::slice::from_ref(obs))?
            .first()
            .copied()
            .ok_or_else(|| AppError::Internal("Regressor returned no prediction".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1] + 1.0).collect();
        (x, y)
    }

    #[test]
    fn test_linear_fits_plane() {
        let (x, y) = rows();
        let model = Regressor::fit(&RegressorParams::Linear(LinearParams::default()), &x, &y).unwrap();
        let predicted = model.predict(&[vec![5.0, 1.0]]).unwrap();
        assert!((predicted[0] - 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_tree_depth_limit() {
        let (x, y) = rows();
        let stump = RegressorParams::DecisionTree(TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        });
        let model = Regressor::fit(&stump, &x, &y).unwrap();
        let predicted = model.predict(&x).unwrap();
        let mut distinct = predicted.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        assert!(distinct.len() <= 2);
    }

    #[test]
    fn test_forest_stays_within_target_range() {
        let (x, y) = rows();
        let params = RegressorParams::RandomForest(ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        });
        let model = Regressor::fit(&params, &x, &y).unwrap();
        for value in model.predict(&x).unwrap() {
            assert!((1.0..=48.0).contains(&value));
        }
    }

    #[test]
    fn test_invalid_training_input() {
        let (x, y) = rows();
        let linear = RegressorParams::Linear(LinearParams::default());
        assert!(Regressor::fit(&linear, &x, &y[..5]).is_err());
        assert!(Regressor::fit(&linear, &[], &[]).is_err());
        let no_trees = RegressorParams::RandomForest(ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        });
        assert!(Regressor::fit(&no_trees, &x, &y).is_err());
    }
}
