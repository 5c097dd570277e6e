//! Regression building blocks: preprocessing, regressors, metrics and model
//! selection. Estimators, fold generation and scoring come from smartcore;
//! this module owns the feature contract around them.

pub mod metrics;
pub mod preprocessing;
pub mod regressor;
pub mod selection;

use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{AppError, AppResult};

pub use metrics::{mae, mape, mse, r_squared, rmse, RegressionMetrics};
pub use preprocessing::{OneHotEncoder, Preprocessor, StandardScaler};
pub use regressor::{
    ForestParams, LinearParams, LinearSolver, Pipeline, Regressor, RegressorParams, TreeParams,
};
pub use selection::{
    compare_families, comparison_families, grid_search, train_test_split, CandidateScore,
    FamilyReport, GridSearchResult, GridSpec, KFold,
};

/// Row-major matrix from equally wide rows
pub(crate) fn dense_matrix(rows: &[Vec<f64>]) -> AppResult<DenseMatrix<f64>> {
    let n_features = rows.first().map(Vec::len).unwrap_or(0);
    if n_features == 0 {
        return Err(AppError::Training("Cannot build a matrix without columns".into()));
    }

    let mut values = Vec::with_capacity(rows.len() * n_features);
    for row in rows {
        if row.len() != n_features {
            return Err(AppError::Training(format!(
                "All feature rows must have {} columns, found {}",
                n_features,
                row.len()
            )));
        }
        values.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(rows.len(), n_features, values, false))
}
