//! Model selection: train/test split, k-fold cross-validation, grid search and
//! model family comparison.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shared::{FeatureSet, Observation};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::model_selection::{self, BaseKFold};

use super::metrics::{mae, RegressionMetrics};
use super::regressor::{ForestParams, LinearParams, Pipeline, RegressorParams, TreeParams};
use crate::error::{AppError, AppResult};

/// Seeded shuffle split; returns `(train, test)` row indices.
///
/// The test partition holds `ceil(n * test_fraction)` rows.
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> AppResult<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(AppError::Configuration(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(AppError::Dataset(format!(
            "{n_samples} samples cannot be split with test_fraction {test_fraction}"
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Contiguous k-fold partitioning without shuffling
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// `(train, validation)` positions for each fold.
    ///
    /// The first `n % k` validation blocks hold one extra sample.
    pub fn split(&self, n_samples: usize) -> AppResult<Vec<(Vec<usize>, Vec<usize>)>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(AppError::Configuration(format!("cv_folds must be at least 2, got {k}")));
        }
        if n_samples < k {
            return Err(AppError::Dataset(format!(
                "Cannot split {n_samples} training samples into {k} folds"
            )));
        }

        let folds = model_selection::KFold {
            n_splits: k,
            shuffle: false,
            seed: None,
        };
        // Only the row count of the matrix matters to the splitter
        let positions = DenseMatrix::new(n_samples, 1, vec![0.0; n_samples], false);
        Ok(folds.split(&positions).collect())
    }
}

/// Random forest hyperparameter grid; a `max_depth` of 0 means unlimited
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridSpec {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![10, 0],
            min_samples_split: vec![2, 5],
        }
    }
}

impl GridSpec {
    /// Every combination, `max_depth` outermost and `n_estimators` innermost
    pub fn candidates(&self, seed: u64) -> Vec<RegressorParams> {
        let mut out = Vec::new();
        for &depth in &self.max_depth {
            for &min_split in &self.min_samples_split {
                for &n_estimators in &self.n_estimators {
                    out.push(RegressorParams::RandomForest(ForestParams {
                        n_estimators,
                        max_depth: (depth > 0).then_some(depth),
                        min_samples_split: min_split,
                        min_samples_leaf: 1,
                        seed,
                    }));
                }
            }
        }
        out
    }
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: RegressorParams,
    pub fold_mae: Vec<f64>,
    pub mean_mae: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
}

impl GridSearchResult {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }
}

fn gather<T: Clone>(values: &[T], positions: &[usize]) -> Vec<T> {
    positions.iter().map(|&i| values[i].clone()).collect()
}

/// Score each candidate by mean validation MAE over the folds and pick the
/// lowest; ties keep the earlier candidate.
pub fn grid_search(
    candidates: &[RegressorParams],
    feature_set: FeatureSet,
    observations: &[Observation],
    targets: &[f64],
    kfold: KFold,
) -> AppResult<GridSearchResult> {
    if candidates.is_empty() {
        return Err(AppError::Configuration("Hyperparameter grid is empty".into()));
    }
    let folds = kfold.split(observations.len())?;

    // Candidates are independent; collect keeps grid order
    let scores = candidates
        .par_iter()
        .map(|params| {
            let fold_mae = folds
                .iter()
                .map(|(train, validation)| {
                    let pipeline = Pipeline::fit(
                        params,
                        feature_set,
                        &gather(observations, train),
                        &gather(targets, train),
                    )?;
                    let predictions = pipeline.predict(&gather(observations, validation))?;
                    Ok(mae(&gather(targets, validation), &predictions))
                })
                .collect::<AppResult<Vec<f64>>>()?;
            let mean_mae = fold_mae.iter().sum::<f64>() / fold_mae.len() as f64;
            tracing::debug!(?params, mean_mae, "Scored grid candidate");
            Ok(CandidateScore {
                params: *params,
                fold_mae,
                mean_mae,
            })
        })
        .collect::<AppResult<Vec<CandidateScore>>>()?;

    let best_index = scores
        .iter()
        .enumerate()
        .fold(0, |best, (i, s)| if s.mean_mae < scores[best].mean_mae { i } else { best });

    Ok(GridSearchResult {
        candidates: scores,
        best_index,
    })
}

/// Families compared side by side
pub fn comparison_families(seed: u64) -> Vec<RegressorParams> {
    vec![
        RegressorParams::Linear(LinearParams::default()),
        RegressorParams::DecisionTree(TreeParams::default()),
        RegressorParams::RandomForest(ForestParams {
            n_estimators: 100,
            seed,
            ..ForestParams::default()
        }),
    ]
}

/// Held-out metrics of one family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyReport {
    pub model: String,
    pub params: RegressorParams,
    pub metrics: RegressionMetrics,
}

/// Fit every family on the same training rows and report held-out metrics.
/// No family is chosen.
pub fn compare_families(
    families: &[RegressorParams],
    feature_set: FeatureSet,
    train: (&[Observation], &[f64]),
    test: (&[Observation], &[f64]),
) -> AppResult<Vec<FamilyReport>> {
    families
        .iter()
        .map(|params| {
            tracing::info!("Training {}...", params.family());
            let pipeline = Pipeline::fit(params, feature_set, train.0, train.1)?;
            let predictions = pipeline.predict(test.0)?;
            Ok(FamilyReport {
                model: params.family().to_string(),
                params: *params,
                metrics: RegressionMetrics::evaluate(test.1, &predictions),
            })
        })
        .collect()
}
