//! Offline training service
//!
//! Three jobs share one engineered dataset and one seeded split:
//! grid search (fit, evaluate and persist the best random forest), model family
//! comparison (report only), and verification of a persisted artifact against
//! the noiseless formula.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{noiseless_target, FeatureSet, Observation};

use super::artifact::{self, ModelArtifact};
use super::dataset::{load_dataset, write_engineered_csv, DatasetOptions, EngineeredDataset};
use crate::config::TrainingConfig;
use crate::error::AppResult;
use crate::ml::{
    compare_families, comparison_families, grid_search, train_test_split, FamilyReport,
    GridSearchResult, KFold, Pipeline, RegressionMetrics,
};

/// Reference row used to sanity check a model: rice, 50% moisture, 25°C, 70% humidity, 2 mm
pub fn reference_observation() -> Observation {
    Observation::new("rice", 50.0, 25.0, 70.0, 2.0)
}

/// Train/test partition of an engineered dataset
struct Partition {
    train_x: Vec<Observation>,
    train_y: Vec<f64>,
    test_x: Vec<Observation>,
    test_y: Vec<f64>,
}

/// Best model found by grid search, before or after persisting
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub search: GridSearchResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub generated_at: DateTime<Utc>,
    pub feature_set: FeatureSet,
    pub n_train: usize,
    pub n_test: usize,
    pub results: Vec<FamilyReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub model_family: String,
    pub n_samples: usize,
    /// Predictions scored against the noiseless formula
    pub metrics: RegressionMetrics,
    pub reference_expected: f64,
    pub reference_predicted: f64,
}

/// Training service
#[derive(Debug, Clone)]
pub struct TrainingService {
    config: TrainingConfig,
    artifact_path: PathBuf,
}

impl TrainingService {
    pub fn new(config: TrainingConfig, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            artifact_path: artifact_path.into(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Engineer the configured dataset, writing it out when configured to
    pub fn engineer(&self) -> AppResult<EngineeredDataset> {
        let dataset = load_dataset(&self.config.dataset_path, &DatasetOptions::from_config(&self.config))?;
        if let Some(output) = &self.config.engineered_output_path {
            write_engineered_csv(output, &dataset.rows)?;
        }
        Ok(dataset)
    }

    fn split(&self, dataset: &EngineeredDataset) -> AppResult<Partition> {
        let (train, test) =
            train_test_split(dataset.len(), self.config.test_fraction, self.config.random_seed)?;
        let pick = |indices: &[usize]| -> (Vec<Observation>, Vec<f64>) {
            indices
                .iter()
                .map(|&i| {
                    let row = &dataset.rows[i];
                    (row.observation.clone(), row.water_requirement_liters_per_hectare)
                })
                .unzip()
        };
        let (train_x, train_y) = pick(&train);
        let (test_x, test_y) = pick(&test);
        tracing::info!("Split {} rows into {} train / {} test", dataset.len(), train_x.len(), test_x.len());
        Ok(Partition {
            train_x,
            train_y,
            test_x,
            test_y,
        })
    }

    /// Grid search on the training partition, refit the winner and evaluate it
    pub fn train_on(&self, dataset: &EngineeredDataset) -> AppResult<TrainingOutcome> {
        let part = self.split(dataset)?;
        let feature_set = self.config.feature_set;
        let candidates = self.config.grid.candidates(self.config.random_seed);

        tracing::info!(
            "Starting grid search over {} candidates with {}-fold CV",
            candidates.len(),
            self.config.cv_folds
        );
        let search = grid_search(
            &candidates,
            feature_set,
            &part.train_x,
            &part.train_y,
            KFold::new(self.config.cv_folds),
        )?;
        let best = search.best();
        tracing::info!("Best hyperparameters: {:?} (CV MAE {:.2})", best.params, best.mean_mae);

        let pipeline = Pipeline::fit(&best.params, feature_set, &part.train_x, &part.train_y)?;
        let metrics = RegressionMetrics::evaluate(&part.test_y, &pipeline.predict(&part.test_x)?);
        tracing::info!(
            "Held-out MAE {:.2} liters, R² {:.4}, RMSE {:.2}, accuracy {:.2}%",
            metrics.mae,
            metrics.r2,
            metrics.rmse,
            metrics.accuracy
        );

        Ok(TrainingOutcome {
            artifact: ModelArtifact::new(pipeline, Some(metrics), part.train_x.len(), part.test_x.len()),
            search,
        })
    }

    /// Full grid search job; persists the best model
    pub fn run_grid_search(&self) -> AppResult<TrainingOutcome> {
        let dataset = self.engineer()?;
        let outcome = self.train_on(&dataset)?;
        artifact::save(&outcome.artifact, &self.artifact_path)?;
        Ok(outcome)
    }

    /// Fit each model family on the same split and report held-out metrics
    pub fn compare_on(&self, dataset: &EngineeredDataset) -> AppResult<ComparisonReport> {
        let part = self.split(dataset)?;
        let results = compare_families(
            &comparison_families(self.config.random_seed),
            self.config.feature_set,
            (part.train_x.as_slice(), part.train_y.as_slice()),
            (part.test_x.as_slice(), part.test_y.as_slice()),
        )?;

        for report in &results {
            tracing::info!(
                "{}: R² {:.4}, MAE {:.2}, RMSE {:.2}, accuracy {:.2}%",
                report.model,
                report.metrics.r2,
                report.metrics.mae,
                report.metrics.rmse,
                report.metrics.accuracy
            );
        }

        Ok(ComparisonReport {
            generated_at: Utc::now(),
            feature_set: self.config.feature_set,
            n_train: part.train_x.len(),
            n_test: part.test_x.len(),
            results,
        })
    }

    /// Full comparison job; writes the JSON report, persists no model
    pub fn compare_models(&self) -> AppResult<ComparisonReport> {
        let dataset = self.engineer()?;
        let report = self.compare_on(&dataset)?;

        let path = Path::new(&self.config.report_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!("Comparison report written to {}", path.display());

        Ok(report)
    }

    /// Score a persisted artifact against the noiseless formula on the
    /// re-engineered dataset
    pub fn verify(&self) -> AppResult<VerificationReport> {
        let artifact = artifact::load(&self.artifact_path)?;
        let dataset = self.engineer()?;
        let report = verify_on(&artifact, &dataset)?;
        tracing::info!(
            "Verification over {} rows: R² {:.4}, MAE {:.2}; reference row predicted {:.1} (formula {:.1})",
            report.n_samples,
            report.metrics.r2,
            report.metrics.mae,
            report.reference_predicted,
            report.reference_expected
        );
        Ok(report)
    }
}

/// Compare artifact predictions with noiseless targets
pub fn verify_on(
    artifact: &ModelArtifact,
    dataset: &EngineeredDataset,
) -> AppResult<VerificationReport> {
    let observations = dataset.observations();
    let expected: Vec<f64> = observations.iter().map(noiseless_target).collect();
    let predicted = artifact.predict_many(&observations)?;
    let reference = reference_observation();

    Ok(VerificationReport {
        model_family: artifact.metadata.model_family.clone(),
        n_samples: observations.len(),
        metrics: RegressionMetrics::evaluate(&expected, &predicted),
        reference_expected: noiseless_target(&reference),
        reference_predicted: artifact.predict(&reference)?,
    })
}
