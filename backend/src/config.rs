//! Configuration management for the irrigation backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with IRR_ prefix (e.g. IRR__MODEL__ARTIFACT_PATH)

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{FeatureSet, DEFAULT_SEED};

use crate::ml::GridSpec;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Model artifact location
    pub model: ModelConfig,

    /// Offline training job settings
    pub training: TrainingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Path of the persisted preprocessing + regressor artifact
    pub artifact_path: String,
}

/// Where training targets come from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// Synthesize targets with the canonical formula
    Synthesize,
    /// Use the dataset's target column multiplied by `target_scale`
    Existing,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    /// Raw dataset CSV
    pub dataset_path: String,

    /// Optional CSV receiving the engineered dataset
    pub engineered_output_path: Option<String>,

    /// JSON file receiving the model family comparison
    pub report_path: String,

    pub target_source: TargetSource,

    /// Multiplier applied to existing targets
    pub target_scale: f64,

    /// Held-out share of the dataset
    pub test_fraction: f64,

    /// Seed for the split, synthetic inputs, noise and the forest
    pub random_seed: u64,

    /// Number of cross-validation folds inside the training partition
    pub cv_folds: usize,

    /// Standard deviation of synthesized target noise
    pub noise_std: f64,

    /// Largest tolerated share of rows whose crop is missing from the table
    pub max_unknown_crop_fraction: f64,

    pub feature_set: FeatureSet,

    /// Random forest hyperparameter grid
    pub grid: GridSpec,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: "datasets/irrigation_dataset.csv".to_string(),
            engineered_output_path: None,
            report_path: "model_comparison_results.json".to_string(),
            target_source: TargetSource::Synthesize,
            target_scale: 5.5,
            test_fraction: 0.2,
            random_seed: DEFAULT_SEED,
            cv_folds: 3,
            noise_std: shared::TargetFormula::CANONICAL.noise_std,
            max_unknown_crop_fraction: 0.5,
            feature_set: FeatureSet::Standard,
            grid: GridSpec::default(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("IRR_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 5000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("model.artifact_path", "models/optimized_irrigation_model.bin")?
            .set_default("training.dataset_path", "datasets/irrigation_dataset.csv")?
            .set_default("training.report_path", "model_comparison_results.json")?
            .set_default("training.target_source", "synthesize")?
            .set_default("training.target_scale", 5.5)?
            .set_default("training.test_fraction", 0.2)?
            .set_default("training.random_seed", DEFAULT_SEED)?
            .set_default("training.cv_folds", 3)?
            .set_default("training.noise_std", shared::TargetFormula::CANONICAL.noise_std)?
            .set_default("training.max_unknown_crop_fraction", 0.5)?
            .set_default("training.feature_set", "standard")?
            .set_default("training.grid.n_estimators", vec![100, 200])?
            .set_default("training.grid.max_depth", vec![10, 0])?
            .set_default("training.grid.min_samples_split", vec![2, 5])?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (IRR_ prefix)
            .add_source(
                Environment::with_prefix("IRR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".to_string(),
        }
    }
}
