//! Persisted model artifact
//!
//! File layout:
//! - 4 bytes magic `IRRM`
//! - u16 little-endian format version
//! - 32 bytes SHA-256 of the payload
//! - bincode payload ([`ModelArtifact`])
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never observes a partial artifact.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{crop_table_fingerprint, FeatureSet, Observation, TargetFormula};

use crate::error::{AppError, AppResult};
use crate::ml::{Pipeline, RegressionMetrics, RegressorParams};

pub const ARTIFACT_MAGIC: [u8; 4] = *b"IRRM";

pub const ARTIFACT_FORMAT_VERSION: u16 = 1;

/// Bumped whenever the preprocessing layout changes
pub const PREPROCESSING_SCHEMA_VERSION: u32 = 1;

const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = ARTIFACT_MAGIC.len() + 2 + CHECKSUM_LEN;

/// Provenance and schema of a trained pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub preprocessing_schema_version: u32,
    pub feature_set: FeatureSet,
    /// Exact ordered input columns the pipeline was fitted on
    pub feature_columns: Vec<String>,
    pub formula_version: u32,
    pub crop_table_fingerprint: String,
    pub model_family: String,
    pub params: RegressorParams,
    /// Held-out metrics, when a test partition was evaluated
    pub metrics: Option<RegressionMetrics>,
    pub n_train: usize,
    pub n_test: usize,
    pub trained_at: DateTime<Utc>,
    pub crate_version: String,
}

impl ArtifactMetadata {
    /// Metadata for a pipeline fitted now against the running crop table
    pub fn describe(
        pipeline: &Pipeline,
        metrics: Option<RegressionMetrics>,
        n_train: usize,
        n_test: usize,
    ) -> Self {
        let feature_set = pipeline.preprocessor().feature_set();
        let params = pipeline.params();
        Self {
            preprocessing_schema_version: PREPROCESSING_SCHEMA_VERSION,
            feature_set,
            feature_columns: feature_set.columns(),
            formula_version: TargetFormula::CANONICAL.version,
            crop_table_fingerprint: crop_table_fingerprint(),
            model_family: params.family().to_string(),
            params,
            metrics,
            n_train,
            n_test,
            trained_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Fitted preprocessing + regressor with its metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub pipeline: Pipeline,
}

impl ModelArtifact {
    pub fn new(pipeline: Pipeline, metrics: Option<RegressionMetrics>, n_train: usize, n_test: usize) -> Self {
        Self {
            metadata: ArtifactMetadata::describe(&pipeline, metrics, n_train, n_test),
            pipeline,
        }
    }

    /// Reject artifacts built against another schema, column list or crop table
    pub fn check_compatible(&self) -> AppResult<()> {
        let meta = &self.metadata;
        if meta.preprocessing_schema_version != PREPROCESSING_SCHEMA_VERSION {
            return Err(AppError::ArtifactLoad(format!(
                "Preprocessing schema version {} is not supported (expected {})",
                meta.preprocessing_schema_version, PREPROCESSING_SCHEMA_VERSION
            )));
        }
        if meta.crop_table_fingerprint != crop_table_fingerprint() {
            return Err(AppError::ArtifactLoad(
                "Artifact was trained against a different crop base-water table".into(),
            ));
        }
        if meta.feature_columns != meta.feature_set.columns() {
            return Err(AppError::ArtifactLoad(format!(
                "Artifact columns {:?} do not match the {} feature set",
                meta.feature_columns, meta.feature_set
            )));
        }
        if self.pipeline.preprocessor().feature_set() != meta.feature_set {
            return Err(AppError::ArtifactLoad(
                "Artifact metadata and preprocessing disagree on the feature set".into(),
            ));
        }
        Ok(())
    }

    /// Predicted requirement, never negative
    pub fn predict(&self, obs: &Observation) -> AppResult<f64> {
        Ok(self.pipeline.predict_one(obs)?.max(0.0))
    }

    pub fn predict_many(&self, observations: &[Observation]) -> AppResult<Vec<f64>> {
        let predicted = self.pipeline.predict(observations)?;
        Ok(predicted.into_iter().map(|v| v.max(0.0)).collect())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize an artifact to bytes
pub fn to_bytes(artifact: &ModelArtifact) -> AppResult<Vec<u8>> {
    let payload = bincode::serialize(artifact)?;
    let checksum = Sha256::digest(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&ARTIFACT_MAGIC);
    bytes.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&checksum);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode and validate an artifact
pub fn from_bytes(bytes: &[u8]) -> AppResult<ModelArtifact> {
    if bytes.len() < HEADER_LEN {
        return Err(AppError::ArtifactLoad("File too small to be a model artifact".into()));
    }
    let (magic, rest) = bytes.split_at(ARTIFACT_MAGIC.len());
    if magic != ARTIFACT_MAGIC {
        return Err(AppError::ArtifactLoad("Not a model artifact (bad magic)".into()));
    }
    let (version, rest) = rest.split_at(2);
    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != ARTIFACT_FORMAT_VERSION {
        return Err(AppError::ArtifactLoad(format!(
            "Unsupported artifact format version {version} (expected {ARTIFACT_FORMAT_VERSION})"
        )));
    }
    let (stored, payload) = rest.split_at(CHECKSUM_LEN);
    if Sha256::digest(payload).as_slice() != stored {
        return Err(AppError::ArtifactLoad("Artifact checksum mismatch".into()));
    }

    let artifact: ModelArtifact = bincode::deserialize(payload)
        .map_err(|e| AppError::ArtifactLoad(format!("Artifact payload is undecodable: {e}")))?;
    artifact.check_compatible()?;
    Ok(artifact)
}

/// Write an artifact atomically
pub fn save(artifact: &ModelArtifact, path: impl AsRef<Path>) -> AppResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let bytes = to_bytes(artifact)?;
    let tmp = temp_path(path);
    fs::write(&tmp, &bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::info!("Saved model artifact ({} bytes) to {}", bytes.len(), path.display());
    Ok(())
}

/// Read and validate an artifact
pub fn load(path: impl AsRef<Path>) -> AppResult<ModelArtifact> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        AppError::ArtifactLoad(format!("Cannot read '{}': {e}", path.display()))
    })?;
    let artifact = from_bytes(&bytes)?;
    tracing::info!(
        "Loaded {} artifact trained at {} ({} features)",
        artifact.metadata.model_family,
        artifact.metadata.trained_at,
        artifact.metadata.feature_set
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{LinearParams, Pipeline};

    fn artifact() -> ModelArtifact {
        let observations: Vec<Observation> = (0..12)
            .map(|i| {
                let crop = if i % 2 == 0 { "rice" } else { "maize" };
                Observation::new(crop, 30.0 + i as f64, 25.0, 70.0, (i % 3) as f64)
            })
            .collect();
        let targets: Vec<f64> = observations.iter().map(shared::noiseless_target).collect();
        let pipeline = Pipeline::fit(
            &RegressorParams::Linear(LinearParams::default()),
            FeatureSet::Standard,
            &observations,
            &targets,
        )
        .unwrap();
        ModelArtifact::new(pipeline, None, observations.len(), 0)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.bin");
        let original = artifact();
        save(&original, &path).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = load(&path).unwrap();
        let obs = Observation::new("rice", 50.0, 25.0, 70.0, 2.0);
        assert_eq!(loaded.predict(&obs).unwrap(), original.predict(&obs).unwrap());
        assert_eq!(loaded.metadata.feature_columns, FeatureSet::Standard.columns());
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = to_bytes(&artifact()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = to_bytes(&artifact()).unwrap();
        bytes[4] = 9;
        assert!(from_bytes(&bytes).unwrap_err().to_string().contains("format version"));

        bytes[..4].copy_from_slice(b"PK\x03\x04");
        assert!(from_bytes(&bytes).unwrap_err().to_string().contains("magic"));
        assert!(from_bytes(b"IRRM").unwrap_err().to_string().contains("too small"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load("/nonexistent/model.bin"),
            Err(AppError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_foreign_table_rejected() {
        let mut foreign = artifact();
        foreign.metadata.crop_table_fingerprint = "0".repeat(64);
        assert!(foreign.check_compatible().is_err());
    }
}
