//! Inference service
//!
//! The artifact is loaded once at startup. A failed load does not stop the
//! server; it leaves the service unavailable and every prediction reports
//! `ModelNotLoaded` until the process is restarted with a good artifact.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use shared::{round_to_cents, validate_prediction_request, Observation, PredictionResponse};

use super::artifact::{self, ModelArtifact};
use crate::error::{AppError, AppResult};

/// Outcome of the startup load
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(Arc<ModelArtifact>),
    Unavailable { reason: String },
}

/// Predicts water requirement with the artifact loaded at startup
#[derive(Debug, Clone)]
pub struct PredictionService {
    state: ModelState,
}

/// Transform then regress; clamped at zero
pub fn predict(artifact: &ModelArtifact, obs: &Observation) -> AppResult<f64> {
    artifact.predict(obs)
}

impl PredictionService {
    /// Load the artifact at `path`; failures are logged, never raised
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match artifact::load(path) {
            Ok(artifact) => Self::ready(artifact),
            Err(e) => {
                tracing::error!("Model unavailable: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn ready(artifact: ModelArtifact) -> Self {
        Self {
            state: ModelState::Ready(Arc::new(artifact)),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn artifact(&self) -> AppResult<&Arc<ModelArtifact>> {
        match &self.state {
            ModelState::Ready(artifact) => Ok(artifact),
            ModelState::Unavailable { reason } => Err(AppError::ModelNotLoaded(reason.clone())),
        }
    }

    /// Predict for an already validated observation
    pub fn predict(&self, obs: &Observation) -> AppResult<f64> {
        predict(self.artifact()?, obs)
    }

    /// Validate a raw request body and predict, rounded to 2 decimals.
    ///
    /// Availability is checked before the body is validated.
    pub fn predict_request(&self, body: Value) -> AppResult<PredictionResponse> {
        let artifact = self.artifact()?;
        let obs = validate_prediction_request(&body)?;
        let prediction = round_to_cents(predict(artifact, &obs)?);

        tracing::debug!(crop_type = %obs.crop_type, prediction, "Predicted water requirement");

        Ok(PredictionResponse {
            success: true,
            water_requirement_liters_per_hectare: prediction,
            input_data: body,
        })
    }
}
