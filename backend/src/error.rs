//! Error handling for the irrigation backend
//!
//! One error type serves the training job and the HTTP layer. Request errors
//! map to 4xx responses; model availability errors map to 503.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ValidationError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Request errors
    #[error("Validation error: {message}")]
    Validation {
        fields: Vec<String>,
        message: String,
    },

    // Model availability errors
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Model artifact unavailable: {0}")]
    ArtifactLoad(String),

    // Training errors
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Wrapped library errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation {
            fields: err.fields(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl AppError {
    /// Stable machine-readable code and HTTP status
    pub fn code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::ModelNotLoaded(_) => (StatusCode::SERVICE_UNAVAILABLE, "MODEL_NOT_LOADED"),
            AppError::ArtifactLoad(_) => (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE"),
            AppError::Dataset(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATASET_ERROR"),
            AppError::Training(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TRAINING_ERROR"),
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::Io(_) | AppError::Csv(_) | AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.code();
        let detail = match &self {
            AppError::Validation { fields, message } => ErrorDetail {
                code: code.to_string(),
                message: message.clone(),
                fields: Some(fields.clone()),
            },
            AppError::ModelNotLoaded(_) => ErrorDetail {
                code: code.to_string(),
                message: "Model not loaded. Please check server logs.".to_string(),
                fields: None,
            },
            // Library error text can leak paths; keep it in the logs only
            AppError::Io(_) | AppError::Csv(_) | AppError::Serialization(_) => ErrorDetail {
                code: code.to_string(),
                message: "An internal I/O error occurred".to_string(),
                fields: None,
            },
            other => ErrorDetail {
                code: code.to_string(),
                message: other.to_string(),
                fields: None,
            },
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
