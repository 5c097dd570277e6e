//! Services for the irrigation backend

pub mod artifact;
pub mod dataset;
pub mod prediction;
pub mod training;

pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use dataset::{DatasetOptions, DatasetSummary, EngineeredDataset};
pub use prediction::{ModelState, PredictionService};
pub use training::{ComparisonReport, TrainingOutcome, TrainingService, VerificationReport};
