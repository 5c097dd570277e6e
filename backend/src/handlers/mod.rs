//! HTTP handlers for the irrigation backend

pub mod crops;
pub mod health;
pub mod prediction;

pub use crops::crop_info;
pub use health::health_check;
pub use prediction::predict;
