//! Shared types and rules for the irrigation water requirement predictor
//!
//! This crate holds everything training, serving and the browser client must
//! agree on: the crop base-water table, the feature contract, the target
//! formula and request validation.

pub mod features;
pub mod models;
pub mod synthesis;
pub mod validation;

pub use features::*;
pub use models::*;
pub use synthesis::*;
pub use validation::*;
