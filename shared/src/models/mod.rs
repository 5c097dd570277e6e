//! Domain models for the irrigation predictor

mod crop;
mod observation;

pub use crop::*;
pub use observation::*;
