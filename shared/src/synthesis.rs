//! Synthetic training target
//!
//! The water requirement used as ground truth is produced by an agronomic rule
//! plus Gaussian noise. [`TargetFormula::CANONICAL`] is the only definition in
//! the workspace; dataset engineering, model verification and the client-side
//! rule-based estimate all go through it.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::models::Observation;

/// Hard lower bound of any synthesized requirement (liters per hectare)
pub const TARGET_FLOOR: f64 = 500.0;

/// Seed shared by every consumer that synthesizes inputs or noise
pub const DEFAULT_SEED: u64 = 42;

/// Range of the synthetic soil moisture column (percent)
pub const SYNTHETIC_MOISTURE_RANGE: (f64, f64) = (30.0, 70.0);

/// Coefficients of the water requirement rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TargetFormula {
    /// Bumped whenever any coefficient changes
    pub version: u32,
    pub temperature_coef: f64,
    pub soil_moisture_coef: f64,
    pub rainfall_coef: f64,
    pub humidity_coef: f64,
    /// Standard deviation of the additive noise
    pub noise_std: f64,
    pub floor: f64,
}

impl TargetFormula {
    pub const CANONICAL: TargetFormula = TargetFormula {
        version: 1,
        temperature_coef: 15.0,
        soil_moisture_coef: -20.0,
        rainfall_coef: -50.0,
        humidity_coef: 10.0,
        noise_std: 150.0,
        floor: TARGET_FLOOR,
    };

    /// Same coefficients with a different noise level
    pub fn with_noise_std(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    fn linear_part(&self, obs: &Observation) -> f64 {
        obs.crop_water_base
            + self.temperature_coef * obs.temperature_celsius
            + self.soil_moisture_coef * obs.soil_moisture_percent
            + self.rainfall_coef * obs.rainfall_mm
            + self.humidity_coef * obs.humidity_percent
    }

    /// Rule value with an explicit noise term.
    ///
    /// The sum is truncated to whole liters before the floor applies.
    pub fn target_with_noise(&self, obs: &Observation, noise: f64) -> f64 {
        (self.linear_part(obs) + noise).trunc().max(self.floor)
    }

    /// Rule value without noise
    pub fn noiseless_target(&self, obs: &Observation) -> f64 {
        self.target_with_noise(obs, 0.0)
    }

    /// Rule value with noise drawn from N(0, noise_std)
    pub fn synthesize_target<R: Rng + ?Sized>(&self, obs: &Observation, rng: &mut R) -> f64 {
        let noise = match Normal::new(0.0, self.noise_std) {
            Ok(dist) => dist.sample(rng),
            // Negative or NaN deviation: treat as noiseless
            Err(_) => 0.0,
        };
        self.target_with_noise(obs, noise)
    }
}

impl Default for TargetFormula {
    fn default() -> Self {
        Self::CANONICAL
    }
}

/// Canonical noiseless requirement
pub fn noiseless_target(obs: &Observation) -> f64 {
    TargetFormula::CANONICAL.noiseless_target(obs)
}

/// Canonical noisy requirement
pub fn synthesize_target<R: Rng + ?Sized>(obs: &Observation, rng: &mut R) -> f64 {
    TargetFormula::CANONICAL.synthesize_target(obs, rng)
}

/// Draw a soil moisture reading, uniform over the synthetic range, 0.1 resolution
pub fn synthetic_soil_moisture<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let (low, high) = SYNTHETIC_MOISTURE_RANGE;
    let value = Uniform::new(low, high).sample(rng);
    (value * 10.0).round() / 10.0
}
