//! Synthetic GPS traces for demos and tests.
//!
//! A trace moves at constant velocity in degrees per step and every fix is perturbed by
//! independent zero-mean Gaussian noise given in feet, converted per axis with the fixed
//! 69/53 miles-per-degree scales. The generator is seeded so traces are reproducible.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::SmootherError;
use crate::earth::{LATITUDE_MILES_PER_DEGREE, LONGITUDE_MILES_PER_DEGREE, feet_to_degrees};

/// Generate a constant-velocity trace of `n` points and a noisy copy of it.
///
/// # Arguments
/// * `start` - (latitude, longitude) of the first true position, degrees
/// * `velocity_deg_per_step` - (latitude, longitude) change per step, degrees
/// * `n` - number of points
/// * `noise_ft` - standard deviation of the GPS noise, feet
/// * `seed` - seed of the random number generator
///
/// # Returns
/// `(truth, noisy)`, both of length `n`.
pub fn constant_velocity_trace(
    start: (f64, f64),
    velocity_deg_per_step: (f64, f64),
    n: usize,
    noise_ft: f64,
    seed: u64,
) -> Result<(Vec<(f64, f64)>, Vec<(f64, f64)>), SmootherError> {
    if !(noise_ft.is_finite() && noise_ft >= 0.0) {
        return Err(SmootherError::invalid(format!(
            "noise must be finite and non-negative, got {noise_ft}"
        )));
    }
    let lat_noise = Normal::new(0.0, feet_to_degrees(noise_ft, LATITUDE_MILES_PER_DEGREE))
        .map_err(|e| SmootherError::invalid(e.to_string()))?;
    let lon_noise = Normal::new(0.0, feet_to_degrees(noise_ft, LONGITUDE_MILES_PER_DEGREE))
        .map_err(|e| SmootherError::invalid(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let truth: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let k = i as f64;
            (
                start.0 + k * velocity_deg_per_step.0,
                start.1 + k * velocity_deg_per_step.1,
            )
        })
        .collect();
    let noisy = truth
        .iter()
        .map(|&(lat, lon)| (lat + lat_noise.sample(&mut rng), lon + lon_noise.sample(&mut rng)))
        .collect();
    Ok((truth, noisy))
}

/// Root-mean-square position error in degrees between two index-aligned traces.
///
/// Only the common prefix is compared; empty input gives zero.
pub fn rmse(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| (p.0 - q.0).powi(2) + (p.1 - q.1).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}
