//! Backward pass: Rauch–Tung–Striebel fixed-interval smoother
//!
//! Starting from the last filtered estimate (which already uses every observation), each earlier
//! estimate is revised with information carried back from the step after it:
//!
//! $$
//! G_k = P_k F^T \bar{P}_{k+1}^{-1}
//! $$
//! $$
//! \hat{x}_k = x_k + G_k (\hat{x}_{k+1} - \bar{x}_{k+1})
//! $$
//! $$
//! \hat{P}_k = P_k + G_k (\hat{P}_{k+1} - \bar{P}_{k+1}) G_k^T
//! $$
//!
//! where $x_k, P_k$ are the filtered estimate, $\bar{x}_{k+1}, \bar{P}_{k+1}$ the prediction made
//! from it, and hats denote smoothed quantities. The smoothed covariance is never larger than the
//! filtered one.
//!
//! [smooth_trajectory] is the single entry point most callers need; [smooth] additionally returns
//! the intermediate estimates of both passes.

use log::{debug, info, warn};
use nalgebra::{Matrix4, Vector4};

use crate::SmootherError;
use crate::config::SmootherParameters;
use crate::filter::{COVARIANCE_TOLERANCE, FilterStep, forward_pass};
use crate::linalg::{covariance_is_valid, spd_solve, symmetrize};
use crate::model::StateSpaceModel;

/// Smoothed estimate at one observation.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothedEstimate {
    pub state: Vector4<f64>,
    pub covariance: Matrix4<f64>,
}

impl SmoothedEstimate {
    /// (latitude, longitude) of the estimate
    pub fn position(&self) -> (f64, f64) {
        (self.state[0], self.state[2])
    }
}

/// Everything a smoothing run produced.
#[derive(Clone, Debug)]
pub struct SmoothedTrajectory {
    pub model: StateSpaceModel,
    /// Forward pass, one entry per observation
    pub filtered: Vec<FilterStep>,
    /// Backward pass, one entry per observation
    pub smoothed: Vec<SmoothedEstimate>,
}

impl SmoothedTrajectory {
    /// Smoothed (latitude, longitude) for every observation, in input order
    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.smoothed.iter().map(SmoothedEstimate::position).collect()
    }

    /// Filtered-only (latitude, longitude) for every observation, in input order
    pub fn filtered_positions(&self) -> Vec<(f64, f64)> {
        self.filtered
            .iter()
            .map(|s| (s.state[0], s.state[2]))
            .collect()
    }

    /// Smoothed (latitude rate, longitude rate) in degrees per `dt`
    pub fn velocities(&self) -> Vec<(f64, f64)> {
        self.smoothed
            .iter()
            .map(|s| (s.state[1], s.state[3]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.smoothed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.smoothed.is_empty()
    }
}

/// Run the backward pass over the results of [forward_pass].
pub fn backward_pass(
    model: &StateSpaceModel,
    steps: &[FilterStep],
) -> Result<Vec<SmoothedEstimate>, SmootherError> {
    let n = steps.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let f = &model.transition;

    let mut later = SmoothedEstimate {
        state: steps[n - 1].state,
        covariance: steps[n - 1].covariance,
    };
    let mut smoothed: Vec<SmoothedEstimate> = Vec::with_capacity(n);
    smoothed.push(later.clone());

    for k in (0..n - 1).rev() {
        let current = &steps[k];
        let next = &steps[k + 1];

        // G = P Fᵀ P̄⁻¹, solved as Gᵀ = P̄⁻¹ F P since both covariances are symmetric
        let f_p = f * current.covariance;
        let gain_t = spd_solve(&next.predicted_covariance, &f_p).ok_or_else(|| {
            SmootherError::ill_conditioned(format!(
                "predicted covariance is singular at step {}",
                k + 1
            ))
        })?;
        let gain = gain_t.transpose();

        let state = current.state + gain * (later.state - next.predicted_state);
        let covariance = symmetrize(
            &(current.covariance
                + gain * (later.covariance - next.predicted_covariance) * gain.transpose()),
        );

        if !(state.iter().all(|v| v.is_finite()) && covariance.iter().all(|v| v.is_finite())) {
            return Err(SmootherError::ill_conditioned(format!(
                "non-finite smoothed estimate at step {k}"
            )));
        }
        if !covariance_is_valid(&covariance, COVARIANCE_TOLERANCE) {
            warn!("Smoothed covariance at step {k} is not symmetric positive semi-definite");
        }
        later = SmoothedEstimate { state, covariance };
        smoothed.push(later.clone());
    }

    smoothed.reverse();
    debug!("Backward pass complete: {} steps", smoothed.len());
    Ok(smoothed)
}

/// Build the model, filter forward, smooth backward, and keep every intermediate estimate.
pub fn smooth(
    observations: &[(f64, f64)],
    params: &SmootherParameters,
) -> Result<SmoothedTrajectory, SmootherError> {
    let model = StateSpaceModel::new(observations, params)?;
    let filtered = forward_pass(&model, observations)?;
    let smoothed = backward_pass(&model, &filtered)?;
    info!(
        "Smoothed {} observations (pos={} ft, velo={} ft/s, meas={} ft, q={:e}, dt={})",
        observations.len(),
        params.uncertainty_pos,
        params.uncertainty_velo,
        params.state_uncertainty_pos,
        params.process_uncertainty,
        params.dt
    );
    Ok(SmoothedTrajectory {
        model,
        filtered,
        smoothed,
    })
}

/// Smooth a GPS trace.
///
/// # Arguments
/// * `observations` - raw (latitude, longitude) fixes in degrees, at least two, one per `dt`
/// * `params` - uncertainty parameters and step size, see [SmootherParameters]
///
/// # Returns
/// Smoothed (latitude, longitude) pairs, one per observation and in the same order, or an error
/// and no output at all.
///
/// # Example
/// ```rust
/// use tracksmooth::{SmootherParameters, smooth_trajectory};
///
/// let trace = vec![(40.0, -105.0), (40.0001, -105.0), (40.00021, -105.00001), (40.0003, -105.0)];
/// let smoothed = smooth_trajectory(&trace, &SmootherParameters::default()).unwrap();
/// assert_eq!(smoothed.len(), trace.len());
/// ```
pub fn smooth_trajectory(
    observations: &[(f64, f64)],
    params: &SmootherParameters,
) -> Result<Vec<(f64, f64)>, SmootherError> {
    Ok(smooth(observations, params)?.positions())
}
