//! Forward pass: linear Kalman filter over a complete trace
//!
//! For every observation the filter first propagates the previous estimate through the model
//! (predict) and then corrects it with the observation (update). Both the predicted and the
//! updated estimate are kept for every step because the backward pass needs them.
//!
//! The update uses the Joseph form
//!
//! $$
//! P = (I - K H) \bar{P} (I - K H)^T + K R K^T
//! $$
//!
//! which stays symmetric and positive semi-definite under round-off where the short form
//! $(I - KH)\bar{P}$ does not.

use log::{debug, warn};
use nalgebra::{Matrix2, Matrix4, Matrix4x2, Vector2, Vector4};

use crate::SmootherError;
use crate::linalg::{covariance_is_valid, spd_solve, symmetrize};
use crate::model::StateSpaceModel;

/// Relative tolerance used when checking filter covariances for symmetry and PSD
pub(crate) const COVARIANCE_TOLERANCE: f64 = 1e-8;

/// Predicted and updated estimate at one observation.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterStep {
    /// State after predict, before update
    pub predicted_state: Vector4<f64>,
    /// Covariance after predict, before update
    pub predicted_covariance: Matrix4<f64>,
    /// State after update
    pub state: Vector4<f64>,
    /// Covariance after update
    pub covariance: Matrix4<f64>,
    /// Observation minus predicted observation
    pub innovation: Vector2<f64>,
}

/// Propagate a state and covariance one step through the model.
pub fn predict(
    model: &StateSpaceModel,
    state: &Vector4<f64>,
    covariance: &Matrix4<f64>,
) -> (Vector4<f64>, Matrix4<f64>) {
    let f = &model.transition;
    let state = f * state;
    let covariance = symmetrize(&(f * covariance * f.transpose() + model.process_noise));
    (state, covariance)
}

/// Correct a predicted estimate with one observation.
///
/// Returns the updated state, covariance and the innovation. `step` only labels the error.
pub fn update(
    model: &StateSpaceModel,
    predicted_state: &Vector4<f64>,
    predicted_covariance: &Matrix4<f64>,
    observation: &Vector2<f64>,
    step: usize,
) -> Result<(Vector4<f64>, Matrix4<f64>, Vector2<f64>), SmootherError> {
    let h = &model.observation;
    let r = &model.observation_noise;

    let innovation = observation - model.predicted_observation(predicted_state);
    let innovation_covariance: Matrix2<f64> =
        symmetrize(&(h * predicted_covariance * h.transpose() + r));

    // K = P̄ Hᵀ S⁻¹, solved as Kᵀ = S⁻¹ H P̄ since S and P̄ are symmetric
    let pht: Matrix4x2<f64> = predicted_covariance * h.transpose();
    let gain_t = spd_solve(&innovation_covariance, &pht.transpose()).ok_or_else(|| {
        SmootherError::ill_conditioned(format!(
            "innovation covariance is singular at step {step}: {:?}",
            innovation_covariance.as_slice()
        ))
    })?;
    let gain: Matrix4x2<f64> = gain_t.transpose();

    let state = predicted_state + gain * innovation;
    let i_kh = Matrix4::identity() - gain * h;
    let covariance =
        symmetrize(&(i_kh * predicted_covariance * i_kh.transpose() + gain * r * gain.transpose()));

    if !(state.iter().all(|v| v.is_finite()) && covariance.iter().all(|v| v.is_finite())) {
        return Err(SmootherError::ill_conditioned(format!(
            "non-finite estimate after update at step {step}"
        )));
    }
    Ok((state, covariance, innovation))
}

/// Run the filter over every observation, in order.
///
/// The prior ([StateSpaceModel::initial_state], [StateSpaceModel::initial_covariance]) is
/// predicted forward before the first observation is applied, so every observation, including
/// the first, goes through the same predict/update cycle.
pub fn forward_pass(
    model: &StateSpaceModel,
    observations: &[(f64, f64)],
) -> Result<Vec<FilterStep>, SmootherError> {
    let mut steps = Vec::with_capacity(observations.len());
    let mut state = model.initial_state;
    let mut covariance = model.initial_covariance;

    for (k, &(lat, lon)) in observations.iter().enumerate() {
        let (predicted_state, predicted_covariance) = predict(model, &state, &covariance);
        let z = Vector2::new(lat, lon);
        let (updated_state, updated_covariance, innovation) =
            update(model, &predicted_state, &predicted_covariance, &z, k)?;

        if !covariance_is_valid(&updated_covariance, COVARIANCE_TOLERANCE) {
            warn!("Filtered covariance at step {k} is not symmetric positive semi-definite");
        }

        state = updated_state;
        covariance = updated_covariance;
        steps.push(FilterStep {
            predicted_state,
            predicted_covariance,
            state,
            covariance,
            innovation,
        });
    }

    debug!(
        "Forward pass complete: {} steps, final covariance trace {:e}",
        steps.len(),
        covariance.trace()
    );
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmootherParameters;
    use assert_approx_eq::assert_approx_eq;

    fn trace(n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| (40.0 + 1e-4 * i as f64, -105.0 + 5e-5 * i as f64))
            .collect()
    }

    #[test]
    fn predict_moves_position_by_velocity() {
        let obs = trace(3);
        let model = StateSpaceModel::new(&obs, &SmootherParameters::default()).unwrap();
        let (x, p) = predict(&model, &model.initial_state, &model.initial_covariance);
        assert_approx_eq!(x[0], 40.0001, 1e-12);
        assert_approx_eq!(x[2], -105.0 + 1e-4, 1e-12);
        assert_eq!(x[1], model.initial_state[1]);
        // uncertainty grows
        assert!(p.trace() > model.initial_covariance.trace());
        assert_eq!(p, p.transpose());
    }

    #[test]
    fn update_pulls_towards_observation_and_shrinks_covariance() {
        let obs = trace(3);
        let model = StateSpaceModel::new(&obs, &SmootherParameters::default()).unwrap();
        let (x_bar, p_bar) = predict(&model, &model.initial_state, &model.initial_covariance);
        let z = Vector2::new(x_bar[0] + 1e-5, x_bar[2] - 1e-5);
        let (x, p, y) = update(&model, &x_bar, &p_bar, &z, 0).unwrap();
        assert_approx_eq!(y[0], 1e-5, 1e-12);
        assert_approx_eq!(y[1], -1e-5, 1e-12);
        assert!(x[0] > x_bar[0] && x[0] < z[0]);
        assert!(x[2] < x_bar[2] && x[2] > z[1]);
        assert!(p[(0, 0)] < p_bar[(0, 0)]);
        assert!(p[(2, 2)] < p_bar[(2, 2)]);
        assert!(covariance_is_valid(&p, COVARIANCE_TOLERANCE));
    }

    #[test]
    fn forward_pass_keeps_one_step_per_observation() {
        let obs = trace(25);
        let model = StateSpaceModel::new(&obs, &SmootherParameters::default()).unwrap();
        let steps = forward_pass(&model, &obs).unwrap();
        assert_eq!(steps.len(), obs.len());
        for step in &steps {
            assert!(covariance_is_valid(&step.covariance, COVARIANCE_TOLERANCE));
            assert!(step.covariance.trace() <= step.predicted_covariance.trace());
        }
        // a noise-free linear track is followed closely once the filter settles
        let last = steps.last().unwrap();
        assert_approx_eq!(last.state[0], obs[24].0, 2e-5);
        assert_approx_eq!(last.state[2], obs[24].1, 2e-5);
        assert_approx_eq!(last.state[1], 1e-4, 5e-6);
        assert_approx_eq!(last.state[3], 5e-5, 5e-6);
    }

    #[test]
    fn singular_innovation_covariance_is_reported() {
        let obs = trace(3);
        let mut model = StateSpaceModel::new(&obs, &SmootherParameters::default()).unwrap();
        model.initial_covariance = Matrix4::zeros();
        model.process_noise = Matrix4::zeros();
        model.observation_noise = Matrix2::zeros();
        match forward_pass(&model, &obs) {
            Err(SmootherError::IllConditionedModel(msg)) => assert!(msg.contains("step 0")),
            other => panic!("expected IllConditionedModel, got {other:?}"),
        }
    }
}
