//! Constant-velocity state-space model of a 2-D GPS track
//!
//! The state is the four-vector
//!
//! $$
//! x = [\phi, \dot{\phi}, \lambda, \dot{\lambda}]
//! $$
//!
//! of latitude, latitude rate, longitude and longitude rate, all in degrees (per step). Each axis
//! is an independent constant-velocity process:
//!
//! $$
//! F = \begin{bmatrix} 1 & dt & 0 & 0 \\\\ 0 & 1 & 0 & 0 \\\\ 0 & 0 & 1 & dt \\\\ 0 & 0 & 0 & 1 \end{bmatrix},
//! \quad
//! H = \begin{bmatrix} 1 & 0 & 0 & 0 \\\\ 0 & 0 & 1 & 0 \end{bmatrix}
//! $$
//!
//! and the process noise is the block-diagonal of two discrete white-noise acceleration blocks
//!
//! $$
//! Q_{axis} = \sigma^2 \begin{bmatrix} dt^4/4 & dt^3/2 \\\\ dt^3/2 & dt^2 \end{bmatrix}
//! $$
//!
//! Uncertainties arrive in feet and feet per second. They are converted to degrees with the
//! configured [DegreeScale](crate::config::DegreeScale), separately for latitude and longitude,
//! and squared into variances.

use log::{debug, warn};
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};

use crate::SmootherError;
use crate::config::{SmootherParameters, VELOCITY_SIGMA_BOUND};
use crate::earth::feet_to_degrees;
use crate::linalg::block_diagonal;

/// Matrices of the linear-Gaussian model, fixed for a whole smoothing run.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSpaceModel {
    /// State transition matrix F (4×4)
    pub transition: Matrix4<f64>,
    /// Observation matrix H (2×4)
    pub observation: Matrix2x4<f64>,
    /// Process noise covariance Q (4×4)
    pub process_noise: Matrix4<f64>,
    /// Observation noise covariance R (2×2)
    pub observation_noise: Matrix2<f64>,
    /// Prior mean x₀
    pub initial_state: Vector4<f64>,
    /// Prior covariance P₀
    pub initial_covariance: Matrix4<f64>,
}

impl StateSpaceModel {
    /// Build the model for a trace.
    ///
    /// Validates the observations and parameters first; nothing is constructed from malformed
    /// input.
    pub fn new(
        observations: &[(f64, f64)],
        params: &SmootherParameters,
    ) -> Result<StateSpaceModel, SmootherError> {
        validate_observations(observations)?;
        params.validate()?;

        let (lat0, lon0) = observations[0];
        let (lat1, lon1) = observations[1];
        let (lat_miles, lon_miles) = params.degree_scale.miles_per_degree(lat0)?;
        let dt = params.dt;

        let sigma_lat = feet_to_degrees(params.uncertainty_pos, lat_miles);
        let sigma_lon = feet_to_degrees(params.uncertainty_pos, lon_miles);
        let velo_sigma_ft = params.uncertainty_velo / VELOCITY_SIGMA_BOUND;
        let sigma_vlat = feet_to_degrees(velo_sigma_ft, lat_miles);
        let sigma_vlon = feet_to_degrees(velo_sigma_ft, lon_miles);
        let initial_covariance = Matrix4::from_diagonal(&Vector4::new(
            sigma_lat.powi(2),
            sigma_vlat.powi(2),
            sigma_lon.powi(2),
            sigma_vlon.powi(2),
        ));

        let observation_noise = Matrix2::from_diagonal(&Vector2::new(
            feet_to_degrees(params.state_uncertainty_pos, lat_miles).powi(2),
            feet_to_degrees(params.state_uncertainty_pos, lon_miles).powi(2),
        ));

        let q = discrete_white_noise(dt, params.process_uncertainty);
        let process_noise = block_diagonal(&q, &q);

        // Position from the first fix, velocity from the first difference. The longitude
        // component starts from the second fix.
        let initial_state = Vector4::new(lat0, lat1 - lat0, lon1, lon1 - lon0);

        let model = StateSpaceModel {
            transition: constant_velocity_transition(dt),
            observation: position_observation(),
            process_noise,
            observation_noise,
            initial_state,
            initial_covariance,
        };
        debug!(
            "Built constant-velocity model: dt={}, miles/deg=({:.3}, {:.3}), P0 diag={:?}, R diag={:?}",
            dt,
            lat_miles,
            lon_miles,
            model.initial_covariance.diagonal().as_slice(),
            model.observation_noise.diagonal().as_slice()
        );
        Ok(model)
    }

    /// Observation matrix applied to a state: the (latitude, longitude) it predicts.
    pub fn predicted_observation(&self, state: &Vector4<f64>) -> Vector2<f64> {
        self.observation * state
    }
}

/// Constant-velocity transition for two independent axes
pub fn constant_velocity_transition(dt: f64) -> Matrix4<f64> {
    Matrix4::new(
        1.0, dt, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, dt, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Observation matrix selecting latitude and longitude from the state
pub fn position_observation() -> Matrix2x4<f64> {
    Matrix2x4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    )
}

/// Discrete white-noise acceleration covariance for one (position, velocity) axis.
///
/// Rank one: the same acceleration sample drives both the position and the velocity.
pub fn discrete_white_noise(dt: f64, variance: f64) -> Matrix2<f64> {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;
    Matrix2::new(0.25 * dt4, 0.5 * dt3, 0.5 * dt3, dt2) * variance
}

/// Check that a trace can be smoothed: at least two fixes, all finite and in range.
pub fn validate_observations(observations: &[(f64, f64)]) -> Result<(), SmootherError> {
    if observations.len() < 2 {
        return Err(SmootherError::invalid(format!(
            "need at least two observations, got {}",
            observations.len()
        )));
    }
    for (i, &(lat, lon)) in observations.iter().enumerate() {
        if !(lat.is_finite() && lon.is_finite()) {
            return Err(SmootherError::invalid(format!(
                "observation {i} is not finite: ({lat}, {lon})"
            )));
        }
        if lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(SmootherError::invalid(format!(
                "observation {i} is out of range: ({lat}, {lon})"
            )));
        }
    }
    let repeats = observations.windows(2).filter(|w| w[0] == w[1]).count();
    if repeats * 2 > observations.len() {
        warn!(
            "{} of {} consecutive fixes are repeated; the trace may be paused or duplicated",
            repeats,
            observations.len()
        );
    }
    Ok(())
}
