//! GPS trajectory smoothing with a constant-velocity Kalman filter and a Rauch–Tung–Striebel
//! smoother
//!
//! Recorded GPS traces of runs and rides jitter around the true path: every fix carries a few tens
//! of feet of error. This crate takes a complete trace of (latitude, longitude) fixes sampled at a
//! uniform interval and returns a smoothed trace of the same length and order. Smoothing is done
//! offline in two passes:
//!
//! 1. a forward linear Kalman filter pass with a constant-velocity motion model, and
//! 2. a backward Rauch–Tung–Striebel (RTS) pass that revises every estimate using the
//!    observations that came after it.
//!
//! The crate is built on [`nalgebra`](https://crates.io/crates/nalgebra) for the (small, fixed
//! size) matrices. Everything else is auxiliary: reading traces and configuration with
//! [`serde`](https://crates.io/crates/serde), synthetic traces with
//! [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr),
//! and logging through the [`log`](https://crates.io/crates/log) facade.
//!
//! ## Crate overview
//!
//! - [config]: Tuning parameters, their defaults, and JSON/YAML/TOML persistence.
//! - [earth]: WGS84 constants, degree lengths, feet/degree conversions and distances.
//! - [error]: The error type returned by the smoother.
//! - [filter]: The forward Kalman filter pass.
//! - [linalg]: Small linear algebra helpers (SPD solves, symmetrization, PSD checks).
//! - [model]: Construction of the constant-velocity state-space model from a trace.
//! - [report]: Paired raw/smoothed output with a distance summary.
//! - [smoother]: The backward RTS pass and the [smooth_trajectory] entry point.
//! - [synthetic]: Seeded synthetic noisy traces.
//! - [trace]: Raw trace types, readers, and the activity provider seam.
//!
//! ## State definition
//!
//! The state vector is
//!
//! $$
//! x = [\phi, \dot{\phi}, \lambda, \dot{\lambda}]
//! $$
//!
//! where $\phi$ is latitude and $\lambda$ longitude in degrees, and the dotted quantities their
//! rates in degrees per step. Latitude and longitude evolve independently:
//!
//! $$
//! F = \begin{bmatrix} 1 & \Delta t & 0 & 0 \\\\ 0 & 1 & 0 & 0 \\\\ 0 & 0 & 1 & \Delta t \\\\ 0 & 0 & 0 & 1 \end{bmatrix}
//! \quad
//! H = \begin{bmatrix} 1 & 0 & 0 & 0 \\\\ 0 & 0 & 1 & 0 \end{bmatrix}
//! $$
//!
//! All tuning parameters are given in feet (or feet per second) and converted into degrees with a
//! [DegreeScale].
//!
//! ## Example
//!
//! ```rust
//! use tracksmooth::{SmootherParameters, smooth_trajectory};
//!
//! let raw = vec![(40.0, -105.0), (40.00011, -105.00001), (40.00019, -104.99999), (40.0003, -105.0)];
//! let params = SmootherParameters::new(30.0, 25.0, 30.0, 1e-12);
//! let smoothed = smooth_trajectory(&raw, &params).unwrap();
//! assert_eq!(smoothed.len(), raw.len());
//! ```

pub mod config;
pub mod earth;
pub mod error;
pub mod filter;
pub mod linalg;
pub mod model;
pub mod report;
pub mod smoother;
pub mod synthetic;
pub mod trace;

pub use config::{DegreeScale, SmootherParameters};
pub use error::SmootherError;
pub use filter::{FilterStep, forward_pass};
pub use model::StateSpaceModel;
pub use smoother::{SmoothedEstimate, SmoothedTrajectory, backward_pass, smooth, smooth_trajectory};
pub use trace::{ActivityProvider, DirectoryProvider, TrackPoint};
