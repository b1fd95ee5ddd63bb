//! Smoother tuning parameters
//!
//! This module is the parameter source for the smoother: the four uncertainty knobs, the step
//! size, and the choice of degree-length scaling, together with their documented defaults. The
//! parameters can be built in code or read from a JSON, YAML or TOML file; missing fields fall
//! back to the defaults so a configuration file only needs to name what it overrides.
//!
//! ```toml
//! uncertainty_pos = 30.0
//! uncertainty_velo = 25.0
//! state_uncertainty_pos = 15.0
//! process_uncertainty = 1e-12
//! dt = 1.0
//!
//! [degree_scale]
//! model = "fixed"
//! lat_miles_per_degree = 69.0
//! lon_miles_per_degree = 53.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::SmootherError;
use crate::earth::{LATITUDE_MILES_PER_DEGREE, LONGITUDE_MILES_PER_DEGREE, degree_lengths_miles};

/// Fastest speed, in feet per second, an athlete is assumed to plausibly move (a fast running
/// pace). Used as the default velocity uncertainty.
pub const MAX_PLAUSIBLE_SPEED_FT_PER_S: f64 = 25.0;
/// Number of standard deviations the maximum plausible speed is taken to span (three-sigma rule)
pub const VELOCITY_SIGMA_BOUND: f64 = 3.0;
/// Default initial positional uncertainty in feet
pub const DEFAULT_UNCERTAINTY_POS: f64 = 30.0;
/// Default initial velocity uncertainty in feet per second
pub const DEFAULT_UNCERTAINTY_VELO: f64 = MAX_PLAUSIBLE_SPEED_FT_PER_S;
/// Default measurement uncertainty in feet
pub const DEFAULT_STATE_UNCERTAINTY: f64 = 30.0;
/// Default process noise variance (squared degrees per step)
pub const DEFAULT_PROCESS_UNCERTAINTY: f64 = 1e-12;
/// Default time between observations
pub const DEFAULT_DT: f64 = 1.0;

/// How feet are converted into degrees of latitude and longitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DegreeScale {
    /// Constant miles-per-degree for each axis, independent of where the trace is
    Fixed {
        lat_miles_per_degree: f64,
        lon_miles_per_degree: f64,
    },
    /// Degree lengths from the WGS84 ellipsoid at the trace's reference latitude
    Ellipsoidal,
}

impl Default for DegreeScale {
    fn default() -> Self {
        DegreeScale::Fixed {
            lat_miles_per_degree: LATITUDE_MILES_PER_DEGREE,
            lon_miles_per_degree: LONGITUDE_MILES_PER_DEGREE,
        }
    }
}

impl DegreeScale {
    /// Miles spanned by one degree of (latitude, longitude) at `reference_latitude`.
    pub fn miles_per_degree(&self, reference_latitude: f64) -> Result<(f64, f64), SmootherError> {
        let (lat_miles, lon_miles) = match *self {
            DegreeScale::Fixed {
                lat_miles_per_degree,
                lon_miles_per_degree,
            } => (lat_miles_per_degree, lon_miles_per_degree),
            DegreeScale::Ellipsoidal => degree_lengths_miles(reference_latitude),
        };
        // A degree of longitude near the poles is too short to convert feet into
        if !(lat_miles.is_finite() && lat_miles > 0.0 && lon_miles.is_finite() && lon_miles > 1e-6)
        {
            return Err(SmootherError::invalid(format!(
                "degree lengths ({lat_miles} mi, {lon_miles} mi) at latitude {reference_latitude} are unusable"
            )));
        }
        Ok((lat_miles, lon_miles))
    }
}

fn default_uncertainty_pos() -> f64 {
    DEFAULT_UNCERTAINTY_POS
}
fn default_uncertainty_velo() -> f64 {
    DEFAULT_UNCERTAINTY_VELO
}
fn default_state_uncertainty() -> f64 {
    DEFAULT_STATE_UNCERTAINTY
}
fn default_process_uncertainty() -> f64 {
    DEFAULT_PROCESS_UNCERTAINTY
}
fn default_dt() -> f64 {
    DEFAULT_DT
}

/// Tuning parameters of one smoothing run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmootherParameters {
    /// Initial positional uncertainty, feet
    #[serde(default = "default_uncertainty_pos")]
    pub uncertainty_pos: f64,
    /// Initial velocity uncertainty, feet per second. Interpreted as the maximum plausible speed
    /// and divided by [VELOCITY_SIGMA_BOUND] to get a standard deviation.
    #[serde(default = "default_uncertainty_velo")]
    pub uncertainty_velo: f64,
    /// Measurement uncertainty of each GPS fix, feet
    #[serde(default = "default_state_uncertainty")]
    pub state_uncertainty_pos: f64,
    /// Process noise variance of the discrete white-noise acceleration model
    #[serde(default = "default_process_uncertainty")]
    pub process_uncertainty: f64,
    /// Time between consecutive observations
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub degree_scale: DegreeScale,
}

impl Default for SmootherParameters {
    fn default() -> Self {
        SmootherParameters {
            uncertainty_pos: DEFAULT_UNCERTAINTY_POS,
            uncertainty_velo: DEFAULT_UNCERTAINTY_VELO,
            state_uncertainty_pos: DEFAULT_STATE_UNCERTAINTY,
            process_uncertainty: DEFAULT_PROCESS_UNCERTAINTY,
            dt: DEFAULT_DT,
            degree_scale: DegreeScale::default(),
        }
    }
}

impl SmootherParameters {
    pub fn new(
        uncertainty_pos: f64,
        uncertainty_velo: f64,
        state_uncertainty_pos: f64,
        process_uncertainty: f64,
    ) -> Self {
        SmootherParameters {
            uncertainty_pos,
            uncertainty_velo,
            state_uncertainty_pos,
            process_uncertainty,
            ..Default::default()
        }
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_degree_scale(mut self, degree_scale: DegreeScale) -> Self {
        self.degree_scale = degree_scale;
        self
    }

    /// Reject non-positive or non-finite parameters.
    pub fn validate(&self) -> Result<(), SmootherError> {
        let named = [
            ("uncertainty_pos", self.uncertainty_pos),
            ("uncertainty_velo", self.uncertainty_velo),
            ("state_uncertainty_pos", self.state_uncertainty_pos),
            ("process_uncertainty", self.process_uncertainty),
            ("dt", self.dt),
        ];
        for (name, value) in named {
            if !(value.is_finite() && value > 0.0) {
                return Err(SmootherError::invalid(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if let DegreeScale::Fixed {
            lat_miles_per_degree,
            lon_miles_per_degree,
        } = self.degree_scale
        {
            if !(lat_miles_per_degree.is_finite()
                && lat_miles_per_degree > 0.0
                && lon_miles_per_degree.is_finite()
                && lon_miles_per_degree > 0.0)
            {
                return Err(SmootherError::invalid(
                    "fixed degree scale needs positive miles per degree",
                ));
            }
        }
        Ok(())
    }

    /// Write the parameters to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Read the parameters from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    /// Write the parameters as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the parameters from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    /// Write the parameters as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    /// Read the parameters from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}
