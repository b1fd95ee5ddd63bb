//! Paired raw and smoothed output of a smoothing run.
//!
//! A [SmoothingReport] joins every raw sample with its smoothed position and carries a small
//! summary: the length of the raw and smoothed paths, how far the smoother moved the fixes, and,
//! for timestamped traces, the elapsed time and average speed along the smoothed path.
//! Reports are written as CSV (rows only) or JSON (everything).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::path::Path;

use crate::SmootherError;
use crate::config::{SmootherParameters, extension};
use crate::earth::{
    haversine_distance, meters_per_second_to_mph, meters_to_feet, meters_to_miles, path_length,
    seconds_to_time,
};
use crate::trace::{TrackPoint, observations};

/// One sample with its smoothed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub index: usize,
    /// Seconds since the start of the activity, if the trace has timestamps
    pub time: Option<f64>,
    pub raw_latitude: f64,
    pub raw_longitude: f64,
    pub smoothed_latitude: f64,
    pub smoothed_longitude: f64,
    /// Altitude in feet, if the trace has altitudes
    pub altitude_ft: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub points: usize,
    pub raw_distance_miles: f64,
    pub smoothed_distance_miles: f64,
    /// Mean distance between a raw fix and its smoothed position
    pub mean_correction_ft: f64,
    /// Largest distance between a raw fix and its smoothed position
    pub max_correction_ft: f64,
    /// `HH:MM:SS` between the first and last sample, if both have timestamps
    #[serde(default)]
    pub elapsed_time: Option<String>,
    /// Smoothed distance over elapsed time
    #[serde(default)]
    pub average_speed_mph: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingReport {
    pub name: String,
    pub parameters: SmootherParameters,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
}

impl SmoothingReport {
    /// Pair `points` with `smoothed` positions, which must be index-aligned.
    pub fn new(
        name: impl Into<String>,
        parameters: &SmootherParameters,
        points: &[TrackPoint],
        smoothed: &[(f64, f64)],
    ) -> Result<Self, SmootherError> {
        if points.len() != smoothed.len() {
            return Err(SmootherError::invalid(format!(
                "{} raw points but {} smoothed positions",
                points.len(),
                smoothed.len()
            )));
        }
        let rows: Vec<ReportRow> = points
            .iter()
            .zip(smoothed)
            .enumerate()
            .map(|(index, (p, &(lat, lon)))| ReportRow {
                index,
                time: p.time,
                raw_latitude: p.latitude,
                raw_longitude: p.longitude,
                smoothed_latitude: lat,
                smoothed_longitude: lon,
                altitude_ft: p.altitude.map(meters_to_feet),
            })
            .collect();

        let corrections: Vec<f64> = rows
            .iter()
            .map(|r| {
                meters_to_feet(haversine_distance(
                    r.raw_latitude,
                    r.raw_longitude,
                    r.smoothed_latitude,
                    r.smoothed_longitude,
                ))
            })
            .collect();
        let mean_correction_ft = if corrections.is_empty() {
            0.0
        } else {
            corrections.iter().sum::<f64>() / corrections.len() as f64
        };
        let smoothed_meters = path_length(smoothed);
        let elapsed_seconds = match (points.first(), points.last()) {
            (Some(TrackPoint { time: Some(t0), .. }), Some(TrackPoint { time: Some(t1), .. })) => {
                Some(t1 - t0).filter(|s| s.is_finite() && *s > 0.0)
            }
            _ => None,
        };
        let summary = ReportSummary {
            points: rows.len(),
            raw_distance_miles: meters_to_miles(path_length(&observations(points))),
            smoothed_distance_miles: meters_to_miles(smoothed_meters),
            mean_correction_ft,
            max_correction_ft: corrections.iter().cloned().fold(0.0, f64::max),
            elapsed_time: elapsed_seconds.map(seconds_to_time),
            average_speed_mph: elapsed_seconds.map(|s| meters_per_second_to_mph(smoothed_meters / s)),
        };

        Ok(SmoothingReport {
            name: name.into(),
            parameters: parameters.clone(),
            rows,
            summary,
        })
    }

    /// Write the rows to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut wtr = csv::Writer::from_path(path)?;
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the whole report, parameters and summary included, to a JSON file.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Write as CSV or JSON depending on the file extension.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("csv") => self.to_csv(p),
            Some("json") => self.to_json(p),
            _ => Err(format!("unsupported report format: {}", p.display()).into()),
        }
    }
}
