//! Raw GPS traces and where they come from.
//!
//! This module provides:
//! - [TrackPoint], one raw sample of a recorded activity
//! - [ActivityStreams], the activity-stream document (streams keyed by type) that activity
//!   tracking services export, with `latlng`, `altitude` and `time` series
//! - CSV import/export for plain traces
//! - the [ActivityProvider] seam that maps an activity identifier to its samples, and a
//!   file-backed [DirectoryProvider] implementation
//!
//! A stream document looks like
//!
//! ```json
//! {
//!   "latlng":   {"data": [[40.0, -105.0], [40.0001, -105.0]], "series_type": "distance"},
//!   "altitude": {"data": [1600.0, 1600.4]},
//!   "time":     {"data": [0, 1]}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::extension;

/// One raw sample of a recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Seconds since the start of the activity
    #[serde(default)]
    pub time: Option<f64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        TrackPoint {
            latitude,
            longitude,
            altitude: None,
            time: None,
        }
    }
}

/// One series of an activity-stream document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl<T> Stream<T> {
    pub fn new(data: Vec<T>) -> Self {
        Stream {
            data,
            series_type: None,
            original_size: None,
            resolution: None,
        }
    }
}

/// Activity streams keyed by type. Streams other than these three are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStreams {
    pub latlng: Stream<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Stream<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Stream<f64>>,
}

impl ActivityStreams {
    /// Zip the streams into samples. Optional streams must match `latlng` in length.
    pub fn into_track_points(self) -> io::Result<Vec<TrackPoint>> {
        let n = self.latlng.data.len();
        let lengths = [
            ("altitude", self.altitude.as_ref().map(|s| s.data.len())),
            ("time", self.time.as_ref().map(|s| s.data.len())),
        ];
        for (name, len) in lengths {
            match len {
                Some(len) if len != n => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{name} stream has {len} samples, latlng has {n}"),
                    ));
                }
                _ => {}
            }
        }
        let points = self
            .latlng
            .data
            .iter()
            .enumerate()
            .map(|(i, &[latitude, longitude])| TrackPoint {
                latitude,
                longitude,
                altitude: self.altitude.as_ref().map(|s| s.data[i]),
                time: self.time.as_ref().map(|s| s.data[i]),
            })
            .collect();
        Ok(points)
    }

    /// Build a stream document from samples; optional streams are kept only if every sample
    /// has the value.
    pub fn from_track_points(points: &[TrackPoint]) -> Self {
        let altitude: Option<Vec<f64>> = points.iter().map(|p| p.altitude).collect();
        let time: Option<Vec<f64>> = points.iter().map(|p| p.time).collect();
        ActivityStreams {
            latlng: Stream::new(points.iter().map(|p| [p.latitude, p.longitude]).collect()),
            altitude: altitude.map(Stream::new),
            time: time.map(Stream::new),
        }
    }

    /// Read a stream document from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(io::BufReader::new(file)).map_err(io::Error::other)
    }

    /// Write the stream document to a JSON file.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(file, self).map_err(io::Error::other)
    }
}

/// Read a trace from an activity-stream JSON document.
pub fn read_streams_json<P: AsRef<Path>>(path: P) -> io::Result<Vec<TrackPoint>> {
    ActivityStreams::from_json(path)?.into_track_points()
}

/// Read a trace from a CSV file with a `latitude,longitude[,altitude][,time]` header.
pub fn read_track_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TrackPoint>, Box<dyn Error>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut points = Vec::new();
    for result in rdr.deserialize() {
        let point: TrackPoint = result?;
        points.push(point);
    }
    Ok(points)
}

/// Write a trace to a CSV file.
pub fn write_track_csv<P: AsRef<Path>>(path: P, points: &[TrackPoint]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for point in points {
        wtr.serialize(point)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a trace from a stream document (`.json`) or a CSV file (`.csv`).
pub fn read_track<P: AsRef<Path>>(path: P) -> Result<Vec<TrackPoint>, Box<dyn Error>> {
    let p = path.as_ref();
    match extension(p).as_deref() {
        Some("json") => Ok(read_streams_json(p)?),
        Some("csv") => read_track_csv(p),
        _ => Err(format!("unsupported trace format: {}", p.display()).into()),
    }
}

/// The (latitude, longitude) observations of a trace, in order.
pub fn observations(points: &[TrackPoint]) -> Vec<(f64, f64)> {
    points.iter().map(|p| (p.latitude, p.longitude)).collect()
}

/// Source of raw activity samples keyed by an opaque activity identifier.
pub trait ActivityProvider {
    fn fetch(&self, activity_id: &str) -> Result<Vec<TrackPoint>, Box<dyn Error>>;
}

/// Provider backed by a directory of `<activity_id>.json` stream documents or
/// `<activity_id>.csv` traces.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirectoryProvider { root: root.into() }
    }

    fn resolve(&self, activity_id: &str) -> io::Result<PathBuf> {
        let valid = !activity_id.is_empty()
            && !activity_id.contains(['/', '\\'])
            && !activity_id.contains("..");
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid activity id '{activity_id}'"),
            ));
        }
        ["json", "csv"]
            .iter()
            .map(|ext| self.root.join(format!("{activity_id}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!(
                        "activity '{activity_id}' not found in {}",
                        self.root.display()
                    ),
                )
            })
    }
}

impl ActivityProvider for DirectoryProvider {
    fn fetch(&self, activity_id: &str) -> Result<Vec<TrackPoint>, Box<dyn Error>> {
        let path = self.resolve(activity_id)?;
        log::debug!("Loading activity {} from {}", activity_id, path.display());
        read_track(path)
    }
}
