//! Trace loading, provider lookup and report writing, end to end with files on disk.
use std::fs;

use tempfile::tempdir;

use tracksmooth::report::{ReportRow, SmoothingReport};
use tracksmooth::synthetic::constant_velocity_trace;
use tracksmooth::trace::{ActivityStreams, observations, read_track, write_track_csv};
use tracksmooth::{
    ActivityProvider, DirectoryProvider, SmootherParameters, TrackPoint, smooth_trajectory,
};

fn synthetic_points(n: usize, seed: u64) -> Vec<TrackPoint> {
    let (_, noisy) = constant_velocity_trace((40.0, -105.0), (2e-5, 1e-5), n, 20.0, seed).unwrap();
    noisy
        .iter()
        .enumerate()
        .map(|(i, &(latitude, longitude))| TrackPoint {
            latitude,
            longitude,
            altitude: Some(1600.0 + 0.1 * i as f64),
            time: Some(i as f64),
        })
        .collect()
}

#[test]
fn stream_document_to_report() {
    let dir = tempdir().unwrap();
    let points = synthetic_points(80, 3);
    let streams = ActivityStreams::from_track_points(&points);
    streams.to_json(dir.path().join("1001.json")).unwrap();

    let provider = DirectoryProvider::new(dir.path());
    let fetched = provider.fetch("1001").unwrap();
    assert_eq!(fetched.len(), points.len());
    assert_eq!(fetched[10].time, Some(10.0));

    let params = SmootherParameters::default();
    let smoothed = smooth_trajectory(&observations(&fetched), &params).unwrap();
    let report = SmoothingReport::new("1001", &params, &fetched, &smoothed).unwrap();
    assert_eq!(report.summary.points, 80);
    // the raw trace zigzags around the true path, so it is longer than the smoothed one
    assert!(report.summary.smoothed_distance_miles < report.summary.raw_distance_miles);
    assert!(report.summary.mean_correction_ft > 0.0);
    assert!(report.summary.max_correction_ft >= report.summary.mean_correction_ft);

    let out = dir.path().join("reports").join("1001.csv");
    fs::create_dir_all(out.parent().unwrap()).unwrap();
    report.to_file(&out).unwrap();
    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let rows: Vec<ReportRow> = rdr.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 80);
    assert_eq!(rows[5].index, 5);
    assert_eq!(rows[5].smoothed_latitude, smoothed[5].0);
}

#[test]
fn csv_trace_is_smoothed_like_in_memory_observations() {
    let dir = tempdir().unwrap();
    let points = synthetic_points(60, 8);
    let path = dir.path().join("ride.csv");
    write_track_csv(&path, &points).unwrap();

    let loaded = read_track(&path).unwrap();
    let params = SmootherParameters::default();
    let from_file = smooth_trajectory(&observations(&loaded), &params).unwrap();
    let in_memory = smooth_trajectory(&observations(&points), &params).unwrap();
    assert_eq!(from_file, in_memory);
}

#[test]
fn provider_prefers_stream_documents_and_rejects_paths() {
    let dir = tempdir().unwrap();
    let points = synthetic_points(10, 1);
    ActivityStreams::from_track_points(&points[..4])
        .to_json(dir.path().join("7.json"))
        .unwrap();
    write_track_csv(dir.path().join("7.csv"), &points).unwrap();

    let provider = DirectoryProvider::new(dir.path());
    assert_eq!(provider.fetch("7").unwrap().len(), 4);
    assert!(provider.fetch("8").is_err());
    assert!(provider.fetch("../7").is_err());
    assert!(provider.fetch("sub/7").is_err());
}

#[test]
fn malformed_stream_document_is_an_error() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("bad.json"),
        r#"{"latlng": {"data": [[40.0, -105.0], [40.0001, -105.0]]}, "altitude": {"data": [1.0]}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("broken.json"), "{not json").unwrap();
    assert!(read_track(dir.path().join("bad.json")).is_err());
    assert!(read_track(dir.path().join("broken.json")).is_err());
    assert!(read_track(dir.path().join("absent.json")).is_err());
}
