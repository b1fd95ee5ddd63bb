//! TRACKSMOOTH: offline smoothing of recorded GPS activity traces.
//!
//! The tool reads raw traces (activity-stream JSON or plain CSV), runs the forward Kalman filter
//! and the backward RTS smoother over each of them, and writes paired raw/smoothed reports.
//!
//! Parameters come from the defaults, optionally replaced by a configuration file
//! (`--config`, TOML/JSON/YAML) and finally by individual command-line overrides.

mod common;

use clap::{Args, Parser, Subcommand, ValueEnum};
use common::{ensure_parent_dir, get_trace_files, init_logger};
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::{Path, PathBuf};

use tracksmooth::report::SmoothingReport;
use tracksmooth::synthetic::{constant_velocity_trace, rmse};
use tracksmooth::trace::{observations, read_track, write_track_csv};
use tracksmooth::{
    ActivityProvider, DegreeScale, DirectoryProvider, SmootherParameters, TrackPoint,
    smooth_trajectory,
};

const LONG_ABOUT: &str = "TRACKSMOOTH: offline smoothing of recorded GPS activity traces.

Each trace is smoothed with a constant-velocity Kalman filter (forward pass) followed by a
Rauch-Tung-Striebel smoother (backward pass). Traces are read from activity-stream JSON
documents or CSV files with a latitude,longitude[,altitude][,time] header.

Tuning parameters are given in feet and feet per second. They default to sensible values for
running and cycling and can be loaded from a configuration file (TOML/JSON/YAML) or overridden
individually on the command line.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Offline smoothing of recorded GPS activity traces.", long_about = LONG_ABOUT)]
struct Cli {
    /// Smoother parameters file (TOML/JSON/YAML); command-line overrides still apply
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Smooth traces in parallel when processing a directory
    #[arg(long, global = true)]
    parallel: bool,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        about = "Smooth a trace file or every trace in a directory",
        long_about = "Smooth a trace file or every .json/.csv trace in a directory. For a single input file the output is a report file whose format (.csv or .json) follows its extension. For a directory the output is a separate directory receiving one <name>.csv report per input trace; traces sharing a name (ride.json and ride.csv) are reported as <name>.<ext>.csv."
    )]
    Smooth(SmoothArgs),
    #[command(
        about = "Smooth one activity from a data directory by its identifier",
        long_about = "Look up <activity-id>.json or <activity-id>.csv in the data directory, smooth it and write the report."
    )]
    Fetch(FetchArgs),
    #[command(about = "Write a synthetic noisy constant-velocity trace to CSV")]
    Simulate(SimulateArgs),
    #[command(about = "Write the smoother parameters (defaults plus overrides) to a configuration file")]
    Config(ConfigArgs),
}

/// Individual smoother parameter overrides
#[derive(Args, Clone, Debug, Default)]
struct ParameterArgs {
    /// Initial positional uncertainty (feet)
    #[arg(long)]
    uncertainty_pos: Option<f64>,

    /// Initial velocity uncertainty, the maximum plausible speed (feet per second)
    #[arg(long)]
    uncertainty_velo: Option<f64>,

    /// Measurement uncertainty of each GPS fix (feet)
    #[arg(long)]
    state_uncertainty: Option<f64>,

    /// Process noise variance
    #[arg(long)]
    process_uncertainty: Option<f64>,

    /// Time between observations
    #[arg(long)]
    dt: Option<f64>,

    /// Degree-length scaling: fixed 69/53 miles per degree, or from the WGS84 ellipsoid
    #[arg(long, value_enum)]
    degree_scale: Option<DegreeScaleArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum DegreeScaleArg {
    Fixed,
    Ellipsoidal,
}

impl From<DegreeScaleArg> for DegreeScale {
    fn from(arg: DegreeScaleArg) -> Self {
        match arg {
            DegreeScaleArg::Fixed => DegreeScale::default(),
            DegreeScaleArg::Ellipsoidal => DegreeScale::Ellipsoidal,
        }
    }
}

impl ParameterArgs {
    fn apply(&self, mut params: SmootherParameters) -> SmootherParameters {
        if let Some(v) = self.uncertainty_pos {
            params.uncertainty_pos = v;
        }
        if let Some(v) = self.uncertainty_velo {
            params.uncertainty_velo = v;
        }
        if let Some(v) = self.state_uncertainty {
            params.state_uncertainty_pos = v;
        }
        if let Some(v) = self.process_uncertainty {
            params.process_uncertainty = v;
        }
        if let Some(v) = self.dt {
            params.dt = v;
        }
        if let Some(scale) = self.degree_scale {
            params.degree_scale = scale.into();
        }
        params
    }
}

#[derive(Args, Clone, Debug)]
struct SmoothArgs {
    /// Input trace file or directory of trace files
    #[arg(short, long, value_parser)]
    input: PathBuf,

    /// Output report file, or output directory when the input is a directory
    #[arg(short, long, value_parser)]
    output: PathBuf,

    #[command(flatten)]
    parameters: ParameterArgs,
}

#[derive(Args, Clone, Debug)]
struct FetchArgs {
    /// Directory holding <activity-id>.json or <activity-id>.csv files
    #[arg(long)]
    data_dir: PathBuf,

    /// Activity identifier
    #[arg(long)]
    activity_id: String,

    /// Output report file (.csv or .json)
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    parameters: ParameterArgs,
}

#[derive(Args, Clone, Debug)]
struct SimulateArgs {
    /// Output CSV file
    #[arg(short, long)]
    output: PathBuf,

    /// Number of points
    #[arg(long, default_value_t = 300)]
    points: usize,

    /// Standard deviation of the GPS noise (feet)
    #[arg(long, default_value_t = 30.0)]
    noise_ft: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting latitude (degrees)
    #[arg(long, default_value_t = 40.0)]
    start_lat: f64,

    /// Starting longitude (degrees)
    #[arg(long, default_value_t = -105.0)]
    start_lon: f64,

    /// Latitude change per step (degrees)
    #[arg(long, default_value_t = 3e-5)]
    lat_rate: f64,

    /// Longitude change per step (degrees)
    #[arg(long, default_value_t = 2e-5)]
    lon_rate: f64,

    #[command(flatten)]
    parameters: ParameterArgs,
}

#[derive(Args, Clone, Debug)]
struct ConfigArgs {
    /// Output configuration file (.toml, .json, .yaml or .yml)
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    parameters: ParameterArgs,
}

/// Defaults, then the configuration file, then command-line overrides.
fn resolve_parameters(
    config: Option<&PathBuf>,
    overrides: &ParameterArgs,
) -> Result<SmootherParameters, Box<dyn Error>> {
    let base = match config {
        Some(path) => {
            info!("Loading smoother parameters from {}", path.display());
            SmootherParameters::from_file(path)?
        }
        None => SmootherParameters::default(),
    };
    let params = overrides.apply(base);
    params.validate()?;
    Ok(params)
}

fn report_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("trace")
        .to_string()
}

/// Smooth one set of samples and write its report. Nothing is written if smoothing fails.
fn smooth_points(
    name: &str,
    points: &[TrackPoint],
    output: &Path,
    params: &SmootherParameters,
) -> Result<(), Box<dyn Error>> {
    let smoothed = smooth_trajectory(&observations(points), params)?;
    let report = SmoothingReport::new(name, params, points, &smoothed)?;
    ensure_parent_dir(output)?;
    report.to_file(output)?;
    info!(
        "{}: {} points, {:.3} mi raw, {:.3} mi smoothed, mean correction {:.1} ft -> {}",
        name,
        report.summary.points,
        report.summary.raw_distance_miles,
        report.summary.smoothed_distance_miles,
        report.summary.mean_correction_ft,
        output.display()
    );
    if let (Some(elapsed), Some(speed)) = (
        &report.summary.elapsed_time,
        report.summary.average_speed_mph,
    ) {
        info!("{}: elapsed {}, average {:.2} mph", name, elapsed, speed);
    }
    Ok(())
}

fn process_file(
    input: &Path,
    output: &Path,
    params: &SmootherParameters,
) -> Result<(), Box<dyn Error>> {
    let points = read_track(input)?;
    smooth_points(&report_name(input), &points, output, params)
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Pair every input trace with its report path inside `output_dir`.
///
/// Reports are named `<stem>.csv`. Traces sharing a stem (`ride.json` and `ride.csv`) get
/// `<stem>.<ext>.csv` instead. Any remaining collision is an error.
fn plan_outputs(
    files: &[PathBuf],
    output_dir: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>, Box<dyn Error>> {
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for input in files {
        *stem_counts.entry(report_name(input)).or_insert(0) += 1;
    }
    let mut seen = HashSet::new();
    let mut plan = Vec::with_capacity(files.len());
    for input in files {
        let stem = report_name(input);
        let name = if stem_counts[&stem] > 1 {
            let ext = input.extension().and_then(|s| s.to_str()).unwrap_or("trace");
            format!("{stem}.{ext}.csv")
        } else {
            format!("{stem}.csv")
        };
        if !seen.insert(name.clone()) {
            return Err(format!(
                "more than one input trace would be reported as '{}'",
                output_dir.join(&name).display()
            )
            .into());
        }
        plan.push((input.clone(), output_dir.join(name)));
    }
    Ok(plan)
}

fn run_smooth(
    args: &SmoothArgs,
    config: Option<&PathBuf>,
    parallel: bool,
) -> Result<(), Box<dyn Error>> {
    let params = resolve_parameters(config, &args.parameters)?;
    let files = get_trace_files(&args.input)?;

    if args.input.is_file() {
        if same_location(&args.input, &args.output) {
            return Err(format!(
                "Output '{}' would overwrite the input trace.",
                args.output.display()
            )
            .into());
        }
        return process_file(&args.input, &args.output, &params);
    }

    if same_location(&args.input, &args.output) {
        return Err(format!(
            "Output directory '{}' is the input directory; reports would overwrite the traces.",
            args.output.display()
        )
        .into());
    }
    let plan = plan_outputs(&files, &args.output)?;
    std::fs::create_dir_all(&args.output)?;
    info!("Processing {} trace files from {}", files.len(), args.input.display());

    let failures: Vec<(PathBuf, String)> = if parallel {
        info!("Running in parallel mode");
        plan.par_iter()
            .filter_map(|(input, output)| {
                process_file(input, output, &params)
                    .err()
                    .map(|e| (input.clone(), e.to_string()))
            })
            .collect()
    } else {
        plan.iter()
            .filter_map(|(input, output)| {
                process_file(input, output, &params)
                    .err()
                    .map(|e| (input.clone(), e.to_string()))
            })
            .collect()
    };

    if !failures.is_empty() {
        for (file, err) in &failures {
            error!("  {}: {}", file.display(), err);
        }
        return Err(format!("{} file(s) failed to process", failures.len()).into());
    }
    Ok(())
}

fn run_fetch(args: &FetchArgs, config: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    let params = resolve_parameters(config, &args.parameters)?;
    let provider = DirectoryProvider::new(&args.data_dir);
    let points = provider.fetch(&args.activity_id)?;
    smooth_points(&args.activity_id, &points, &args.output, &params)
}

fn run_simulate(args: &SimulateArgs, config: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    let (truth, noisy) = constant_velocity_trace(
        (args.start_lat, args.start_lon),
        (args.lat_rate, args.lon_rate),
        args.points,
        args.noise_ft,
        args.seed,
    )?;
    let points: Vec<TrackPoint> = noisy
        .iter()
        .enumerate()
        .map(|(i, &(latitude, longitude))| TrackPoint {
            latitude,
            longitude,
            altitude: None,
            time: Some(i as f64),
        })
        .collect();
    ensure_parent_dir(&args.output)?;
    write_track_csv(&args.output, &points)?;
    info!(
        "Wrote {} synthetic points to {}",
        points.len(),
        args.output.display()
    );

    // Report how much a run with the current parameters would help
    let params = resolve_parameters(config, &args.parameters)?;
    match smooth_trajectory(&noisy, &params) {
        Ok(smoothed) => info!(
            "RMSE against truth: raw {:.3e} deg, smoothed {:.3e} deg",
            rmse(&noisy, &truth),
            rmse(&smoothed, &truth)
        ),
        Err(e) => warn!("Synthetic trace could not be smoothed: {}", e),
    }
    Ok(())
}

fn run_config(args: &ConfigArgs, config: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    let params = resolve_parameters(config, &args.parameters)?;
    ensure_parent_dir(&args.output)?;
    params.to_file(&args.output)?;
    info!("Wrote smoother parameters to {}", args.output.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logger(&cli.log_level, cli.log_file.as_ref()) {
        eprintln!("Failed to initialize logger: {}", e);
        std::process::exit(1);
    }

    let config = cli.config.as_ref();
    let result = match &cli.command {
        Command::Smooth(args) => {
            info!("Smoothing {}", args.input.display());
            run_smooth(args, config, cli.parallel)
        }
        Command::Fetch(args) => run_fetch(args, config),
        Command::Simulate(args) => run_simulate(args, config),
        Command::Config(args) => run_config(args, config),
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracksmooth::trace::ActivityStreams;

    #[test]
    fn cli_parses_smooth_with_overrides() {
        let cli = Cli::parse_from([
            "tracksmooth",
            "--log-level",
            "debug",
            "smooth",
            "-i",
            "in.json",
            "-o",
            "out.csv",
            "--state-uncertainty",
            "10",
            "--degree-scale",
            "ellipsoidal",
            "--parallel",
        ]);
        assert_eq!(cli.log_level, "debug");
        assert!(cli.parallel);
        match cli.command {
            Command::Smooth(args) => {
                assert_eq!(args.input, PathBuf::from("in.json"));
                assert_eq!(args.parameters.state_uncertainty, Some(10.0));
                assert_eq!(args.parameters.degree_scale, Some(DegreeScaleArg::Ellipsoidal));
                let params = args.parameters.apply(SmootherParameters::default());
                assert_eq!(params.state_uncertainty_pos, 10.0);
                assert_eq!(params.degree_scale, DegreeScale::Ellipsoidal);
                assert_eq!(params.uncertainty_pos, 30.0);
            }
            _ => panic!("expected smooth"),
        }
    }

    #[test]
    fn overrides_win_over_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(&path, "uncertainty_pos = 12.0\ndt = 2.0\n").unwrap();
        let overrides = ParameterArgs {
            dt: Some(0.5),
            ..Default::default()
        };
        let params = resolve_parameters(Some(&path), &overrides).unwrap();
        assert_eq!(params.uncertainty_pos, 12.0);
        assert_eq!(params.dt, 0.5);

        let bad = ParameterArgs {
            process_uncertainty: Some(0.0),
            ..Default::default()
        };
        assert!(resolve_parameters(None, &bad).is_err());
    }

    #[test]
    fn smooth_directory_writes_one_report_per_trace() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let (_, noisy) = constant_velocity_trace((40.0, -105.0), (1e-5, 1e-5), 60, 15.0, 3).unwrap();
        let points: Vec<TrackPoint> = noisy.iter().map(|&(a, b)| TrackPoint::new(a, b)).collect();
        write_track_csv(input.path().join("one.csv"), &points).unwrap();
        write_track_csv(input.path().join("two.csv"), &points).unwrap();
        let args = SmoothArgs {
            input: input.path().to_path_buf(),
            output: output.path().join("reports"),
            parameters: ParameterArgs::default(),
        };
        run_smooth(&args, None, true).unwrap();
        assert!(output.path().join("reports").join("one.csv").is_file());
        assert!(output.path().join("reports").join("two.csv").is_file());
    }

    #[test]
    fn fixed_scale_overrides_ellipsoidal_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"degree_scale": {"model": "ellipsoidal"}}"#).unwrap();
        let params = resolve_parameters(Some(&path), &ParameterArgs::default()).unwrap();
        assert_eq!(params.degree_scale, DegreeScale::Ellipsoidal);

        let cli = Cli::parse_from(["tracksmooth", "config", "-o", "out.toml", "--degree-scale", "fixed"]);
        match cli.command {
            Command::Config(args) => {
                let params = resolve_parameters(Some(&path), &args.parameters).unwrap();
                assert_eq!(params.degree_scale, DegreeScale::default());
            }
            _ => panic!("expected config"),
        }
    }

    fn write_synthetic(path: &Path, n: usize) {
        let (_, noisy) = constant_velocity_trace((40.0, -105.0), (1e-5, 1e-5), n, 15.0, 3).unwrap();
        let points: Vec<TrackPoint> = noisy.iter().map(|&(a, b)| TrackPoint::new(a, b)).collect();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            ActivityStreams::from_track_points(&points).to_json(path).unwrap();
        } else {
            write_track_csv(path, &points).unwrap();
        }
    }

    #[test]
    fn output_directory_must_differ_from_input() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("ride.csv");
        write_synthetic(&trace, 30);
        let before = std::fs::read_to_string(&trace).unwrap();
        let args = SmoothArgs {
            input: dir.path().to_path_buf(),
            output: dir.path().join("."),
            parameters: ParameterArgs::default(),
        };
        assert!(run_smooth(&args, None, false).is_err());
        assert_eq!(std::fs::read_to_string(&trace).unwrap(), before);

        let single = SmoothArgs {
            input: trace.clone(),
            output: trace.clone(),
            parameters: ParameterArgs::default(),
        };
        assert!(run_smooth(&single, None, false).is_err());
        assert_eq!(std::fs::read_to_string(&trace).unwrap(), before);
    }

    #[test]
    fn traces_sharing_a_name_get_separate_reports() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_synthetic(&input.path().join("ride.csv"), 30);
        write_synthetic(&input.path().join("ride.json"), 50);
        write_synthetic(&input.path().join("walk.csv"), 20);
        let args = SmoothArgs {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
            parameters: ParameterArgs::default(),
        };
        run_smooth(&args, None, true).unwrap();

        let rows = |name: &str| {
            let mut rdr = csv::Reader::from_path(output.path().join(name)).unwrap();
            rdr.records().count()
        };
        assert_eq!(rows("ride.csv.csv"), 30);
        assert_eq!(rows("ride.json.csv"), 50);
        assert_eq!(rows("walk.csv"), 20);
        assert!(!output.path().join("ride.csv").exists());
    }

    #[test]
    fn failed_trace_writes_no_report() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_track_csv(input.path().join("short.csv"), &[TrackPoint::new(40.0, -105.0)]).unwrap();
        let args = SmoothArgs {
            input: input.path().join("short.csv"),
            output: output.path().join("short.json"),
            parameters: ParameterArgs::default(),
        };
        assert!(run_smooth(&args, None, false).is_err());
        assert!(!output.path().join("short.json").exists());
    }
}
