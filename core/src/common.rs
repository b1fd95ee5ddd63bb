//! Shared utilities for the command-line tool: logger setup and input/output path handling.

use std::error::Error;
use std::path::{Path, PathBuf};

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn is_trace_file(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("json") | Some("csv")
        )
}

/// Get all trace files from a path (either a single file or every `.json`/`.csv` file in a
/// directory), sorted.
pub fn get_trace_files(input: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if input.is_file() {
        if !is_trace_file(input) {
            return Err(format!(
                "Input file '{}' is not a .json or .csv trace.",
                input.display()
            )
            .into());
        }
        Ok(vec![input.to_path_buf()])
    } else if input.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_trace_file(path))
            .collect();
        if files.is_empty() {
            return Err(format!("No trace files found in directory '{}'.", input.display()).into());
        }
        files.sort();
        Ok(files)
    } else {
        Err(format!("Input path '{}' does not exist.", input.display()).into())
    }
}

/// Create the parent directory of an output file if it is missing.
pub fn ensure_parent_dir(output: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn trace_files_in_directory_are_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["b.csv", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = get_trace_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.csv"]);
    }

    #[test]
    fn single_file_and_errors() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("one.csv");
        std::fs::write(&csv, "").unwrap();
        assert_eq!(get_trace_files(&csv).unwrap(), vec![csv]);

        let txt = dir.path().join("one.txt");
        std::fs::write(&txt, "").unwrap();
        assert!(get_trace_files(&txt).is_err());
        assert!(get_trace_files(&dir.path().join("missing")).is_err());

        let empty = dir.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        assert!(get_trace_files(&empty).is_err());
    }

    #[test]
    fn parent_dir_is_created() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("deeper").join("out.csv");
        ensure_parent_dir(&out).unwrap();
        assert!(out.parent().unwrap().is_dir());
        ensure_parent_dir(Path::new("relative.csv")).unwrap();
    }
}
