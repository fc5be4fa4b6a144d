//! Logging setup for dropload.
//!
//! Logs go to stderr and to the configured log file. Stdout belongs to the
//! console reporter, so `dropload upload` prints nothing there but its
//! status line.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{DroploadError, Result};

/// Map a configured level name to a tracing level. Unknown names mean `info`.
fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Create the log file, and its directory when the path has one.
///
/// A bare file name has an empty parent and is created in the working
/// directory.
fn open_log_file(path: &Path) -> Result<Arc<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(Arc::new(File::create(path)?))
}

/// Install the global subscriber described by `config`.
///
/// Fails when the log file cannot be created or a subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_file = open_log_file(Path::new(&config.file))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr.and(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter_for(&config.level))
        .try_init()
        .map_err(|e| DroploadError::Config(format!("logging: {e}")))
}

/// Install stderr-only logging. Does nothing if a subscriber is already set.
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true),
        )
        .with(filter_for(level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("INFO"), Level::INFO);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_warning_alias() {
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level(" WARNING "), Level::WARN);
    }

    #[test]
    fn test_parse_level_unknown_is_info() {
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_open_log_file_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/dropload.log");

        open_log_file(&path).unwrap();

        assert!(path.is_file());
    }

    #[test]
    fn test_open_log_file_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let result = open_log_file(Path::new("dropload.log"));
        let created = dir.path().join("dropload.log").is_file();
        std::env::set_current_dir(previous).unwrap();

        result.unwrap();
        assert!(created);
    }

    #[test]
    fn test_open_log_file_in_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let result = open_log_file(&blocker.join("dropload.log"));

        assert!(matches!(result, Err(DroploadError::Io(_))));
    }
}
