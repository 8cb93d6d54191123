//! Timestamped, severity-filtered file logging.
//!
//! Produces the line format `elapsed_ms:LEVEL:message`, where `elapsed_ms`
//! is measured from when the `Logger` was constructed, not from process
//! start.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to open log file {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log line: {0}")]
    WriteFailed(#[from] io::Error),
}

/// Severity of a single log line, ordered `Debug < Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A flush-per-line file logger with a severity floor.
///
/// Elapsed time in each line is measured from construction, matching the
/// behavior of the original C++ logger this type is based on.
pub struct Logger {
    file: File,
    min_level: LogLevel,
    start_time: Instant,
}

impl Logger {
    pub fn new<P: AsRef<Path>>(path: P, min_level: LogLevel) -> Result<Self, LoggerError> {
        let path_ref = path.as_ref();
        let file = File::create(path_ref).map_err(|source| LoggerError::OpenFailed {
            path: path_ref.display().to_string(),
            source,
        })?;
        Ok(Self {
            file,
            min_level,
            start_time: Instant::now(),
        })
    }

    /// Wrap an already-open file, e.g. one handed to us by the process
    /// launcher rather than opened from a path.
    pub fn from_file(file: File, min_level: LogLevel) -> Self {
        Self {
            file,
            min_level,
            start_time: Instant::now(),
        }
    }

    pub fn log(&mut self, level: LogLevel, message: impl AsRef<str>) -> Result<(), LoggerError> {
        if level < self.min_level {
            return Ok(());
        }

        let elapsed_ms = self.start_time.elapsed().as_millis();
        writeln!(self.file, "{}:{}:{}", elapsed_ms, level, message.as_ref())?;
        self.file.flush()?;
        Ok(())
    }

    pub fn debug(&mut self, message: impl AsRef<str>) -> Result<(), LoggerError> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&mut self, message: impl AsRef<str>) -> Result<(), LoggerError> {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&mut self, message: impl AsRef<str>) -> Result<(), LoggerError> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&mut self, message: impl AsRef<str>) -> Result<(), LoggerError> {
        self.log(LogLevel::Error, message)
    }

    pub fn critical(&mut self, message: impl AsRef<str>) -> Result<(), LoggerError> {
        self.log(LogLevel::Critical, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn filters_below_min_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        let mut logger = Logger::new(&path, LogLevel::Warning).unwrap();

        logger.debug("should not appear").unwrap();
        logger.info("should not appear either").unwrap();
        logger.warning("visible").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(":WARNING:visible"));
    }

    #[test]
    fn formats_elapsed_level_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        let mut logger = Logger::new(&path, LogLevel::Debug).unwrap();

        sleep(Duration::from_millis(5));
        logger.critical("term changed").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().unwrap();
        let mut parts = line.splitn(3, ':');
        let elapsed: u64 = parts.next().unwrap().parse().unwrap();
        assert_eq!(parts.next().unwrap(), "CRITICAL");
        assert_eq!(parts.next().unwrap(), "term changed");
        assert!(elapsed >= 5);
    }

    #[test]
    fn rejects_unopenable_path() {
        let err = Logger::new("/nonexistent/dir/x.log", LogLevel::Info).unwrap_err();
        assert!(matches!(err, LoggerError::OpenFailed { .. }));
    }
}
