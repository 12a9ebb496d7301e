use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by discovery and process execution.
///
/// `EnvironmentConfigurator` never returns these; it reports `false` instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Python installation not found")]
    InterpreterNotFound,

    #[error("Interpreter path does not exist: {}", .0.display())]
    InterpreterMissing(PathBuf),

    #[error("Unknown run mode: {0} (expected \"block\" or \"stream\")")]
    UnknownRunMode(String),

    #[error("Build {current} is out of date (minimum accepted: {required})")]
    OutOfDate { current: String, required: String },

    #[error("A run is already in progress on this runner")]
    RunInProgress,

    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read child {stream}: {source}")]
    StreamRead {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for child process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Cannot resolve working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
}
