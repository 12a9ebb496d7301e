//! Environment variable key constants.

/// Interpreter discovery
pub mod interpreter {
    /// Explicit interpreter path; skips configuration store discovery.
    pub const PYRUNNER_PYTHON: &str = "PYRUNNER_PYTHON";
    pub const PYTHON_ALIASES: &[&str] = &["PYTHON_EXECUTABLE"];

    /// Search `PATH` when the configuration store has no installation.
    pub const PYRUNNER_PATH_FALLBACK: &str = "PYRUNNER_PATH_FALLBACK";
}

/// Child process execution
pub mod runner {
    /// "block" or "stream"
    pub const PYRUNNER_RUN_MODE: &str = "PYRUNNER_RUN_MODE";
    pub const PYRUNNER_TIMEOUT_SECS: &str = "PYRUNNER_TIMEOUT_SECS";
    pub const PYRUNNER_WORKDIR: &str = "PYRUNNER_WORKDIR";
}

/// Build version gate
pub mod gate {
    pub const PYRUNNER_MIN_VERSION: &str = "PYRUNNER_MIN_VERSION";
}

/// Observability and logging
pub mod observability {
    pub const PYRUNNER_QUIET: &str = "PYRUNNER_QUIET";
    pub const PYRUNNER_LOG_LEVEL: &str = "PYRUNNER_LOG_LEVEL";
    pub const PYRUNNER_LOG_JSON: &str = "PYRUNNER_LOG_JSON";
    pub const PYRUNNER_AUDIT_LOG: &str = "PYRUNNER_AUDIT_LOG";
}
