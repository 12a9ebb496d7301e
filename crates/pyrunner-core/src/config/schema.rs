//! Configuration structs grouped by concern, loaded from the environment.

use super::env_keys::{gate, interpreter, observability as obv_keys, runner};
use super::loader::{env_bool, env_optional, env_or, load_dotenv};
use std::path::PathBuf;

/// Where to look for the interpreter.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Explicit interpreter path; discovery is skipped when set.
    pub python: Option<PathBuf>,
    /// Fall back to a `PATH` lookup when the configuration store has nothing.
    pub path_fallback: bool,
}

impl InterpreterConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            python: env_optional(interpreter::PYRUNNER_PYTHON, interpreter::PYTHON_ALIASES)
                .map(PathBuf::from),
            path_fallback: env_bool(interpreter::PYRUNNER_PATH_FALLBACK, &[], true),
        }
    }
}

/// Child process settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Raw run mode name; parsed (and rejected if unknown) by the runner.
    pub run_mode: String,
    pub timeout_secs: Option<u64>,
    pub workdir: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            run_mode: env_or(runner::PYRUNNER_RUN_MODE, &[], || "block".to_string()),
            timeout_secs: env_optional(runner::PYRUNNER_TIMEOUT_SECS, &[])
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0),
            workdir: env_optional(runner::PYRUNNER_WORKDIR, &[]).map(PathBuf::from),
        }
    }

    /// Apply CLI values on top of the environment.
    pub fn with_cli_overrides(
        mut self,
        run_mode: Option<String>,
        timeout_secs: Option<u64>,
        workdir: Option<PathBuf>,
    ) -> Self {
        if let Some(mode) = run_mode {
            self.run_mode = mode;
        }
        if let Some(timeout) = timeout_secs {
            self.timeout_secs = Some(timeout).filter(|secs| *secs > 0);
        }
        if let Some(dir) = workdir {
            self.workdir = Some(dir);
        }
        self
    }
}

/// Build version gate settings.
#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub min_version: Option<String>,
}

impl GateConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            min_version: env_optional(gate::PYRUNNER_MIN_VERSION, &[]),
        }
    }
}

/// quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::PYRUNNER_QUIET, &[], false),
                log_level: env_or(obv_keys::PYRUNNER_LOG_LEVEL, &[], || {
                    "pyrunner=info".to_string()
                }),
                log_json: env_bool(obv_keys::PYRUNNER_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::PYRUNNER_AUDIT_LOG, &[]),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_config_cli_overrides() {
        let cfg = RunnerConfig {
            run_mode: "block".to_string(),
            timeout_secs: None,
            workdir: None,
        }
        .with_cli_overrides(Some("stream".into()), Some(0), Some(PathBuf::from("/tmp")));
        assert_eq!(cfg.run_mode, "stream");
        assert_eq!(cfg.timeout_secs, None);
        assert_eq!(cfg.workdir, Some(PathBuf::from("/tmp")));
    }
}
