//! Observability: tracing init and the JSONL audit log.
//!
//! Uses config::ObservabilityConfig for PYRUNNER_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
/// When PYRUNNER_QUIET=1 only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "pyrunner=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// True when PYRUNNER_QUIET is set; info-level chatter is suppressed.
pub fn is_quiet() -> bool {
    ObservabilityConfig::from_env().quiet
}

/// Route audit records to `path` for the rest of the process.
pub fn set_audit_path(path: impl Into<String>) {
    if let Ok(mut guard) = AUDIT_PATH.lock() {
        *guard = Some(path.into());
    }
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: command_invoked
pub fn audit_command_invoked(interpreter: &str, command_line: &str, cwd: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "command_invoked",
            "interpreter": interpreter,
            "command_line": command_line,
            "cwd": cwd,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: execution_completed
pub fn audit_execution_completed(
    command_line: &str,
    exit_code: Option<i32>,
    duration_ms: u64,
    output_lines: usize,
    error_lines: usize,
    succeeded: bool,
) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_completed",
            "command_line": command_line,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "output_lines": output_lines,
            "error_lines": error_lines,
            "succeeded": succeeded,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: path_updated
pub fn audit_path_updated(scope: &str, variable: &str, added: &[String]) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "path_updated",
            "scope": scope,
            "variable": variable,
            "added": added,
        });
        append_jsonl(&path, &record);
    }
}
