//! Process runner: launches the interpreter with a command line and collects
//! its stdout/stderr, either blocking until exit or streaming to observers.
//!
//! Both modes share one launch path (`launch.rs`). The only difference is who
//! waits for the child: the caller (`BlockUntilExit`) or a supervisor thread
//! (`StreamEvents`). [`RunHandle::wait`] is the completion signal either way.

mod command_line;
mod launch;
mod observer;
mod process_tree;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use pyrunner_core::config::{InterpreterConfig, RunnerConfig};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::gate::{VersionGate, BUILD_VERSION};
use crate::installation::InterpreterInstallation;
use crate::locator::{resolve_interpreter, InterpreterLocator};

pub use command_line::{script_command_line, split_command_line};
pub use observer::{CallbackObserver, RunEvent, RunObserver};

use launch::Supervisor;

/// Command line used to upgrade pip.
pub const PIP_UPGRADE_COMMAND: &str = "-m pip install --upgrade pip";
/// Tried when the upgrade fails, e.g. pip is not installed at all.
pub const ENSUREPIP_COMMAND: &str = "-m ensurepip --upgrade";

/// How a run delivers its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Caller blocks until exit; results come back as a [`RunResult`].
    #[default]
    BlockUntilExit,
    /// Lines are pushed to observers while the process runs.
    StreamEvents,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::BlockUntilExit => "block",
            RunMode::StreamEvents => "stream",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "block" | "blockuntilexit" | "wait" => Ok(RunMode::BlockUntilExit),
            "stream" | "streamevents" | "events" => Ok(RunMode::StreamEvents),
            _ => Err(Error::UnknownRunMode(s.to_string())),
        }
    }
}

/// Why a run ended before the child exited on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Cancelled,
    TimedOut,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Non-blank stdout lines, in arrival order.
    pub output_lines: Vec<String>,
    /// Non-blank stderr lines, in arrival order.
    pub error_lines: Vec<String>,
    /// `true` iff nothing was written to stderr and the run was not cut short.
    /// The exit code does not take part.
    pub succeeded: bool,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub termination: Option<Termination>,
}

/// Per-runner settings. Observers only receive events in `StreamEvents` mode.
#[derive(Clone, Default)]
pub struct RunConfiguration {
    pub mode: RunMode,
    observers: Vec<Arc<dyn RunObserver>>,
    /// Defaults to the directory of the running executable.
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl RunConfiguration {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Fails with [`Error::UnknownRunMode`] when the configured mode name is not recognised.
    pub fn from_config(cfg: &RunnerConfig) -> Result<Self> {
        Ok(Self {
            mode: cfg.run_mode.parse()?,
            observers: Vec::new(),
            working_dir: cfg.workdir.clone(),
            timeout: cfg.timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl fmt::Debug for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfiguration")
            .field("mode", &self.mode)
            .field("observers", &self.observers.len())
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Line logs of the current (or last) run plus the in-progress flag.
#[derive(Default)]
pub(crate) struct RunState {
    pub(crate) log: Mutex<RunLog>,
    running: AtomicBool,
}

#[derive(Debug, Default)]
pub(crate) struct RunLog {
    pub(crate) output: Vec<String>,
    pub(crate) error: Vec<String>,
}

/// Held for the lifetime of a run; releases the runner on drop.
pub(crate) struct RunSlot(Arc<RunState>);

impl RunSlot {
    fn acquire(state: &Arc<RunState>) -> Result<Self> {
        state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RunInProgress)?;
        if let Ok(mut log) = state.log.lock() {
            *log = RunLog::default();
        }
        Ok(Self(Arc::clone(state)))
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

/// Cancels a run from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum Completion {
    Inline(Box<Supervisor>),
    Background(JoinHandle<Result<RunResult>>),
}

/// A started run. Dropping an unwaited `BlockUntilExit` handle still waits
/// for the child; a `StreamEvents` run keeps going on its supervisor thread.
pub struct RunHandle {
    completion: Option<Completion>,
    cancel: CancelToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// `true` once a `StreamEvents` run has delivered its exit notification.
    pub fn is_finished(&self) -> bool {
        match self.completion {
            Some(Completion::Background(ref handle)) => handle.is_finished(),
            Some(Completion::Inline(_)) => false,
            None => true,
        }
    }

    /// Block until the child has exited and both streams are drained.
    pub fn wait(mut self) -> Result<RunResult> {
        match self.completion.take() {
            Some(Completion::Inline(supervisor)) => (*supervisor).supervise(),
            Some(Completion::Background(handle)) => handle.join().unwrap_or_else(|_| {
                Err(Error::Wait(std::io::Error::other("supervisor thread panicked")))
            }),
            None => Err(Error::Wait(std::io::Error::other("run already completed"))),
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if let Some(Completion::Inline(supervisor)) = self.completion.take() {
            if let Err(e) = (*supervisor).supervise() {
                tracing::warn!(error = %e, "Unwaited run failed");
            }
        }
    }
}

/// Runs the located interpreter. One run at a time per runner.
pub struct ProcessRunner {
    installation: InterpreterInstallation,
    config: RunConfiguration,
    state: Arc<RunState>,
}

impl ProcessRunner {
    pub fn new(installation: InterpreterInstallation, config: RunConfiguration) -> Self {
        Self {
            installation,
            config,
            state: Arc::new(RunState::default()),
        }
    }

    /// Gate the build, then resolve the interpreter and build a runner for it.
    pub fn discover(
        gate: &dyn VersionGate,
        locator: &InterpreterLocator,
        interpreter: &InterpreterConfig,
        config: RunConfiguration,
    ) -> Result<Self> {
        gate.check(BUILD_VERSION)?;
        let installation = resolve_interpreter(interpreter, locator)?;
        tracing::debug!(
            path = %installation.executable_path().display(),
            mode = %config.mode,
            "Runner ready"
        );
        Ok(Self::new(installation, config))
    }

    pub fn installation(&self) -> &InterpreterInstallation {
        &self.installation
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    pub fn set_mode(&mut self, mode: RunMode) -> Result<()> {
        self.ensure_idle()?;
        self.config.mode = mode;
        Ok(())
    }

    pub fn add_observer(&mut self, observer: impl RunObserver + 'static) -> Result<()> {
        self.ensure_idle()?;
        self.config.observers.push(Arc::new(observer));
        Ok(())
    }

    pub fn set_config(&mut self, config: RunConfiguration) -> Result<()> {
        self.ensure_idle()?;
        self.config = config;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::RunInProgress);
        }
        Ok(())
    }

    /// Snapshot of the stdout log of the current or last run.
    pub fn output_lines(&self) -> Vec<String> {
        self.state
            .log
            .lock()
            .map(|log| log.output.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the stderr log of the current or last run.
    pub fn error_lines(&self) -> Vec<String> {
        self.state
            .log
            .lock()
            .map(|log| log.error.clone())
            .unwrap_or_default()
    }

    /// Launch the interpreter with `command_line` (everything after the
    /// executable). Logs from the previous run are discarded.
    pub fn start(&self, command_line: &str) -> Result<RunHandle> {
        let slot = RunSlot::acquire(&self.state)?;
        let working_dir = match self.config.working_dir {
            Some(ref dir) => dir.clone(),
            None => app_base_dir()?,
        };
        let cancel = CancelToken::default();
        let observers = match self.config.mode {
            RunMode::BlockUntilExit => Vec::new(),
            RunMode::StreamEvents => self.config.observers.clone(),
        };

        let supervisor = Supervisor::launch(launch::LaunchRequest {
            program: self.installation.executable_path(),
            command_line,
            working_dir: &working_dir,
            observers,
            cancel: Arc::clone(&cancel.0),
            timeout: self.config.timeout,
            slot,
        })?;

        let completion = match self.config.mode {
            RunMode::BlockUntilExit => Completion::Inline(Box::new(supervisor)),
            RunMode::StreamEvents => {
                Completion::Background(std::thread::spawn(move || supervisor.supervise()))
            }
        };
        Ok(RunHandle {
            completion: Some(completion),
            cancel,
        })
    }

    /// Start and wait. In `StreamEvents` mode observers still see every line.
    pub fn run(&self, command_line: &str) -> Result<RunResult> {
        self.start(command_line)?.wait()
    }

    /// Run `script` with each argument wrapped in double quotes.
    pub fn run_script<S: AsRef<str>>(&self, script: &str, args: &[S]) -> Result<RunResult> {
        self.run(&script_command_line(script, args))
    }

    /// Upgrade pip, bootstrapping it with ensurepip if the upgrade fails.
    /// Returns the success flag of the last run.
    pub fn update_package_manager(&self) -> Result<bool> {
        if self.run(PIP_UPGRADE_COMMAND)?.succeeded {
            return Ok(true);
        }
        tracing::warn!("pip upgrade failed, falling back to ensurepip");
        Ok(self.run(ENSUREPIP_COMMAND)?.succeeded)
    }

    /// `pip install -r <requirements>`. Returns the run's success flag.
    pub fn install_packages(&self, requirements: &Path) -> Result<bool> {
        Ok(self.run(&pip_install_command(requirements))?.succeeded)
    }
}

/// `-m pip install -r "<requirements>"`
pub fn pip_install_command(requirements: &Path) -> String {
    format!("-m pip install -r \"{}\"", requirements.display())
}

/// Directory of the running executable.
fn app_base_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(Error::WorkingDir)?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        Error::WorkingDir(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "executable has no parent directory",
        ))
    })
}
