//! Subcommand implementations. Each returns `Ok(true)` when the operation
//! succeeded and `Ok(false)` when it ran but failed (exit status 1).

pub mod locate;
pub mod path;
pub mod pip;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use pyrunner_core::config::{GateConfig, InterpreterConfig, RunnerConfig};
use pyrunner_exec::{
    resolve_interpreter, InterpreterInstallation, InterpreterLocator, MinimumVersionGate,
    ProcessRunner, RunConfiguration, VersionGate, BUILD_VERSION,
};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub python: Option<PathBuf>,
    pub workdir: Option<PathBuf>,
    pub timeout: Option<u64>,
}

impl GlobalOptions {
    fn interpreter_config(&self) -> InterpreterConfig {
        let mut cfg = InterpreterConfig::from_env();
        if let Some(ref python) = self.python {
            cfg.python = Some(python.clone());
        }
        cfg
    }

    fn gate(&self) -> MinimumVersionGate {
        MinimumVersionGate::from_config(&GateConfig::from_env())
    }

    /// Version gate, then explicit path, configuration store, `PATH`.
    pub fn installation(&self) -> Result<InterpreterInstallation> {
        self.gate().check(BUILD_VERSION)?;
        let installation =
            resolve_interpreter(&self.interpreter_config(), &InterpreterLocator::system())
                .context("Cannot find a Python interpreter")?;
        Ok(installation)
    }

    /// Runner configured from the environment plus CLI overrides.
    pub fn runner(&self, mode: Option<String>) -> Result<ProcessRunner> {
        let runner_cfg = RunnerConfig::from_env().with_cli_overrides(
            mode,
            self.timeout,
            self.workdir.clone(),
        );
        let config = RunConfiguration::from_config(&runner_cfg)?;
        let runner = ProcessRunner::discover(
            &self.gate(),
            &InterpreterLocator::system(),
            &self.interpreter_config(),
            config,
        )
        .context("Cannot prepare the Python runner")?;
        Ok(runner)
    }
}
