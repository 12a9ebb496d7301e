//! pyrunner-exec: locate an installed Python interpreter, put it on `PATH`
//! and run commands against it.
//!
//! - `locator`: configuration-store search for `ExecutablePath` entries
//! - `environment`: `PATH` augmentation at process, user or machine scope
//! - `runner`: blocking or streaming execution with captured output
//! - `gate`: build version check performed before discovery

pub mod environment;
pub mod error;
pub mod gate;
pub mod installation;
pub mod locator;
pub mod log;
pub mod runner;

pub use environment::{
    EnvironmentConfigurator, MemoryPathVariables, PathScope, PathVariableStore,
    SystemPathVariables,
};
pub use error::{Error, Result};
pub use gate::{AlwaysCurrent, MinimumVersionGate, VersionGate, BUILD_VERSION};
pub use installation::InterpreterInstallation;
pub use locator::{resolve_interpreter, InterpreterLocator};
pub use runner::{
    CallbackObserver, CancelToken, ProcessRunner, RunConfiguration, RunEvent, RunHandle, RunMode,
    RunObserver, RunResult, Termination,
};
