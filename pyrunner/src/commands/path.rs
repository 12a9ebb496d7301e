//! `pyrunner setup-path`

use std::io::IsTerminal;

use anyhow::Result;
use pyrunner_exec::environment::PATH_VARIABLE;
use pyrunner_exec::{EnvironmentConfigurator, PathScope};

use super::GlobalOptions;

pub fn cmd_setup_path(opts: &GlobalOptions, scope: &str) -> Result<bool> {
    let scope: PathScope = scope.parse().map_err(anyhow::Error::msg)?;
    let installation = opts.installation()?;
    let configurator = EnvironmentConfigurator::new(installation, std::io::stdout().is_terminal());
    let ok = configurator.apply(scope);
    if !ok {
        eprintln!(
            "Failed to update {} at {} scope",
            PATH_VARIABLE,
            scope.as_str()
        );
    }
    Ok(ok)
}
