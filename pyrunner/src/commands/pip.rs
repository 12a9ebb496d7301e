//! `pyrunner pip-update` / `pyrunner pip-install`

use std::path::Path;

use anyhow::Result;

use super::run::report;
use super::GlobalOptions;

pub fn cmd_pip_update(opts: &GlobalOptions) -> Result<bool> {
    let runner = opts.runner(None)?;
    let ok = runner.update_package_manager()?;
    report(&runner.output_lines(), &runner.error_lines());
    Ok(ok)
}

pub fn cmd_pip_install(opts: &GlobalOptions, requirements: &Path) -> Result<bool> {
    if !requirements.is_file() {
        anyhow::bail!("Requirements file not found: {}", requirements.display());
    }
    // pip resolves the file against the child's working directory.
    let requirements = std::path::absolute(requirements)?;
    let runner = opts.runner(None)?;
    let ok = runner.install_packages(&requirements)?;
    report(&runner.output_lines(), &runner.error_lines());
    Ok(ok)
}
