//! `pyrunner locate`

use anyhow::Result;
use serde_json::json;

use pyrunner_exec::environment::required_directories;

use super::GlobalOptions;

pub fn cmd_locate(opts: &GlobalOptions, as_json: bool) -> Result<bool> {
    let installation = opts.installation()?;
    if as_json {
        let report = json!({
            "executable_path": installation.executable_path().to_string_lossy(),
            "install_root": installation.install_root().to_string_lossy(),
            "path_entries": required_directories(installation.install_root()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Python found at {}",
            installation.executable_path().display()
        );
    }
    Ok(true)
}
