mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::GlobalOptions;

fn main() -> Result<()> {
    pyrunner_core::observability::init_tracing();
    let cli = Cli::parse();
    let opts = GlobalOptions {
        python: cli.python,
        workdir: cli.workdir,
        timeout: cli.timeout,
    };

    tracing::debug!(command = ?cli.command, "Dispatching");
    let succeeded = match cli.command {
        Commands::Locate { json } => commands::locate::cmd_locate(&opts, json)?,
        Commands::Run {
            script,
            args,
            mode,
            json,
        } => commands::run::cmd_run(&opts, &script, &args, mode, json)?,
        Commands::Exec {
            command_line,
            mode,
            json,
        } => commands::run::cmd_exec(&opts, &command_line, mode, json)?,
        Commands::SetupPath { scope } => commands::path::cmd_setup_path(&opts, &scope)?,
        Commands::PipUpdate => commands::pip::cmd_pip_update(&opts)?,
        Commands::PipInstall { requirements } => {
            commands::pip::cmd_pip_install(&opts, &requirements)?
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
