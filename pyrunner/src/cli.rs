use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pyrunner - locate the installed Python and run scripts with it
#[derive(Parser, Debug)]
#[command(name = "pyrunner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Interpreter to use instead of searching for one
    #[arg(long, global = true, env = "PYRUNNER_PYTHON", value_name = "PATH")]
    pub python: Option<PathBuf>,

    /// Working directory for the interpreter (default: from env or the pyrunner binary's directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Kill the interpreter after this many seconds (default: from env or no limit)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show where the Python interpreter was found
    Locate {
        /// Print the result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run a Python script; arguments are passed through quoted
    Run {
        /// Script path, relative to the working directory
        #[arg(value_name = "SCRIPT")]
        script: String,

        /// Script arguments
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// block | stream (default: from env or block)
        #[arg(long)]
        mode: Option<String>,

        /// Print the run result as JSON instead of the captured lines
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Pass a raw command line to the interpreter, e.g. "-m site"
    Exec {
        #[arg(value_name = "COMMAND_LINE", allow_hyphen_values = true)]
        command_line: String,

        /// block | stream (default: from env or block)
        #[arg(long)]
        mode: Option<String>,

        /// Print the run result as JSON instead of the captured lines
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Add the interpreter's directories to PATH
    SetupPath {
        /// process | user | machine
        #[arg(long, default_value = "process")]
        scope: String,
    },

    /// Upgrade pip
    PipUpdate,

    /// Install packages from a requirements file
    PipInstall {
        #[arg(value_name = "REQUIREMENTS")]
        requirements: PathBuf,
    },
}
