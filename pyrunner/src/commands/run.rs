//! `pyrunner run` / `pyrunner exec`

use std::io::Write;

use anyhow::Result;
use pyrunner_exec::runner::script_command_line;
use pyrunner_exec::{CallbackObserver, ProcessRunner, RunMode, RunResult, Termination};

use super::GlobalOptions;

pub fn cmd_run(
    opts: &GlobalOptions,
    script: &str,
    args: &[String],
    mode: Option<String>,
    as_json: bool,
) -> Result<bool> {
    cmd_exec(opts, &script_command_line(script, args), mode, as_json)
}

pub fn cmd_exec(
    opts: &GlobalOptions,
    command_line: &str,
    mode: Option<String>,
    as_json: bool,
) -> Result<bool> {
    let mut runner = opts.runner(mode)?;
    let echo_live = runner.config().mode == RunMode::StreamEvents && !as_json;
    if echo_live {
        attach_console(&mut runner)?;
    }

    let result = runner.run(command_line)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !echo_live {
        report(&result.output_lines, &result.error_lines);
    }
    describe_termination(&result);
    Ok(result.succeeded)
}

/// Echo streamed lines as they arrive.
fn attach_console(runner: &mut ProcessRunner) -> Result<()> {
    runner.add_observer(
        CallbackObserver::new()
            .on_output(|line| {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", line);
                let _ = out.flush();
            })
            .on_error(|line| eprintln!("{}", line)),
    )?;
    Ok(())
}

/// Print captured logs: stdout lines to stdout, stderr lines to stderr.
pub fn report(output_lines: &[String], error_lines: &[String]) {
    for line in output_lines {
        println!("{}", line);
    }
    for line in error_lines {
        eprintln!("{}", line);
    }
}

fn describe_termination(result: &RunResult) {
    match result.termination {
        Some(Termination::TimedOut) => eprintln!("Python was stopped: timeout exceeded"),
        Some(Termination::Cancelled) => eprintln!("Python was stopped: cancelled"),
        None => {}
    }
}
