//! Interpreter command lines: building them from a script plus arguments and
//! handing them to `std::process::Command` without a shell.

use std::process::Command;

/// `script "arg1" "arg2"`: every argument is wrapped in double quotes.
pub fn script_command_line<S: AsRef<str>>(script: &str, args: &[S]) -> String {
    let mut line = String::from(script.trim());
    for arg in args {
        line.push(' ');
        push_quoted(&mut line, arg.as_ref());
    }
    line
}

/// Quote `arg` the way the MSVC runtime parses it back: backslashes are
/// doubled only when a quote follows them, including the closing one.
fn push_quoted(line: &mut String, arg: &str) {
    line.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                line.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                line.push('"');
                backslashes = 0;
            }
            c => {
                line.extend(std::iter::repeat('\\').take(backslashes));
                line.push(c);
                backslashes = 0;
            }
        }
    }
    line.extend(std::iter::repeat('\\').take(backslashes * 2));
    line.push('"');
}

/// Split a command line into arguments.
///
/// Whitespace separates arguments and double quotes group. A run of `n`
/// backslashes before a quote yields `n / 2` backslashes, and the quote is
/// literal when `n` is odd. Other backslashes are kept as-is so Windows paths
/// survive.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let mut backslashes = 1;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    backslashes += 1;
                }
                if chars.peek() == Some(&'"') {
                    current.extend(std::iter::repeat('\\').take(backslashes / 2));
                    if backslashes % 2 == 1 {
                        chars.next();
                        current.push('"');
                    }
                } else {
                    current.extend(std::iter::repeat('\\').take(backslashes));
                }
                in_arg = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                in_arg = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Attach `line` to `cmd`. Windows receives it verbatim, like CreateProcess;
/// elsewhere it is split with [`split_command_line`].
pub(crate) fn apply_command_line(cmd: &mut Command, line: &str) {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.raw_arg(line.trim());
    }
    #[cfg(not(windows))]
    {
        cmd.args(split_command_line(line));
    }
}
