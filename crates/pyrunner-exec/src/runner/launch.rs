//! Child process launch and supervision shared by both run modes.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pyrunner_core::observability;

use super::command_line::apply_command_line;
use super::process_tree::{self, ProcessTree};
use super::{RunObserver, RunResult, RunSlot, RunState, Termination};
use crate::error::{Error, Result};
use crate::info_log;

/// Poll interval while waiting for exit, cancellation or timeout.
const WAIT_POLL_INTERVAL_MS: u64 = 20;

/// After a kill, how long the readers get to reach EOF before they are
/// detached. A process that escaped the tree can hold the pipes open.
const READER_GRACE_MS: u64 = 2000;

/// CREATE_NO_WINDOW: no console window for the child.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub(crate) struct LaunchRequest<'a> {
    pub(crate) program: &'a Path,
    pub(crate) command_line: &'a str,
    pub(crate) working_dir: &'a Path,
    pub(crate) observers: Vec<Arc<dyn RunObserver>>,
    pub(crate) cancel: Arc<AtomicBool>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) slot: RunSlot,
}

#[derive(Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Where decoded lines go: the run log (non-blank only) and every observer.
/// Nothing is delivered once the sink is closed.
#[derive(Clone)]
struct LineSink {
    state: Arc<RunState>,
    observers: Vec<Arc<dyn RunObserver>>,
    closed: Arc<AtomicBool>,
}

impl LineSink {
    fn deliver(&self, kind: StreamKind, line: &str) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if !line.trim().is_empty() {
            if let Ok(mut log) = self.state.log.lock() {
                match kind {
                    StreamKind::Stdout => log.output.push(line.to_string()),
                    StreamKind::Stderr => log.error.push(line.to_string()),
                }
            }
        }
        for observer in &self.observers {
            match kind {
                StreamKind::Stdout => observer.on_output_line(line),
                StreamKind::Stderr => observer.on_error_line(line),
            }
        }
    }
}

/// A running child with its two reader threads.
pub(crate) struct Supervisor {
    child: Child,
    tree: ProcessTree,
    command_line: String,
    readers: Vec<(StreamKind, JoinHandle<std::io::Result<()>>)>,
    sink: LineSink,
    cancel: Arc<AtomicBool>,
    timeout: Option<Duration>,
    started: Instant,
    slot: Option<RunSlot>,
}

impl Supervisor {
    /// Spawn the child and start draining both pipes.
    pub(crate) fn launch(request: LaunchRequest<'_>) -> Result<Self> {
        info_log!("Calling Python...");
        tracing::debug!(
            program = %request.program.display(),
            command_line = request.command_line,
            cwd = %request.working_dir.display(),
            "Launching interpreter"
        );
        observability::audit_command_invoked(
            &request.program.to_string_lossy(),
            request.command_line,
            &request.working_dir.to_string_lossy(),
        );

        let mut cmd = Command::new(request.program);
        apply_command_line(&mut cmd, request.command_line);
        cmd.current_dir(request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        process_tree::prepare(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: request.program.to_path_buf(),
            source,
        })?;
        let tree = ProcessTree::attach(&child);

        let sink = LineSink {
            state: Arc::clone(&request.slot.0),
            observers: request.observers,
            closed: Arc::new(AtomicBool::new(false)),
        };
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push((
                StreamKind::Stdout,
                spawn_reader(out, StreamKind::Stdout, sink.clone()),
            ));
        }
        if let Some(err) = child.stderr.take() {
            readers.push((
                StreamKind::Stderr,
                spawn_reader(err, StreamKind::Stderr, sink.clone()),
            ));
        }

        Ok(Self {
            child,
            tree,
            command_line: request.command_line.to_string(),
            readers,
            sink,
            cancel: request.cancel,
            timeout: request.timeout,
            started: Instant::now(),
            slot: Some(request.slot),
        })
    }

    /// Wait for exit (or kill on cancel/timeout), drain both streams, then
    /// release the runner and notify observers.
    pub(crate) fn supervise(mut self) -> Result<RunResult> {
        let (status, termination) = match self.wait_for_exit() {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.abort(e)),
        };
        let read_error = match termination {
            None => self.join_readers(None),
            Some(_) => self.join_readers(Some(Duration::from_millis(READER_GRACE_MS))),
        };

        let result = self.finish(status.code(), termination, true);
        match read_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    /// Waiting on the child failed: kill the tree, report a failed run to the
    /// observers and hand back the wait error.
    pub(super) fn abort(mut self, error: std::io::Error) -> Error {
        tracing::warn!(error = %error, command_line = %self.command_line, "Lost track of the interpreter");
        self.tree.kill(&mut self.child);
        let exit_code = self.child.wait().ok().and_then(|status| status.code());
        self.join_readers(Some(Duration::from_millis(READER_GRACE_MS)));
        self.finish(exit_code, None, false);
        Error::Wait(error)
    }

    /// Build the result from the run log, log and audit it, release the runner
    /// and fire `on_exit`. A run that was not `completed` never succeeds.
    fn finish(
        &mut self,
        exit_code: Option<i32>,
        termination: Option<Termination>,
        completed: bool,
    ) -> RunResult {
        let (output_lines, error_lines) = match self.sink.state.log.lock() {
            Ok(log) => (log.output.clone(), log.error.clone()),
            Err(_) => (Vec::new(), Vec::new()),
        };
        let succeeded = completed && error_lines.is_empty() && termination.is_none();
        let result = RunResult {
            output_lines,
            error_lines,
            succeeded,
            exit_code,
            termination,
        };

        let duration_ms = self.started.elapsed().as_millis() as u64;
        tracing::debug!(
            exit_code = ?result.exit_code,
            duration_ms,
            output_lines = result.output_lines.len(),
            error_lines = result.error_lines.len(),
            succeeded,
            "Interpreter exited"
        );
        if let Some(reason) = termination {
            tracing::warn!(?reason, command_line = %self.command_line, "Interpreter was stopped");
        }
        observability::audit_execution_completed(
            &self.command_line,
            result.exit_code,
            duration_ms,
            result.output_lines.len(),
            result.error_lines.len(),
            succeeded,
        );

        drop(self.slot.take());
        for observer in &self.sink.observers {
            observer.on_exit(&result);
        }
        result
    }

    fn wait_for_exit(&mut self) -> std::io::Result<(ExitStatus, Option<Termination>)> {
        let interval = Duration::from_millis(WAIT_POLL_INTERVAL_MS);
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok((status, None));
            }
            let stop = if self.cancel.load(Ordering::SeqCst) {
                Some(Termination::Cancelled)
            } else {
                self.timeout
                    .filter(|limit| self.started.elapsed() >= *limit)
                    .map(|_| Termination::TimedOut)
            };
            if let Some(reason) = stop {
                // The child may have exited between try_wait and kill.
                self.tree.kill(&mut self.child);
                let status = self.child.wait()?;
                return Ok((status, Some(reason)));
            }
            thread::sleep(interval);
        }
    }

    /// Join both readers; the first failure is returned. With a `grace`
    /// period, readers still running when it ends are detached and the sink is
    /// closed so they deliver nothing more.
    fn join_readers(&mut self, grace: Option<Duration>) -> Option<Error> {
        if let Some(grace) = grace {
            let deadline = Instant::now() + grace;
            while Instant::now() < deadline
                && self.readers.iter().any(|(_, handle)| !handle.is_finished())
            {
                thread::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS));
            }
            self.sink.closed.store(true, Ordering::SeqCst);
        }

        let mut first_error = None;
        for (kind, handle) in self.readers.drain(..) {
            if grace.is_some() && !handle.is_finished() {
                tracing::warn!(stream = kind.as_str(), "Output pipe still open after kill, detaching reader");
                continue;
            }
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("reader thread panicked")));
            if let Err(source) = outcome {
                tracing::warn!(stream = kind.as_str(), error = %source, "Failed to read child output");
                first_error.get_or_insert(Error::StreamRead {
                    stream: kind.as_str(),
                    source,
                });
            }
        }
        first_error
    }
}

/// Read `stream` line by line until EOF. Invalid UTF-8 is replaced, and
/// trailing `\n` / `\r\n` is stripped.
fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    kind: StreamKind,
    sink: LineSink,
) -> JoinHandle<std::io::Result<()>> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            sink.deliver(kind, &String::from_utf8_lossy(&buf));
        }
    })
}
