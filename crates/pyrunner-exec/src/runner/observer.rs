//! Run observers: how streamed lines and exit notifications reach callers.

use std::sync::mpsc::Sender;

use super::RunResult;

/// Receives events of a `StreamEvents` run.
///
/// Line callbacks run on the reader thread of their stream, so output and
/// error lines may interleave arbitrarily. `on_exit` runs after both streams
/// are drained and the child has exited.
pub trait RunObserver: Send + Sync {
    fn on_output_line(&self, _line: &str) {}
    fn on_error_line(&self, _line: &str) {}
    fn on_exit(&self, _result: &RunResult) {}
}

type LineCallback = Box<dyn Fn(&str) + Send + Sync>;
type ExitCallback = Box<dyn Fn(&RunResult) + Send + Sync>;

/// Observer assembled from closures; unset slots do nothing.
#[derive(Default)]
pub struct CallbackObserver {
    output: Option<LineCallback>,
    error: Option<LineCallback>,
    exit: Option<ExitCallback>,
}

impl CallbackObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_output(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.output = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl Fn(&RunResult) + Send + Sync + 'static) -> Self {
        self.exit = Some(Box::new(f));
        self
    }
}

impl RunObserver for CallbackObserver {
    fn on_output_line(&self, line: &str) {
        if let Some(ref f) = self.output {
            f(line);
        }
    }

    fn on_error_line(&self, line: &str) {
        if let Some(ref f) = self.error {
            f(line);
        }
    }

    fn on_exit(&self, result: &RunResult) {
        if let Some(ref f) = self.exit {
            f(result);
        }
    }
}

/// Event form of the observer callbacks, for channel consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    OutputLine(String),
    ErrorLine(String),
    Exited(RunResult),
}

/// Forwards events into a channel; a dropped receiver is ignored.
impl RunObserver for Sender<RunEvent> {
    fn on_output_line(&self, line: &str) {
        let _ = self.send(RunEvent::OutputLine(line.to_string()));
    }

    fn on_error_line(&self, line: &str) {
        let _ = self.send(RunEvent::ErrorLine(line.to_string()));
    }

    fn on_exit(&self, result: &RunResult) {
        let _ = self.send(RunEvent::Exited(result.clone()));
    }
}
