//! Consumers of a child process output.

use super::ExitOutcome;

/// Receives the output of a child process as it arrives.
pub trait OutputSink {
    /// A chunk of standard output.
    fn stdout(&mut self, chunk: &[u8]);

    /// A chunk of standard error.
    fn stderr(&mut self, chunk: &[u8]);

    /// Called exactly once, after the child has terminated and its remaining
    /// output was delivered.
    fn exited(&mut self, _outcome: &ExitOutcome) {}
}

/// Silent mode: drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl OutputSink for Discard {
    fn stdout(&mut self, _chunk: &[u8]) {}

    fn stderr(&mut self, _chunk: &[u8]) {}
}

/// Keeps the whole output in memory.
#[derive(Debug, Default, Clone)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub outcome: Option<ExitOutcome>,
}

impl Captured {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl OutputSink for Captured {
    fn stdout(&mut self, chunk: &[u8]) {
        self.stdout.extend_from_slice(chunk);
    }

    fn stderr(&mut self, chunk: &[u8]) {
        self.stderr.extend_from_slice(chunk);
    }

    fn exited(&mut self, outcome: &ExitOutcome) {
        self.outcome = Some(*outcome);
    }
}

/// Adapts three closures to an [`OutputSink`].
pub struct Callbacks<O, E, X> {
    on_stdout: O,
    on_stderr: E,
    on_exit: X,
}

impl<O, E, X> Callbacks<O, E, X>
where
    O: FnMut(&[u8]),
    E: FnMut(&[u8]),
    X: FnMut(&ExitOutcome),
{
    pub fn new(on_stdout: O, on_stderr: E, on_exit: X) -> Self {
        Self {
            on_stdout,
            on_stderr,
            on_exit,
        }
    }
}

impl<O, E, X> OutputSink for Callbacks<O, E, X>
where
    O: FnMut(&[u8]),
    E: FnMut(&[u8]),
    X: FnMut(&ExitOutcome),
{
    fn stdout(&mut self, chunk: &[u8]) {
        (self.on_stdout)(chunk);
    }

    fn stderr(&mut self, chunk: &[u8]) {
        (self.on_stderr)(chunk);
    }

    fn exited(&mut self, outcome: &ExitOutcome) {
        (self.on_exit)(outcome);
    }
}
