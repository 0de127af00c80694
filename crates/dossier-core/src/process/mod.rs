//! Asynchronous execution of external commands.
//!
//! Commands run through `/bin/sh -c` with their standard output and error
//! captured as two independent byte streams. The async primitive is
//! [`spawn`], which returns a [`ProcessHandle`] exposing one channel per
//! stream and a future for the exit status.
//!
//! Callers of the storage layer are synchronous, so [`Orchestrator`] drives
//! the primitive on a dedicated current-thread runtime and blocks until the
//! child has exited. Output goes to an [`OutputSink`]:
//!
//! - verbose mode hands chunks to a sink which shows them live,
//! - silent mode uses [`Discard`] and only cares about the exit outcome.
//!
//! There is no cancellation: a started command runs to completion.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    runtime::{Builder, Runtime},
    sync::{mpsc, oneshot},
    time,
};

use crate::error::{DossierError, Result, ResultExt};

pub mod sink;

pub use sink::{Callbacks, Captured, Discard, OutputSink};

const SHELL: &str = "/bin/sh";
const CHUNK_SIZE: usize = 4096;

/// How long output is still collected once the child has exited.
pub const EXIT_GRACE: Duration = Duration::from_millis(250);

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with the given code
    Exited(i32),
    /// Terminated by the given signal
    Signaled(i32),
    /// Neither an exit code nor a signal could be determined
    Unknown,
}

impl ExitOutcome {
    /// Only a normal exit with code 0 counts as success.
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Signaled(signal);
            }
        }
        ExitOutcome::Unknown
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exited with code {code}"),
            ExitOutcome::Signaled(signal) => write!(f, "killed by signal {signal}"),
            ExitOutcome::Unknown => write!(f, "terminated abnormally"),
        }
    }
}

/// A running child process.
///
/// Each stream channel closes once the corresponding descriptor reports
/// end-of-stream or an error; the exit future resolves once the child has
/// terminated.
pub struct ProcessHandle {
    pub stdout: mpsc::UnboundedReceiver<Vec<u8>>,
    pub stderr: mpsc::UnboundedReceiver<Vec<u8>>,
    exit: oneshot::Receiver<ExitOutcome>,
    pid: Option<u32>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Waits for the child to terminate.
    pub async fn wait(self) -> ExitOutcome {
        self.exit.await.unwrap_or(ExitOutcome::Unknown)
    }

    /// Feeds both streams to `sink` as chunks arrive, then reports the exit
    /// outcome once the child has terminated.
    ///
    /// Output still buffered when the child exits is delivered before
    /// [`OutputSink::exited`], which is called exactly once. Streams held
    /// open by a detached grandchild are abandoned after [`EXIT_GRACE`].
    pub async fn drain(mut self, sink: &mut dyn OutputSink) -> ExitOutcome {
        let mut stdout_open = true;
        let mut stderr_open = true;

        let outcome = loop {
            tokio::select! {
                biased;
                chunk = self.stdout.recv(), if stdout_open => match chunk {
                    Some(bytes) => sink.stdout(&bytes),
                    None => stdout_open = false,
                },
                chunk = self.stderr.recv(), if stderr_open => match chunk {
                    Some(bytes) => sink.stderr(&bytes),
                    None => stderr_open = false,
                },
                outcome = &mut self.exit => break outcome.unwrap_or(ExitOutcome::Unknown),
            }
        };

        let grace = time::sleep(EXIT_GRACE);
        tokio::pin!(grace);
        while stdout_open || stderr_open {
            tokio::select! {
                biased;
                chunk = self.stdout.recv(), if stdout_open => match chunk {
                    Some(bytes) => sink.stdout(&bytes),
                    None => stdout_open = false,
                },
                chunk = self.stderr.recv(), if stderr_open => match chunk {
                    Some(bytes) => sink.stderr(&bytes),
                    None => stderr_open = false,
                },
                _ = &mut grace => {
                    debug!("Output streams still open after exit, detaching");
                    break;
                }
            }
        }

        sink.exited(&outcome);
        outcome
    }
}

/// Starts `command` through the shell without waiting for it.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `DossierError::Spawn` when the shell cannot be started.
pub fn spawn(command: &str) -> Result<ProcessHandle> {
    spawn_logged(command, command)
}

/// Same as [`spawn`], but logs and reports `display` instead of the real
/// command line (which may hold a password).
pub fn spawn_logged(command: &str, display: &str) -> Result<ProcessHandle> {
    debug!("Spawning: {display}");
    let mut child = Command::new(SHELL)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DossierError::Spawn {
            command: display.to_string(),
            source: e,
        })?;

    let pid = child.id();
    let (stdout_tx, stdout) = mpsc::unbounded_channel();
    let (stderr_tx, stderr) = mpsc::unbounded_channel();
    let (exit_tx, exit) = oneshot::channel();

    if let Some(out) = child.stdout.take() {
        tokio::spawn(pump(out, stdout_tx));
    }
    if let Some(err) = child.stderr.take() {
        tokio::spawn(pump(err, stderr_tx));
    }

    let display = display.to_string();
    tokio::spawn(async move {
        let outcome = match child.wait().await {
            Ok(status) => ExitOutcome::from(status),
            Err(e) => {
                warn!("Unable to wait for '{display}': {e}");
                ExitOutcome::Unknown
            }
        };
        debug!("'{display}' {outcome}");
        let _ = exit_tx.send(outcome);
    });

    Ok(ProcessHandle {
        stdout,
        stderr,
        exit,
        pid,
    })
}

/// Forwards a stream in chunks until end-of-stream or the first error.
async fn pump<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

/// Blocking façade over [`spawn`] for synchronous callers.
pub struct Orchestrator {
    runtime: Runtime,
}

impl Orchestrator {
    /// Builds the dedicated event loop.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .with_context("Unable to start the process event loop")?;
        Ok(Self { runtime })
    }

    /// Runs `command` to completion, feeding its output to `sink`.
    pub fn run(&self, command: &str, sink: &mut dyn OutputSink) -> Result<ExitOutcome> {
        self.run_logged(command, command, sink)
    }

    /// Same as [`Orchestrator::run`] with a redacted command for logs.
    pub fn run_logged(
        &self,
        command: &str,
        display: &str,
        sink: &mut dyn OutputSink,
    ) -> Result<ExitOutcome> {
        self.runtime.block_on(async {
            let handle = spawn_logged(command, display)?;
            Ok::<_, DossierError>(handle.drain(sink).await)
        })
    }

    /// Runs `command` silently and only reports how it ended.
    pub fn run_silent(&self, command: &str) -> Result<ExitOutcome> {
        self.run(command, &mut Discard)
    }

    /// Runs `command` with one callback per stream and one for the exit.
    pub fn run_with<O, E, X>(
        &self,
        command: &str,
        on_stdout: O,
        on_stderr: E,
        on_exit: X,
    ) -> Result<ExitOutcome>
    where
        O: FnMut(&[u8]),
        E: FnMut(&[u8]),
        X: FnMut(&ExitOutcome),
    {
        let mut callbacks = Callbacks::new(on_stdout, on_stderr, on_exit);
        self.run(command, &mut callbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(ExitOutcome::Exited(1).to_string(), "exited with code 1");
        assert_eq!(ExitOutcome::Signaled(15).to_string(), "killed by signal 15");
        assert!(ExitOutcome::Exited(0).success());
        assert!(!ExitOutcome::Exited(2).success());
        assert!(!ExitOutcome::Signaled(9).success());
        assert!(!ExitOutcome::Unknown.success());
    }

    #[tokio::test]
    async fn test_spawn_channels() {
        let mut handle = spawn("printf out; printf err >&2").expect("Failed to spawn");
        let mut out = Vec::new();
        while let Some(chunk) = handle.stdout.recv().await {
            out.extend(chunk);
        }
        let mut err = Vec::new();
        while let Some(chunk) = handle.stderr.recv().await {
            err.extend(chunk);
        }
        assert_eq!(out, b"out");
        assert_eq!(err, b"err");
        assert_eq!(handle.wait().await, ExitOutcome::Exited(0));
    }

    #[test]
    fn test_detached_grandchild_does_not_delay_exit() {
        let orchestrator = Orchestrator::new().unwrap();
        let started = std::time::Instant::now();
        let outcome = orchestrator.run_silent("(sleep 5 &); echo started; exit 0").unwrap();
        assert_eq!(outcome, ExitOutcome::Exited(0));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_output_before_exit_is_kept() {
        let orchestrator = Orchestrator::new().unwrap();
        let mut captured = Captured::default();
        let outcome = orchestrator
            .run("(sleep 5 &); printf last; exit 4", &mut captured)
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Exited(4));
        assert_eq!(captured.stdout, b"last");
        assert_eq!(captured.outcome, Some(ExitOutcome::Exited(4)));
    }

    #[test]
    fn test_run_silent_exit_code() {
        let orchestrator = Orchestrator::new().unwrap();
        assert_eq!(orchestrator.run_silent("exit 3").unwrap(), ExitOutcome::Exited(3));
        assert_eq!(orchestrator.run_silent("true").unwrap(), ExitOutcome::Exited(0));
    }
}
