//! Running one phase inside a sandbox boundary
//!
//! The orchestrator owns everything between spawn and reap: feeding stdin,
//! draining stdout/stderr concurrently, enforcing the wall-clock timeout and
//! killing the whole process group when it fires.

use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use codefort_core::{CodefortError, Result};
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

use super::capture::{Captured, OutputCapture};
use crate::boundary::{CommandLine, SandboxBackend, SandboxSpec};

/// Default cap on each of stdout and stderr
pub const DEFAULT_OUTPUT_LIMIT: usize = 2 * 1024 * 1024;

/// How long to wait for pipes to close after the process is gone
const CAPTURE_GRACE: Duration = Duration::from_millis(250);

/// Outcome of one compile or run phase.
///
/// Any exit code, including a kill on timeout, is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseResult {
    /// Exit code, or 128 + signal number if the process was killed
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time, capped at the timeout
    pub duration: Duration,
    pub timed_out: bool,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl PhaseResult {
    pub fn real_time_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawns commands through a [`SandboxBackend`] and supervises them
#[derive(Debug, Clone)]
pub struct ProcessOrchestrator {
    backend: Arc<dyn SandboxBackend>,
    output_limit: usize,
}

impl ProcessOrchestrator {
    pub fn new(backend: Arc<dyn SandboxBackend>, output_limit: usize) -> Self {
        Self {
            backend,
            output_limit,
        }
    }

    pub fn backend(&self) -> &dyn SandboxBackend {
        self.backend.as_ref()
    }

    pub fn output_limit(&self) -> usize {
        self.output_limit
    }

    /// Run `command` inside `spec` with its working directory set to the
    /// workspace, feeding `stdin` and killing it after `timeout`.
    pub fn run(
        &self,
        spec: &SandboxSpec,
        command: &CommandLine,
        stdin: &str,
        timeout: Duration,
    ) -> Result<PhaseResult> {
        let mut cmd = self.backend.command(spec, command)?;
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            "spawning [{}] via {} in {}",
            command,
            self.backend.name(),
            spec.workdir().display()
        );

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            CodefortError::ProcessLaunch(format!("failed to launch {}: {}", command, e))
        })?;
        let pgid = Pid::from_raw(child.id() as i32);

        let (stdout, stderr) = match self.attach(&mut child, stdin) {
            Ok(streams) => streams,
            Err(e) => {
                abandon(child, pgid);
                return Err(e);
            }
        };

        let (status, timed_out) = wait_with_timeout(child, pgid, timeout)?;
        let duration = start.elapsed().min(timeout);

        // Descendants left behind in the group would keep the pipes open
        kill_group(pgid);

        let stdout = stdout.map(|c| c.finish(CAPTURE_GRACE)).unwrap_or_default();
        let stderr = stderr.map(|c| c.finish(CAPTURE_GRACE)).unwrap_or_default();

        let result = phase_result(status, stdout, stderr, duration, timed_out);
        debug!(
            "[{}] exited with {} after {} ms",
            command,
            result.exit_code,
            result.real_time_ms()
        );
        Ok(result)
    }

    /// Start draining stdout/stderr and feeding stdin of a fresh child
    fn attach(
        &self,
        child: &mut Child,
        stdin: &str,
    ) -> Result<(Option<OutputCapture>, Option<OutputCapture>)> {
        let stdout = self.capture(child.stdout.take())?;
        let stderr = self.capture(child.stderr.take())?;
        feed_stdin(child, stdin.as_bytes().to_vec())?;
        Ok((stdout, stderr))
    }

    fn capture<R>(&self, pipe: Option<R>) -> Result<Option<OutputCapture>>
    where
        R: io::Read + Send + 'static,
    {
        pipe.map(|p| OutputCapture::spawn(p, self.output_limit))
            .transpose()
            .map_err(CodefortError::from)
    }
}

/// Write `input` from a detached thread; it ends once the pipe is closed.
fn feed_stdin(child: &mut Child, input: Vec<u8>) -> Result<()> {
    let Some(mut pipe) = child.stdin.take() else {
        return Ok(());
    };

    thread::Builder::new()
        .name("codefort-stdin".into())
        .spawn(move || {
            // A program that never reads stdin closes the pipe early
            if let Err(e) = pipe.write_all(&input)
                && e.kind() != io::ErrorKind::BrokenPipe
            {
                debug!("stdin write failed: {}", e);
            }
        })?;
    Ok(())
}

/// Wait for `child`, killing its process group once `timeout` elapses.
fn wait_with_timeout(
    mut child: Child,
    pgid: Pid,
    timeout: Duration,
) -> Result<(ExitStatus, bool)> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("codefort-wait".into())
        .spawn(move || {
            let _ = tx.send(child.wait());
        })?;

    let (status, timed_out) = match rx.recv_timeout(timeout) {
        Ok(status) => (status, false),
        Err(RecvTimeoutError::Timeout) => {
            warn!("process group {} exceeded {:?}, killing", pgid, timeout);
            kill_group(pgid);
            let status = rx.recv().map_err(|_| {
                CodefortError::Io(io::Error::other("waiter thread exited without a status"))
            })?;
            (status, true)
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(CodefortError::Io(io::Error::other(
                "waiter thread exited without a status",
            )));
        }
    };

    Ok((status?, timed_out))
}

/// Kill and reap a child that will not be supervised
fn abandon(mut child: Child, pgid: Pid) {
    kill_group(pgid);
    if let Err(e) = child.wait() {
        warn!("Failed to reap abandoned process {}: {}", pgid, e);
    }
}

fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

/// Exit code as a shell would report it
pub fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

fn phase_result(
    status: ExitStatus,
    stdout: Captured,
    stderr: Captured,
    duration: Duration,
    timed_out: bool,
) -> PhaseResult {
    PhaseResult {
        exit_code: exit_code_of(status),
        stdout: stdout.text(),
        stderr: stderr.text(),
        duration,
        timed_out,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
    }
}
