//! Translation of a [`SandboxSpec`] into a runnable command

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use codefort_core::backend::ResolvedBackend;
use codefort_core::{BackendKind, Result, SystemCapabilities};
use log::info;

use super::SandboxSpec;
use super::bubblewrap::BubblewrapBackend;
use super::landlock::LandlockBackend;

/// `PATH` seen by sandboxed commands
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// A command vector: absolute program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// An isolation mechanism able to run a command inside a [`SandboxSpec`].
///
/// Implementations only build the [`Command`]; stdio, spawning, timeouts
/// and reaping belong to the process orchestrator.
pub trait SandboxBackend: fmt::Debug + Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Build the command that runs `command` confined by `spec`.
    ///
    /// The returned command already has a cleared environment and the
    /// workspace as working directory. Once spawned, the child must lead its
    /// own process group (pgid == pid) so a timeout can kill the whole tree.
    fn command(&self, spec: &SandboxSpec, command: &CommandLine) -> Result<Command>;
}

/// Environment given to every sandboxed command
pub fn sandbox_env(workdir: &Path) -> Vec<(&'static str, OsString)> {
    vec![
        ("PATH", OsString::from(SANDBOX_PATH)),
        ("HOME", workdir.as_os_str().to_owned()),
        ("TMPDIR", workdir.as_os_str().to_owned()),
        ("LANG", OsString::from("C.UTF-8")),
    ]
}

/// Common setup shared by all backends; process grouping is left to each
pub(super) fn base_command(program: &Path, spec: &SandboxSpec) -> Command {
    let mut cmd = Command::new(program);
    cmd.env_clear()
        .envs(sandbox_env(spec.workdir()))
        .current_dir(spec.workdir());
    cmd
}

/// Detect host support and construct the backend `kind` resolves to.
///
/// Fails with `SandboxUnavailable` instead of ever running unconfined.
pub fn select_backend(kind: BackendKind) -> Result<Arc<dyn SandboxBackend>> {
    let caps = SystemCapabilities::detect();
    let resolved = kind.resolve(&caps)?;
    info!("isolation backend: {} (requested {:?})", resolved, kind);

    Ok(match resolved {
        ResolvedBackend::Landlock => Arc::new(LandlockBackend::new()),
        ResolvedBackend::Bubblewrap => Arc::new(BubblewrapBackend::from_capabilities(&caps)?),
    })
}
