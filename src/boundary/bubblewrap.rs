//! `bwrap` backend: a fresh mount namespace assembled from bind mounts

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use codefort_core::{CodefortError, Result, SystemCapabilities};
use log::debug;

use super::backend::{CommandLine, SandboxBackend, base_command};
use super::landlock::SANDBOX_HOSTNAME;
use super::{AccessMode, SandboxSpec};

/// Paths bwrap mounts fresh rather than binding from the host
const VIRTUAL_FILESYSTEMS: &[&str] = &["/proc", "/dev"];

#[derive(Debug, Clone)]
pub struct BubblewrapBackend {
    bwrap: PathBuf,
}

impl BubblewrapBackend {
    pub fn new(bwrap: impl Into<PathBuf>) -> Self {
        Self {
            bwrap: bwrap.into(),
        }
    }

    pub fn from_capabilities(caps: &SystemCapabilities) -> Result<Self> {
        caps.bwrap_path
            .clone()
            .map(Self::new)
            .ok_or_else(|| CodefortError::SandboxUnavailable("bwrap not found on PATH".to_string()))
    }

    /// The full bwrap argument vector for `spec`, ending with `command`.
    pub fn arguments(spec: &SandboxSpec, command: &CommandLine) -> Result<Vec<OsString>> {
        let ns = spec.namespaces();
        ns.validate()?;

        let mut args: Vec<OsString> = Vec::new();
        let mut push = |items: &[&str]| args.extend(items.iter().map(OsString::from));

        if ns.user {
            push(&["--unshare-user"]);
        }
        push(&["--unshare-net"]);
        if ns.pid {
            push(&["--unshare-pid"]);
        }
        if ns.ipc {
            push(&["--unshare-ipc"]);
        }
        if ns.uts {
            push(&["--unshare-uts", "--hostname", SANDBOX_HOSTNAME]);
        }
        push(&["--die-with-parent", "--new-session"]);

        for binding in spec.bindings() {
            if is_virtual(&binding.path) {
                continue;
            }
            let flag = match binding.mode {
                AccessMode::ReadOnly => "--ro-bind-try",
                AccessMode::ReadWrite => "--bind",
            };
            args.push(flag.into());
            args.push(binding.path.clone().into());
            args.push(binding.path.clone().into());
        }

        if spec.read_only_paths().any(|p| p == Path::new("/proc")) {
            args.extend(["--proc", "/proc"].map(OsString::from));
        }
        if spec.read_only_paths().any(|p| p == Path::new("/dev")) {
            args.extend(["--dev", "/dev"].map(OsString::from));
        }

        args.push("--chdir".into());
        args.push(spec.workdir().into());
        args.push("--".into());
        args.push(command.program.clone().into());
        args.extend(command.args.iter().cloned());

        Ok(args)
    }
}

fn is_virtual(path: &Path) -> bool {
    VIRTUAL_FILESYSTEMS.iter().any(|v| path == Path::new(v))
}

impl SandboxBackend for BubblewrapBackend {
    fn name(&self) -> &'static str {
        "bubblewrap"
    }

    fn command(&self, spec: &SandboxSpec, command: &CommandLine) -> Result<Command> {
        let args = Self::arguments(spec, command)?;
        debug!("bwrap with {} argument(s)", args.len());

        let mut cmd = base_command(&self.bwrap, spec);
        cmd.args(args).process_group(0);
        Ok(cmd)
    }
}
