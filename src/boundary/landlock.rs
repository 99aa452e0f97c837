//! Native backend: namespaces via `unshare(2)` plus a Landlock ruleset
//!
//! Everything that allocates (ruleset, id maps) is prepared in the parent.
//! The `pre_exec` hook only enters the namespaces and enforces the ruleset.

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use codefort_core::Result;
use codefort_core::util;
use codefort_landlock::LandlockConfig;
use codefort_namespace::UserNamespace;
use log::debug;

use super::SandboxSpec;
use super::backend::{CommandLine, SandboxBackend, base_command};

/// Hostname seen inside the sandbox
pub const SANDBOX_HOSTNAME: &str = "codefort";

/// Device nodes that stay writable under a read-only `/dev`, matching what
/// bwrap's fresh `--dev` provides
static WRITABLE_DEVICES: [&str; 3] = ["/dev/null", "/dev/zero", "/dev/full"];

/// Unprivileged namespaces + Landlock.
///
/// The child starts a new session, so it has no controlling terminal and
/// leads its own process group. The program runs as pid 1 of a fresh pid
/// namespace; the host `/proc` stays mounted read-only, but host pids are
/// not addressable from inside. On Landlock ABI v6+ the ruleset also scopes
/// signals and abstract unix sockets to the sandbox.
#[derive(Debug, Clone)]
pub struct LandlockBackend {
    uid: u32,
    gid: u32,
}

impl LandlockBackend {
    pub fn new() -> Self {
        Self {
            uid: util::get_uid(),
            gid: util::get_gid(),
        }
    }

    fn landlock_config(spec: &SandboxSpec) -> LandlockConfig {
        let devices = WRITABLE_DEVICES
            .iter()
            .map(Path::new)
            .filter(|dev| dev.exists())
            .map(Path::to_path_buf);

        LandlockConfig {
            read_only: spec.read_only_paths().map(Into::into).collect(),
            read_write: spec
                .read_write_paths()
                .map(Into::into)
                .chain(devices)
                .collect(),
        }
    }
}

impl Default for LandlockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxBackend for LandlockBackend {
    fn name(&self) -> &'static str {
        "landlock"
    }

    fn command(&self, spec: &SandboxSpec, command: &CommandLine) -> Result<Command> {
        spec.namespaces().validate()?;

        let ruleset = Self::landlock_config(spec).build()?;
        let namespaces =
            UserNamespace::prepare(spec.namespaces(), self.uid, self.gid, SANDBOX_HOSTNAME);
        debug!(
            "landlock ruleset (ABI v{}) with {} binding(s), unshare flags {:#x}",
            ruleset.abi(),
            spec.bindings().len(),
            namespaces.flags()
        );

        let mut cmd = base_command(&command.program, spec);
        cmd.args(&command.args);

        // SAFETY: the hook only issues raw syscalls on buffers prepared above
        unsafe {
            cmd.pre_exec(move || {
                UserNamespace::new_session()?;
                namespaces.enter()?;
                ruleset.restrict_self()?;
                if namespaces.enters_pid_namespace() {
                    UserNamespace::fork_into_pid_namespace()?;
                }
                Ok(())
            });
        }

        Ok(cmd)
    }
}
