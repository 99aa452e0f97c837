//! Landlock filesystem access control
//!
//! Read-only paths get read and execute rights ("rox"), read-write paths get
//! every right the running kernel can handle ("rwx"). Anything not beneath
//! a rule is denied once the ruleset is enforced.

use codefort_core::capabilities::detect_landlock_abi;
use codefort_core::{CodefortError, Result};
use log::debug;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

// Access rights for files (ABI v1)
const LANDLOCK_ACCESS_FS_EXECUTE: u64 = 1;
const LANDLOCK_ACCESS_FS_WRITE_FILE: u64 = 1 << 1;
const LANDLOCK_ACCESS_FS_READ_FILE: u64 = 1 << 2;
const LANDLOCK_ACCESS_FS_READ_DIR: u64 = 1 << 3;
const LANDLOCK_ACCESS_FS_REMOVE_DIR: u64 = 1 << 4;
const LANDLOCK_ACCESS_FS_REMOVE_FILE: u64 = 1 << 5;
const LANDLOCK_ACCESS_FS_MAKE_CHAR: u64 = 1 << 6;
const LANDLOCK_ACCESS_FS_MAKE_DIR: u64 = 1 << 7;
const LANDLOCK_ACCESS_FS_MAKE_REG: u64 = 1 << 8;
const LANDLOCK_ACCESS_FS_MAKE_SOCK: u64 = 1 << 9;
const LANDLOCK_ACCESS_FS_MAKE_FIFO: u64 = 1 << 10;
const LANDLOCK_ACCESS_FS_MAKE_BLOCK: u64 = 1 << 11;
const LANDLOCK_ACCESS_FS_MAKE_SYM: u64 = 1 << 12;
// ABI v2
const LANDLOCK_ACCESS_FS_REFER: u64 = 1 << 13;
// ABI v3
const LANDLOCK_ACCESS_FS_TRUNCATE: u64 = 1 << 14;
// ABI v5
const LANDLOCK_ACCESS_FS_IOCTL_DEV: u64 = 1 << 15;

// Scopes (ABI v6)
const LANDLOCK_SCOPE_ABSTRACT_UNIX_SOCKET: u64 = 1;
const LANDLOCK_SCOPE_SIGNAL: u64 = 1 << 1;

const ACCESS_FS_V1: u64 = LANDLOCK_ACCESS_FS_EXECUTE
    | LANDLOCK_ACCESS_FS_WRITE_FILE
    | LANDLOCK_ACCESS_FS_READ_FILE
    | LANDLOCK_ACCESS_FS_READ_DIR
    | LANDLOCK_ACCESS_FS_REMOVE_DIR
    | LANDLOCK_ACCESS_FS_REMOVE_FILE
    | LANDLOCK_ACCESS_FS_MAKE_CHAR
    | LANDLOCK_ACCESS_FS_MAKE_DIR
    | LANDLOCK_ACCESS_FS_MAKE_REG
    | LANDLOCK_ACCESS_FS_MAKE_SOCK
    | LANDLOCK_ACCESS_FS_MAKE_FIFO
    | LANDLOCK_ACCESS_FS_MAKE_BLOCK
    | LANDLOCK_ACCESS_FS_MAKE_SYM;

const READ_EXEC_ACCESS: u64 =
    LANDLOCK_ACCESS_FS_READ_FILE | LANDLOCK_ACCESS_FS_READ_DIR | LANDLOCK_ACCESS_FS_EXECUTE;

// Rights that make sense on a non-directory inode
const FILE_ACCESS: u64 = LANDLOCK_ACCESS_FS_EXECUTE
    | LANDLOCK_ACCESS_FS_WRITE_FILE
    | LANDLOCK_ACCESS_FS_READ_FILE
    | LANDLOCK_ACCESS_FS_TRUNCATE;

const LANDLOCK_RULE_PATH_BENEATH: u32 = 1;

// Kernel structures for landlock syscalls
#[repr(C)]
struct LandlockRulesetAttr {
    handled_access_fs: u64,
    handled_access_net: u64,
    scoped: u64,
}

// Size of the attr as understood by kernels before ABI v4
const RULESET_ATTR_SIZE_V1: usize = std::mem::size_of::<u64>();

#[repr(C, packed)]
struct LandlockPathBeneathAttr {
    allowed_access: u64,
    parent_fd: i32,
}

/// IPC scopes enforced for the given ABI version.
///
/// A scoped domain cannot signal, or connect to abstract sockets of,
/// processes outside it.
fn scopes_for_abi(abi: u32) -> u64 {
    if abi >= 6 {
        LANDLOCK_SCOPE_SIGNAL | LANDLOCK_SCOPE_ABSTRACT_UNIX_SOCKET
    } else {
        0
    }
}

/// Rights handled by a ruleset for the given ABI version
fn handled_access_for_abi(abi: u32) -> u64 {
    let mut access = ACCESS_FS_V1;
    if abi >= 2 {
        access |= LANDLOCK_ACCESS_FS_REFER;
    }
    if abi >= 3 {
        access |= LANDLOCK_ACCESS_FS_TRUNCATE;
    }
    if abi >= 5 {
        access |= LANDLOCK_ACCESS_FS_IOCTL_DEV;
    }
    access
}

/// Landlock filesystem access configuration
#[derive(Debug, Clone, Default)]
pub struct LandlockConfig {
    /// Paths with read and execute access
    pub read_only: Vec<PathBuf>,
    /// Paths with full access
    pub read_write: Vec<PathBuf>,
}

impl LandlockConfig {
    /// Check if landlock is available on this system
    pub fn is_available() -> bool {
        detect_landlock_abi().is_some()
    }

    /// Create the kernel ruleset and add one rule per path.
    pub fn build(&self) -> Result<LandlockRuleset> {
        let mut ruleset = LandlockRuleset::new()?;
        for path in &self.read_only {
            ruleset.allow_read(path)?;
        }
        for path in &self.read_write {
            ruleset.allow_write(path)?;
        }
        Ok(ruleset)
    }

    /// Build and enforce on the current process.
    /// WARNING: This is irreversible for the current process.
    pub fn apply(&self) -> Result<()> {
        let ruleset = self.build()?;
        ruleset.restrict_self().map_err(|e| {
            CodefortError::Landlock(format!("landlock_restrict_self failed: {}", e))
        })
    }
}

/// A populated landlock ruleset, ready to be enforced
#[derive(Debug)]
pub struct LandlockRuleset {
    fd: OwnedFd,
    handled: u64,
    scoped: u64,
    abi: u32,
}

impl LandlockRuleset {
    /// Create an empty ruleset handling every right the kernel supports
    pub fn new() -> Result<Self> {
        let abi = detect_landlock_abi().ok_or_else(|| {
            CodefortError::SandboxUnavailable(
                "Landlock is not available on this kernel (requires Linux 5.13+)".to_string(),
            )
        })?;

        let handled = handled_access_for_abi(abi);
        let scoped = scopes_for_abi(abi);
        let attr = LandlockRulesetAttr {
            handled_access_fs: handled,
            handled_access_net: 0,
            scoped,
        };
        // Older kernels reject an attr larger than they know unless the tail is zero
        let attr_size = if scoped != 0 {
            std::mem::size_of::<LandlockRulesetAttr>()
        } else {
            RULESET_ATTR_SIZE_V1
        };

        let ret = unsafe {
            libc::syscall(
                libc::SYS_landlock_create_ruleset,
                &attr as *const LandlockRulesetAttr,
                attr_size,
                0u32,
            )
        };

        if ret < 0 {
            return Err(CodefortError::Landlock(format!(
                "landlock_create_ruleset failed: {}",
                io::Error::last_os_error()
            )));
        }

        debug!(
            "created landlock ruleset (ABI v{}, scopes {:#x})",
            abi, scoped
        );

        Ok(Self {
            // SAFETY: the kernel returned a fresh, owned, close-on-exec fd
            fd: unsafe { OwnedFd::from_raw_fd(ret as RawFd) },
            handled,
            scoped,
            abi,
        })
    }

    pub fn abi(&self) -> u32 {
        self.abi
    }

    /// Whether signals and abstract unix sockets are confined to the domain
    pub fn is_scoped(&self) -> bool {
        self.scoped & LANDLOCK_SCOPE_SIGNAL != 0
    }

    /// Allow reading and executing beneath `path`
    pub fn allow_read(&mut self, path: &Path) -> Result<()> {
        self.add_path_rule(path, READ_EXEC_ACCESS)
    }

    /// Allow everything beneath `path`
    pub fn allow_write(&mut self, path: &Path) -> Result<()> {
        self.add_path_rule(path, self.handled)
    }

    fn add_path_rule(&mut self, path: &Path, access: u64) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_PATH | libc::O_CLOEXEC)
            .open(path)
            .map_err(|e| {
                CodefortError::Landlock(format!(
                    "Failed to open path for landlock rule {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let is_dir = file.metadata().map(|m| m.is_dir()).unwrap_or(false);
        let mut allowed = access & self.handled;
        if !is_dir {
            allowed &= FILE_ACCESS;
        }

        let attr = LandlockPathBeneathAttr {
            allowed_access: allowed,
            parent_fd: file.as_raw_fd(),
        };

        let ret = unsafe {
            libc::syscall(
                libc::SYS_landlock_add_rule,
                self.fd.as_raw_fd(),
                LANDLOCK_RULE_PATH_BENEATH,
                &attr as *const LandlockPathBeneathAttr,
                0u32,
            )
        };

        if ret < 0 {
            return Err(CodefortError::Landlock(format!(
                "landlock_add_rule failed for {}: {}",
                path.display(),
                io::Error::last_os_error()
            )));
        }

        Ok(())
    }

    /// Enforce the ruleset on the calling process.
    ///
    /// Only issues `prctl` and `landlock_restrict_self`, so it is safe to
    /// call between fork and exec.
    pub fn restrict_self(&self) -> io::Result<()> {
        restrict_self_raw(self.fd.as_raw_fd())
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Enforce an already populated ruleset fd on the calling process
fn restrict_self_raw(ruleset_fd: RawFd) -> io::Result<()> {
    unsafe {
        if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::syscall(libc::SYS_landlock_restrict_self, ruleset_fd, 0u32) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
