//! Entering namespaces from a forked child
//!
//! Everything that allocates happens in [`UserNamespace::prepare`], in the
//! parent. [`UserNamespace::enter`] runs between fork and exec and only
//! issues raw syscalls on the prepared buffers.
//!
//! `CLONE_NEWPID` only applies to children of the caller, so after
//! `enter` the hook calls [`UserNamespace::fork_into_pid_namespace`]: the
//! child execs as pid 1 of the new namespace while the forked-from process
//! stays behind as a silent reaper that mirrors the child's exit status.

use std::ffi::CStr;
use std::io;

use crate::config::NamespaceConfig;

const SETGROUPS: &CStr = c"/proc/self/setgroups";
const UID_MAP: &CStr = c"/proc/self/uid_map";
const GID_MAP: &CStr = c"/proc/self/gid_map";

/// Prepared namespace entry for one child process
#[derive(Debug, Clone)]
pub struct UserNamespace {
    unshare_flags: libc::c_int,
    map_user: bool,
    pid_namespace: bool,
    uid_map: Vec<u8>,
    gid_map: Vec<u8>,
    hostname: Option<Vec<u8>>,
}

impl UserNamespace {
    /// Prepare namespace entry mapping `uid`/`gid` to root inside the new
    /// user namespace.
    pub fn prepare(config: &NamespaceConfig, uid: u32, gid: u32, hostname: &str) -> Self {
        Self {
            unshare_flags: config.to_clone_flags().bits(),
            map_user: config.user,
            pid_namespace: config.pid,
            uid_map: format!("0 {} 1\n", uid).into_bytes(),
            gid_map: format!("0 {} 1\n", gid).into_bytes(),
            hostname: config.uts.then(|| hostname.as_bytes().to_vec()),
        }
    }

    pub fn flags(&self) -> libc::c_int {
        self.unshare_flags
    }

    /// Whether [`Self::enter`] leaves a pending pid namespace that only a
    /// forked child will occupy
    pub fn enters_pid_namespace(&self) -> bool {
        self.pid_namespace
    }

    /// Leave the caller's session and controlling terminal.
    ///
    /// Fails with `EPERM` if the caller already leads a process group.
    pub fn new_session() -> io::Result<()> {
        if unsafe { libc::setsid() } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Unshare the prepared namespaces and write the id maps.
    ///
    /// Must only be called in a single-threaded child between fork and exec.
    pub fn enter(&self) -> io::Result<()> {
        if unsafe { libc::unshare(self.unshare_flags) } != 0 {
            return Err(io::Error::last_os_error());
        }

        if self.map_user {
            // setgroups must be denied before an unprivileged gid_map write
            write_proc_file(SETGROUPS, b"deny")?;
            write_proc_file(UID_MAP, &self.uid_map)?;
            write_proc_file(GID_MAP, &self.gid_map)?;
        }

        if let Some(name) = &self.hostname
            && unsafe { libc::sethostname(name.as_ptr().cast(), name.len()) } != 0
        {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Fork once so the next exec runs as pid 1 of the pending pid namespace.
    ///
    /// Returns only in the child. The parent closes every descriptor, so
    /// pipes and the exec status channel belong to the child alone, then
    /// waits and exits with the child's status (128 + signal if killed).
    /// Both stay in the caller's process group.
    pub fn fork_into_pid_namespace() -> io::Result<()> {
        match unsafe { libc::fork() } {
            -1 => Err(io::Error::last_os_error()),
            0 => Ok(()),
            child => {
                unsafe {
                    libc::syscall(libc::SYS_close_range, 0u32, u32::MAX, 0u32);
                    libc::_exit(reap(child))
                }
            }
        }
    }
}

/// Wait for `pid` and translate its status into a shell-style exit code
fn reap(pid: libc::pid_t) -> libc::c_int {
    let mut status: libc::c_int = 0;
    loop {
        let ret = unsafe { libc::waitpid(pid, &mut status, 0) };
        if ret == pid {
            break;
        }
        if ret < 0 && io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
            return 1;
        }
    }

    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        1
    }
}

fn write_proc_file(path: &CStr, contents: &[u8]) -> io::Result<()> {
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_WRONLY | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let written = unsafe { libc::write(fd, contents.as_ptr().cast(), contents.len()) };
    let write_err = io::Error::last_os_error();
    unsafe { libc::close(fd) };

    if written < 0 {
        return Err(write_err);
    }
    if written as usize != contents.len() {
        return Err(io::Error::from_raw_os_error(libc::EIO));
    }
    Ok(())
}
