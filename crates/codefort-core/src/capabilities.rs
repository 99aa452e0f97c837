//! Runtime detection of available system capabilities
//!
//! Probes the running kernel and system configuration to determine which
//! isolation backends can be used. Detection never degrades isolation by
//! itself; callers decide whether a missing feature is fatal.

use std::path::PathBuf;

use crate::util;

/// Detected system capabilities for sandboxing
#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    /// Running as root (euid == 0)
    pub has_root: bool,
    /// Unprivileged user namespaces are available
    pub has_user_namespaces: bool,
    /// Highest Landlock ABI version supported by the kernel, if any
    pub landlock_abi: Option<u32>,
    /// Absolute path of the bubblewrap binary, if found on PATH
    pub bwrap_path: Option<PathBuf>,
}

impl SystemCapabilities {
    /// Detect all available capabilities on the current system
    pub fn detect() -> Self {
        Self {
            has_root: util::is_root(),
            has_user_namespaces: detect_user_namespaces(),
            landlock_abi: detect_landlock_abi(),
            bwrap_path: util::find_in_path("bwrap"),
        }
    }

    pub fn has_landlock(&self) -> bool {
        self.landlock_abi.is_some()
    }

    pub fn has_bubblewrap(&self) -> bool {
        self.bwrap_path.is_some()
    }

    /// The native backend needs both landlock and an unprivileged user
    /// namespace (to unshare the network without root).
    pub fn supports_landlock_backend(&self) -> bool {
        self.has_landlock() && self.has_user_namespaces
    }

    /// Get a human-readable summary of capabilities
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let check = |available: bool| if available { "[ok]" } else { "[--]" };

        lines.push(format!("{} Root privileges", check(self.has_root)));
        lines.push(format!(
            "{} User namespaces",
            check(self.has_user_namespaces)
        ));
        match self.landlock_abi {
            Some(abi) => lines.push(format!("[ok] Landlock LSM (ABI v{})", abi)),
            None => lines.push("[--] Landlock LSM".to_string()),
        }
        match &self.bwrap_path {
            Some(path) => lines.push(format!("[ok] Bubblewrap ({})", path.display())),
            None => lines.push("[--] Bubblewrap".to_string()),
        }

        lines.join("\n")
    }
}

fn detect_user_namespaces() -> bool {
    // Debian/Ubuntu knob
    if let Ok(content) = std::fs::read_to_string("/proc/sys/kernel/unprivileged_userns_clone")
        && content.trim() == "0"
    {
        return false;
    }

    if let Ok(content) = std::fs::read_to_string("/proc/sys/user/max_user_namespaces")
        && let Ok(max) = content.trim().parse::<u64>()
    {
        return max > 0;
    }

    // If we can't read the files, assume available on modern kernels
    true
}

/// Query the landlock ABI version.
///
/// With flags=LANDLOCK_CREATE_RULESET_VERSION and NULL attrs the syscall
/// returns the highest supported ABI version, not a file descriptor.
pub fn detect_landlock_abi() -> Option<u32> {
    let ret = unsafe {
        libc::syscall(
            libc::SYS_landlock_create_ruleset,
            std::ptr::null::<libc::c_void>(),
            0usize,
            1u32, // LANDLOCK_CREATE_RULESET_VERSION
        )
    };

    if ret > 0 { Some(ret as u32) } else { None }
}
