//! Isolation backend selection

use std::fmt;
use std::str::FromStr;

use crate::capabilities::SystemCapabilities;
use crate::error::{CodefortError, Result};

/// Which isolation mechanism executes sandboxed commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Native: user/net/ipc/uts namespaces via unshare plus a landlock ruleset.
    /// Needs Linux 5.13+ and unprivileged user namespaces.
    Landlock,

    /// External `bwrap` binary with fresh mount, pid and network namespaces.
    Bubblewrap,

    /// Prefer landlock, fall back to bubblewrap. Never falls back to no sandbox.
    #[default]
    Auto,
}

/// A resolved (non-Auto) backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBackend {
    Landlock,
    Bubblewrap,
}

impl BackendKind {
    /// Resolve to a concrete backend, failing if the host cannot provide it.
    pub fn resolve(&self, caps: &SystemCapabilities) -> Result<ResolvedBackend> {
        match self {
            BackendKind::Landlock => {
                if !caps.has_landlock() {
                    return Err(CodefortError::SandboxUnavailable(
                        "Landlock is not available on this kernel (requires Linux 5.13+)"
                            .to_string(),
                    ));
                }
                if !caps.has_user_namespaces {
                    return Err(CodefortError::SandboxUnavailable(
                        "unprivileged user namespaces are disabled".to_string(),
                    ));
                }
                Ok(ResolvedBackend::Landlock)
            }
            BackendKind::Bubblewrap => {
                if caps.has_bubblewrap() {
                    Ok(ResolvedBackend::Bubblewrap)
                } else {
                    Err(CodefortError::SandboxUnavailable(
                        "bwrap not found on PATH".to_string(),
                    ))
                }
            }
            BackendKind::Auto => {
                if caps.supports_landlock_backend() {
                    Ok(ResolvedBackend::Landlock)
                } else if caps.has_bubblewrap() {
                    Ok(ResolvedBackend::Bubblewrap)
                } else {
                    Err(CodefortError::SandboxUnavailable(
                        "neither landlock with user namespaces nor bwrap is available".to_string(),
                    ))
                }
            }
        }
    }
}

impl FromStr for BackendKind {
    type Err = CodefortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "landlock" => Ok(BackendKind::Landlock),
            "bubblewrap" | "bwrap" => Ok(BackendKind::Bubblewrap),
            "auto" => Ok(BackendKind::Auto),
            other => Err(CodefortError::InvalidConfig(format!(
                "Unknown isolation backend: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedBackend::Landlock => write!(f, "landlock"),
            ResolvedBackend::Bubblewrap => write!(f, "bubblewrap"),
        }
    }
}
