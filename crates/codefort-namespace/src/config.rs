//! Namespace flags for sandbox isolation

use nix::sched::CloneFlags;

/// Namespace types that can be isolated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceType {
    User,
    Net,
    Pid,
    Ipc,
    Uts,
}

/// Configuration for namespace isolation.
///
/// `net` is never optional for sandboxed code: [`NamespaceConfig::validate`]
/// rejects any configuration that would share the host network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub user: bool,
    pub net: bool,
    pub pid: bool,
    pub ipc: bool,
    pub uts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self::all()
    }
}

impl NamespaceConfig {
    /// All namespaces enabled
    pub fn all() -> Self {
        Self {
            user: true,
            net: true,
            pid: true,
            ipc: true,
            uts: true,
        }
    }

    /// Only what every backend can deliver: a user namespace (for
    /// unprivileged operation) and a private network.
    pub fn network_only() -> Self {
        Self {
            user: true,
            net: true,
            pid: false,
            ipc: false,
            uts: false,
        }
    }

    /// Convert to clone/unshare flags
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.user {
            flags |= CloneFlags::CLONE_NEWUSER;
        }
        if self.net {
            flags |= CloneFlags::CLONE_NEWNET;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.ipc {
            flags |= CloneFlags::CLONE_NEWIPC;
        }
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        flags
    }

    pub fn is_enabled(&self, ns: NamespaceType) -> bool {
        match ns {
            NamespaceType::User => self.user,
            NamespaceType::Net => self.net,
            NamespaceType::Pid => self.pid,
            NamespaceType::Ipc => self.ipc,
            NamespaceType::Uts => self.uts,
        }
    }

    pub fn enabled_count(&self) -> usize {
        [self.user, self.net, self.pid, self.ipc, self.uts]
            .iter()
            .filter(|&&x| x)
            .count()
    }

    /// Reject configurations that would let sandboxed code reach the network.
    pub fn validate(&self) -> codefort_core::Result<()> {
        if !self.net {
            return Err(codefort_core::CodefortError::Namespace(
                "network namespace isolation cannot be disabled".to_string(),
            ));
        }
        Ok(())
    }
}
