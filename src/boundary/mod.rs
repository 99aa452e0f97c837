//! Sandbox boundary: which host paths a sandboxed command may see or write,
//! and which namespaces it is isolated in.
//!
//! A [`SandboxSpec`] is a plain value built fresh for every phase. Backends
//! translate it into a concrete command; nothing in here knows how the
//! boundary is enforced.

mod backend;
mod bubblewrap;
mod landlock;

pub use backend::{CommandLine, SandboxBackend, sandbox_env, select_backend};
pub use bubblewrap::BubblewrapBackend;
pub use landlock::LandlockBackend;

use std::fs;
use std::path::{Path, PathBuf};

use codefort_namespace::NamespaceConfig;
use log::debug;

use crate::catalog::LanguageDescriptor;

/// System directories every sandbox can read and execute from
pub const BASELINE_READ_ONLY: &[&str] = &["/usr", "/lib", "/lib64", "/bin", "/dev", "/proc", "/etc"];

/// How a binding may be accessed from inside the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read and execute
    ReadOnly,
    /// Read, write, create, delete and execute
    ReadWrite,
}

/// A host path exposed at the same location inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub path: PathBuf,
    pub mode: AccessMode,
}

impl Binding {
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: AccessMode::ReadOnly,
        }
    }

    pub fn read_write(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: AccessMode::ReadWrite,
        }
    }
}

/// Complete isolation description for one subprocess.
///
/// Invariants: exactly one read-write binding, placed last, which is also
/// the working directory; network isolation is always enabled.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    bindings: Vec<Binding>,
    namespaces: NamespaceConfig,
    workdir: PathBuf,
}

impl SandboxSpec {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn namespaces(&self) -> &NamespaceConfig {
        &self.namespaces
    }

    /// The workspace: working directory and single writable path
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn read_only_paths(&self) -> impl Iterator<Item = &Path> {
        self.bindings
            .iter()
            .filter(|b| b.mode == AccessMode::ReadOnly)
            .map(|b| b.path.as_path())
    }

    pub fn read_write_paths(&self) -> impl Iterator<Item = &Path> {
        self.bindings
            .iter()
            .filter(|b| b.mode == AccessMode::ReadWrite)
            .map(|b| b.path.as_path())
    }
}

/// Builds the least-privilege [`SandboxSpec`] for a language and workspace
#[derive(Debug, Clone)]
pub struct BoundaryBuilder {
    catalog_root: PathBuf,
    temp_root: Option<PathBuf>,
    namespaces: NamespaceConfig,
}

impl BoundaryBuilder {
    /// `workspace_root` is the directory workspaces are created in. The
    /// system temp root is granted read-only only when workspaces do not
    /// live beneath it, so no sandbox can read a sibling's workspace.
    pub fn new(catalog_root: &Path, workspace_root: &Path) -> Self {
        let temp_root = canonical(&std::env::temp_dir());
        let workspace_root = canonical(workspace_root);
        let temp_root = (!workspace_root.starts_with(&temp_root)).then_some(temp_root);
        if temp_root.is_none() {
            debug!(
                "workspaces live under the temp root; not exposing {} to sandboxes",
                workspace_root.display()
            );
        }

        Self {
            catalog_root: canonical(catalog_root),
            temp_root,
            namespaces: NamespaceConfig::default(),
        }
    }

    /// Whether the system temp root is part of the read-only baseline
    pub fn exposes_temp_root(&self) -> bool {
        self.temp_root.is_some()
    }

    /// Build the boundary for one phase of `language` inside `workspace`.
    pub fn build(&self, language: &LanguageDescriptor, workspace: &Path) -> SandboxSpec {
        let mut bindings = Vec::new();

        let read_only = BASELINE_READ_ONLY
            .iter()
            .map(PathBuf::from)
            .chain(self.temp_root.iter().cloned())
            .chain(std::iter::once(self.catalog_root.clone()))
            .chain(language.needed_dirs.iter().cloned());

        for path in read_only {
            if !path.exists() {
                debug!("skipping missing read-only path {}", path.display());
                continue;
            }
            if path == workspace || bindings.iter().any(|b: &Binding| b.path == path) {
                continue;
            }
            bindings.push(Binding::read_only(path));
        }

        bindings.push(Binding::read_write(workspace));

        SandboxSpec {
            bindings,
            namespaces: self.namespaces.clone(),
            workdir: workspace.to_path_buf(),
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
