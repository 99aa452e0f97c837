//! Per-execution scratch directories
//!
//! Every execution gets a fresh, uniquely named directory that is the only
//! writable location inside its sandbox. The directory is removed when the
//! execution finishes, on every path.

use std::fs;
use std::path::{Path, PathBuf};

use codefort_core::{CodefortError, Result};
use log::{debug, warn};
use tempfile::TempDir;

/// Prefix of every workspace directory name
pub const WORKSPACE_PREFIX: &str = "codefort-exec-";

/// A private scratch directory owned by a single execution
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a new, empty workspace beneath `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| {
                CodefortError::Workspace(format!(
                    "Failed to create workspace in {}: {}",
                    root.display(),
                    e
                ))
            })?;
        let path = dir.path().to_path_buf();
        debug!("created workspace {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the submitted source into the workspace.
    ///
    /// `file_name` must be a bare name; catalog load guarantees this for
    /// descriptor file names.
    pub fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf> {
        let target = self.path.join(file_name);
        if target.parent() != Some(self.path.as_path()) {
            return Err(CodefortError::Workspace(format!(
                "source file name escapes the workspace: {}",
                file_name
            )));
        }

        fs::write(&target, code).map_err(|e| {
            CodefortError::Workspace(format!("Failed to write {}: {}", target.display(), e))
        })?;
        Ok(target)
    }

    /// Recursively remove the workspace.
    ///
    /// Failures are logged, never returned: a cleanup problem must not mask
    /// the execution result.
    pub fn destroy(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => debug!("removed workspace {}", self.path.display()),
            Err(e) => warn!("Failed to remove workspace {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
