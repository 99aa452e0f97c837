//! Error types for codefort operations

use std::io;
use thiserror::Error;

/// Result type for codefort operations
pub type Result<T> = std::result::Result<T, CodefortError>;

/// Errors that can abort an execution request.
///
/// Program-level outcomes (nonzero exit, stderr output, timeout kills) are
/// never represented here; they are reported as data in the phase results.
#[derive(Error, Debug)]
pub enum CodefortError {
    #[error("Language not found: {0}")]
    LanguageNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("Landlock error: {0}")]
    Landlock(String),

    #[error("Namespace error: {0}")]
    Namespace(String),

    #[error("Process launch failed: {0}")]
    ProcessLaunch(String),

    #[error("Invalid language catalog: {0}")]
    Catalog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable; nothing was allocated.
    Request,
    /// The engine failed while serving a valid request.
    Internal,
}

impl CodefortError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodefortError::LanguageNotFound(_) | CodefortError::InvalidRequest(_) => {
                ErrorKind::Request
            }
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_request_error(&self) -> bool {
        self.kind() == ErrorKind::Request
    }
}
