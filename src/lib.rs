//! codefort: sandboxed execution of untrusted source code
//!
//! Given a language id and a source payload, codefort writes the code into a
//! private workspace, compiles and runs it inside an isolation boundary with
//! no network access, captures bounded output under a wall-clock timeout,
//! and removes the workspace afterwards.
//!
//! # Modules
//!
//! - **catalog**: languages loaded from `meta.json` descriptors
//! - **workspace**: per-execution scratch directories
//! - **boundary**: sandbox specs and the Landlock / bubblewrap backends
//! - **execution**: spawning, capture, timeouts
//! - **controller**: the execution coordinator
//! - **api**, **config**: HTTP wire types and server settings
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use codefort::{BackendKind, ExecutionCoordinator, LanguageCatalog, select_backend};
//!
//! let catalog = Arc::new(LanguageCatalog::load("languages")?);
//! let backend = select_backend(BackendKind::Auto)?;
//! let coordinator = ExecutionCoordinator::builder(catalog, backend).build()?;
//! let result = coordinator.execute(&request)?;
//! println!("exit code: {}", result.exit_code);
//! ```

pub mod api;
pub mod boundary;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod execution;
pub mod workspace;

pub use boundary::{
    AccessMode, Binding, BoundaryBuilder, CommandLine, SandboxBackend, SandboxSpec,
    select_backend,
};
pub use catalog::{LanguageCatalog, LanguageDescriptor};
pub use codefort_core::{BackendKind, CodefortError, ErrorKind, Result, SystemCapabilities, util};
pub use config::ServerConfig;
pub use controller::{
    CompileFailurePolicy, ExecutionCoordinator, ExecutionRequest, ExecutionResult, ExecutionState,
};
pub use execution::{PhaseResult, ProcessOrchestrator};
pub use workspace::Workspace;
