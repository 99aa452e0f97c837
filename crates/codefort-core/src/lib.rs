//! codefort-core: shared types, errors, and capability detection for codefort
//!
//! This crate provides the foundational types used by all codefort crates:
//! - Error types and Result alias
//! - Utility functions (PATH lookup, memory size parsing, UID/GID queries)
//! - Runtime capability detection (user namespaces, landlock, bubblewrap)
//! - Isolation backend selection

pub mod backend;
pub mod capabilities;
pub mod error;
pub mod util;

pub use backend::BackendKind;
pub use capabilities::SystemCapabilities;
pub use error::{CodefortError, ErrorKind, Result};
