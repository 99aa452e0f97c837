//! codefort-namespace: Linux namespace isolation with user namespace support
//!
//! Provides the namespace flag set a sandbox boundary asks for, and the
//! allocation-free steps a freshly forked child runs to enter those
//! namespaces without root.

pub mod config;
pub mod user_ns;

pub use config::{NamespaceConfig, NamespaceType};
pub use user_ns::UserNamespace;
