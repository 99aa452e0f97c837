//! Execution layer: running sandboxed phases
//!
//! - **process**: spawn through a backend, timeout, process-group kill
//! - **capture**: bounded, concurrently drained stdout/stderr

pub mod capture;
pub mod process;

pub use capture::{Captured, OutputCapture};
pub use process::{DEFAULT_OUTPUT_LIMIT, PhaseResult, ProcessOrchestrator, exit_code_of};
