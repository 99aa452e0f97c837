//! codefort-landlock: Unprivileged filesystem sandboxing via Landlock LSM (Linux 5.13+)
//!
//! Landlock provides filesystem access control without root. Rulesets are
//! built in the parent; only the final `restrict_self` step runs in the
//! child between fork and exec.

mod ruleset;

pub use ruleset::{LandlockConfig, LandlockRuleset};
