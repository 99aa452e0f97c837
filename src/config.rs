//! Server configuration from `CODEFORT_*` environment variables

use std::path::PathBuf;

use codefort_core::util::parse_memory_size;
use codefort_core::{BackendKind, CodefortError, Result};

use crate::controller::CompileFailurePolicy;
use crate::execution::DEFAULT_OUTPUT_LIMIT;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LANGUAGES_DIR: &str = "./languages";

/// Settings for `codefort-server`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    pub languages_dir: PathBuf,
    pub backend: BackendKind,
    /// Per-stream output cap in bytes
    pub output_limit: usize,
    pub compile_failure: CompileFailurePolicy,
    /// Workspace parent; system temp dir when unset
    pub temp_root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            languages_dir: PathBuf::from(DEFAULT_LANGUAGES_DIR),
            backend: BackendKind::default(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
            compile_failure: CompileFailurePolicy::default(),
            temp_root: None,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or blank keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = get("CODEFORT_BIND") {
            config.bind = bind.trim().to_string();
        }
        if let Some(dir) = get("CODEFORT_LANGUAGES_DIR") {
            config.languages_dir = PathBuf::from(dir);
        }
        if let Some(backend) = get("CODEFORT_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(limit) = get("CODEFORT_OUTPUT_LIMIT") {
            config.output_limit = usize::try_from(parse_memory_size(&limit)?).map_err(|_| {
                CodefortError::InvalidConfig(format!("output limit too large: {}", limit))
            })?;
        }
        if let Some(policy) = get("CODEFORT_COMPILE_FAILURE") {
            config.compile_failure = policy.parse()?;
        }
        if let Some(dir) = get("CODEFORT_TMPDIR") {
            config.temp_root = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind.is_empty() {
            return Err(CodefortError::InvalidConfig(
                "bind address cannot be empty".to_string(),
            ));
        }
        if self.output_limit == 0 {
            return Err(CodefortError::InvalidConfig(
                "output limit must be greater than zero".to_string(),
            ));
        }
        if let Some(root) = &self.temp_root
            && !root.is_absolute()
        {
            return Err(CodefortError::InvalidConfig(format!(
                "CODEFORT_TMPDIR must be absolute: {}",
                root.display()
            )));
        }
        Ok(())
    }

    /// Directory new workspaces are created in
    pub fn workspace_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
