//! Wire types for the HTTP service and CLI output

use serde::{Deserialize, Serialize};

use crate::catalog::LanguageDescriptor;
use crate::controller::ExecutionResult;

/// Project homepage advertised by the service root
pub const HELP_URL: &str = "https://github.com/webdev03/codefort";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stats: ExecutionStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// `null` when the language has no compile step
    pub compile: Option<CompileStats>,
    pub run: RunStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileStats {
    pub real_time: u64,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub real_time: u64,
}

impl From<&ExecutionResult> for ExecutionResponse {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            exit_code: result.exit_code,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            stats: ExecutionStats {
                compile: result.compile.as_ref().map(|c| CompileStats {
                    real_time: c.real_time_ms(),
                    stdout: c.stdout.clone(),
                    stderr: c.stderr.clone(),
                }),
                run: RunStats {
                    real_time: result.run.as_ref().map_or(0, |r| r.real_time_ms()),
                },
            },
        }
    }
}

/// One entry of the language listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub id: String,
    pub name: String,
    pub compiled: bool,
}

impl From<&LanguageDescriptor> for LanguageInfo {
    fn from(language: &LanguageDescriptor) -> Self {
        Self {
            id: language.id.clone(),
            name: language.name.clone(),
            compiled: language.has_compile_step(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub help: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "Codefort".to_string(),
            help: HELP_URL.to_string(),
        }
    }
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
