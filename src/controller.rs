//! Execution coordinator
//!
//! Sequences one request: resolve the language, prepare a workspace, run the
//! optional compile phase and the run phase, then tear the workspace down.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use codefort_core::util;
use codefort_core::{CodefortError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::boundary::{BoundaryBuilder, CommandLine, SandboxBackend};
use crate::catalog::{LanguageCatalog, LanguageDescriptor};
use crate::execution::{DEFAULT_OUTPUT_LIMIT, PhaseResult, ProcessOrchestrator};
use crate::workspace::Workspace;

/// One execution request as received from a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Language id, matched case-insensitively
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub stdin: String,
    /// Milliseconds
    pub compile_timeout: u64,
    /// Megabytes; accepted but not enforced
    pub compile_memory_limit: u64,
    /// Milliseconds
    pub run_timeout: u64,
    /// Megabytes; accepted but not enforced
    pub run_memory_limit: u64,
}

impl ExecutionRequest {
    /// Reject zero timeouts and memory limits.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("compileTimeout", self.compile_timeout),
            ("runTimeout", self.run_timeout),
            ("compileMemoryLimit", self.compile_memory_limit),
            ("runMemoryLimit", self.run_memory_limit),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(CodefortError::InvalidRequest(format!(
                    "{} must be greater than zero",
                    field
                )));
            }
        }
        Ok(())
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout)
    }
}

/// What to do with the run phase after a compile phase exits nonzero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileFailurePolicy {
    /// Run regardless; the caller sees both phase results
    #[default]
    RunAnyway,
    /// Skip the run phase and report the compile exit code
    SkipRun,
}

impl FromStr for CompileFailurePolicy {
    type Err = CodefortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "run" | "run-anyway" => Ok(Self::RunAnyway),
            "skip" | "skip-run" => Ok(Self::SkipRun),
            other => Err(CodefortError::InvalidConfig(format!(
                "Unknown compile failure policy: {} (expected run or skip)",
                other
            ))),
        }
    }
}

/// Lifecycle of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Initializing,
    WorkspacePrepared,
    Compiling,
    Compiled,
    CompileSkipped,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Initializing => "initializing",
            ExecutionState::WorkspacePrepared => "workspace-prepared",
            ExecutionState::Compiling => "compiling",
            ExecutionState::Compiled => "compiled",
            ExecutionState::CompileSkipped => "compile-skipped",
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Run exit code, or the compile exit code when the run was skipped
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the language has no compile step
    pub compile: Option<PhaseResult>,
    /// `None` only when a failed compile skipped the run
    pub run: Option<PhaseResult>,
}

impl ExecutionResult {
    fn assemble(compile: Option<PhaseResult>, run: Option<PhaseResult>) -> Self {
        match (&run, &compile) {
            (Some(r), _) => Self {
                exit_code: r.exit_code,
                stdout: r.stdout.clone(),
                stderr: r.stderr.clone(),
                compile,
                run,
            },
            (None, Some(c)) => Self {
                exit_code: c.exit_code,
                stdout: String::new(),
                stderr: String::new(),
                compile,
                run,
            },
            (None, None) => Self {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                compile,
                run,
            },
        }
    }

    pub fn timed_out(&self) -> bool {
        self.run.as_ref().is_some_and(|r| r.timed_out)
            || self.compile.as_ref().is_some_and(|c| c.timed_out)
    }
}

/// Tracks and logs state transitions for one execution
struct Tracker<'a> {
    language: &'a str,
    state: ExecutionState,
}

impl<'a> Tracker<'a> {
    fn new(language: &'a str) -> Self {
        Self {
            language,
            state: ExecutionState::Initializing,
        }
    }

    fn advance(&mut self, next: ExecutionState) {
        debug!("[{}] {} -> {}", self.language, self.state, next);
        self.state = next;
    }
}

/// Runs execution requests against a language catalog.
///
/// Holds no per-request state; `execute` may be called from many threads.
#[derive(Debug, Clone)]
pub struct ExecutionCoordinator {
    catalog: Arc<LanguageCatalog>,
    boundary: BoundaryBuilder,
    orchestrator: ProcessOrchestrator,
    shell: PathBuf,
    workspace_root: PathBuf,
    compile_failure: CompileFailurePolicy,
}

impl ExecutionCoordinator {
    pub fn builder(
        catalog: Arc<LanguageCatalog>,
        backend: Arc<dyn SandboxBackend>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            catalog,
            backend,
            workspace_root: None,
            output_limit: DEFAULT_OUTPUT_LIMIT,
            compile_failure: CompileFailurePolicy::default(),
            shell: None,
        }
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn compile_failure_policy(&self) -> CompileFailurePolicy {
        self.compile_failure
    }

    /// Execute one request.
    ///
    /// Errors are engine failures only; a failing or killed program is
    /// reported inside the returned result.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let mut tracker = Tracker::new(&request.language);

        let outcome = self
            .prepare(request)
            .and_then(|language| self.execute_language(language, request, &mut tracker));

        match &outcome {
            Ok(result) => {
                tracker.advance(ExecutionState::Completed);
                info!(
                    "[{}] completed with exit code {}{}",
                    request.language,
                    result.exit_code,
                    if result.timed_out() { " (timed out)" } else { "" }
                );
            }
            Err(e) => {
                tracker.advance(ExecutionState::Failed);
                warn!("[{}] execution failed: {}", request.language, e);
            }
        }
        outcome
    }

    /// Everything that must succeed before any filesystem side effect
    fn prepare(&self, request: &ExecutionRequest) -> Result<&LanguageDescriptor> {
        let language = self.catalog.lookup(&request.language)?;
        request.validate()?;
        debug!(
            "[{}] memory limits accepted but not enforced: compile {} MB, run {} MB",
            language.id, request.compile_memory_limit, request.run_memory_limit
        );
        Ok(language)
    }

    fn execute_language(
        &self,
        language: &LanguageDescriptor,
        request: &ExecutionRequest,
        tracker: &mut Tracker<'_>,
    ) -> Result<ExecutionResult> {
        let workspace = Workspace::create(&self.workspace_root)?;
        let outcome = self.run_phases(language, request, &workspace, tracker);
        workspace.destroy();
        outcome
    }

    fn run_phases(
        &self,
        language: &LanguageDescriptor,
        request: &ExecutionRequest,
        workspace: &Workspace,
        tracker: &mut Tracker<'_>,
    ) -> Result<ExecutionResult> {
        workspace.write_source(&language.file_name, &request.code)?;
        tracker.advance(ExecutionState::WorkspacePrepared);

        let compile = match &language.compile_path {
            Some(script) => {
                tracker.advance(ExecutionState::Compiling);
                let spec = self.boundary.build(language, workspace.path());
                let result = self.orchestrator.run(
                    &spec,
                    &self.script_command(script),
                    "",
                    request.compile_timeout(),
                )?;
                tracker.advance(ExecutionState::Compiled);
                Some(result)
            }
            None => {
                tracker.advance(ExecutionState::CompileSkipped);
                None
            }
        };

        if let Some(compiled) = &compile
            && !compiled.success()
            && self.compile_failure == CompileFailurePolicy::SkipRun
        {
            debug!(
                "[{}] compile exited with {}, skipping run",
                language.id, compiled.exit_code
            );
            return Ok(ExecutionResult::assemble(compile, None));
        }

        tracker.advance(ExecutionState::Running);
        let spec = self.boundary.build(language, workspace.path());
        let run = self.orchestrator.run(
            &spec,
            &self.script_command(&language.run_path),
            &request.stdin,
            request.run_timeout(),
        )?;

        Ok(ExecutionResult::assemble(compile, Some(run)))
    }

    fn script_command(&self, script: &Path) -> CommandLine {
        CommandLine::new(&self.shell).arg(script)
    }
}

/// Builder for [`ExecutionCoordinator`]
pub struct CoordinatorBuilder {
    catalog: Arc<LanguageCatalog>,
    backend: Arc<dyn SandboxBackend>,
    workspace_root: Option<PathBuf>,
    output_limit: usize,
    compile_failure: CompileFailurePolicy,
    shell: Option<PathBuf>,
}

impl CoordinatorBuilder {
    /// Directory workspaces are created in (default: system temp dir)
    pub fn workspace_root(mut self, path: impl AsRef<Path>) -> Self {
        self.workspace_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Per-stream output cap in bytes
    pub fn output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    pub fn compile_failure(mut self, policy: CompileFailurePolicy) -> Self {
        self.compile_failure = policy;
        self
    }

    /// Interpreter for language scripts (default: `bash` from PATH)
    pub fn shell(mut self, path: impl AsRef<Path>) -> Self {
        self.shell = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<ExecutionCoordinator> {
        if self.output_limit == 0 {
            return Err(CodefortError::InvalidConfig(
                "output limit must be greater than zero".to_string(),
            ));
        }

        let shell = match self.shell {
            Some(shell) => shell,
            None => util::find_in_path("bash").ok_or_else(|| {
                CodefortError::ProcessLaunch("bash not found on PATH".to_string())
            })?,
        };
        if !shell.is_absolute() {
            return Err(CodefortError::InvalidConfig(format!(
                "shell must be an absolute path: {}",
                shell.display()
            )));
        }

        let workspace_root = self.workspace_root.unwrap_or_else(std::env::temp_dir);
        let boundary = BoundaryBuilder::new(self.catalog.root(), &workspace_root);

        Ok(ExecutionCoordinator {
            catalog: self.catalog,
            boundary,
            orchestrator: ProcessOrchestrator::new(self.backend, self.output_limit),
            shell,
            workspace_root,
            compile_failure: self.compile_failure,
        })
    }
}
