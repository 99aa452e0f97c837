//! Shared fixtures for the integration and stress tests

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use codefort::workspace::WORKSPACE_PREFIX;
use codefort::{
    CommandLine, ExecutionCoordinator, ExecutionRequest, LanguageCatalog, SandboxBackend,
    SandboxSpec,
};
use tempfile::TempDir;

/// Runs commands with the sandbox environment but no confinement, so the
/// coordinator can be exercised on hosts without landlock or bwrap.
#[derive(Debug)]
pub struct Unconfined;

impl SandboxBackend for Unconfined {
    fn name(&self) -> &'static str {
        "unconfined"
    }

    fn command(&self, spec: &SandboxSpec, command: &CommandLine) -> codefort::Result<Command> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .env_clear()
            .envs(codefort::boundary::sandbox_env(spec.workdir()))
            .current_dir(spec.workdir())
            .process_group(0);
        Ok(cmd)
    }
}

/// A language catalog plus a private workspace root, both removed on drop
pub struct Fixture {
    pub catalog_dir: TempDir,
    pub workspace_root: TempDir,
    pub catalog: Arc<LanguageCatalog>,
}

fn script(path: &Path, body: &str) {
    std::fs::write(path, format!("{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn language(root: &Path, id: &str, file_name: &str, compile: Option<&str>, run: &str) {
    let dir = root.join(id);
    std::fs::create_dir(&dir).unwrap();
    script(&dir.join("run.sh"), run);

    let mut meta = serde_json::json!({
        "name": id,
        "fileName": file_name,
        "runScript": "run.sh",
    });
    if let Some(body) = compile {
        script(&dir.join("compile.sh"), body);
        meta["compileScript"] = "compile.sh".into();
    }
    std::fs::write(dir.join("meta.json"), meta.to_string()).unwrap();
}

impl Fixture {
    pub fn new() -> Self {
        let catalog_dir = tempfile::tempdir().unwrap();
        let root = catalog_dir.path();

        language(root, "bash", "main.sh", None, "bash main.sh");
        language(root, "passthrough", "input.txt", None, "cat");
        language(
            root,
            "copied",
            "main.sh",
            Some("cp main.sh program.sh && echo compiled"),
            "bash program.sh",
        );
        language(
            root,
            "broken",
            "main.sh",
            Some("echo 'syntax error' >&2; exit 3"),
            "echo ran anyway",
        );

        let catalog = Arc::new(LanguageCatalog::load(root).unwrap());
        Self {
            catalog_dir,
            workspace_root: tempfile::tempdir().unwrap(),
            catalog,
        }
    }

    pub fn coordinator(&self, backend: Arc<dyn SandboxBackend>) -> ExecutionCoordinator {
        ExecutionCoordinator::builder(self.catalog.clone(), backend)
            .workspace_root(self.workspace_root.path())
            .build()
            .unwrap()
    }

    pub fn unconfined(&self) -> ExecutionCoordinator {
        self.coordinator(Arc::new(Unconfined))
    }

    /// Workspaces still present under the workspace root
    pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.workspace_root.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(WORKSPACE_PREFIX)
            })
            .map(|entry| entry.path())
            .collect()
    }
}

pub fn request(language: &str, code: &str) -> ExecutionRequest {
    ExecutionRequest {
        language: language.to_string(),
        code: code.to_string(),
        stdin: String::new(),
        compile_timeout: 10_000,
        compile_memory_limit: 512,
        run_timeout: 10_000,
        run_memory_limit: 256,
    }
}
