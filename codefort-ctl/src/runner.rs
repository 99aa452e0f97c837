use codefort::api::ExecutionResponse;
use codefort::util::parse_memory_size;
use codefort::{
    BackendKind, CompileFailurePolicy, ExecutionCoordinator, ExecutionRequest, ExecutionResult,
    LanguageCatalog, select_backend,
};
use console::style;
use log::{debug, info};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one command-line execution
pub struct RunConfig {
    pub languages: PathBuf,
    pub backend: BackendKind,
    pub output_limit: String,
    pub compile_failure: CompileFailurePolicy,
    pub tmpdir: Option<PathBuf>,
    pub language: String,
    pub file: PathBuf,
    pub stdin: Option<PathBuf>,
    pub compile_timeout: u64,
    pub run_timeout: u64,
    pub compile_memory: u64,
    pub run_memory: u64,
    pub json: bool,
}

impl RunConfig {
    fn request(&self) -> Result<ExecutionRequest, Box<dyn std::error::Error>> {
        let code = std::fs::read_to_string(&self.file)
            .map_err(|e| format!("cannot read {}: {}", self.file.display(), e))?;
        let stdin = match &self.stdin {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?,
            None => String::new(),
        };
        Ok(ExecutionRequest {
            language: self.language.clone(),
            code,
            stdin,
            compile_timeout: self.compile_timeout,
            compile_memory_limit: self.compile_memory,
            run_timeout: self.run_timeout,
            run_memory_limit: self.run_memory,
        })
    }

    fn coordinator(&self) -> codefort::Result<ExecutionCoordinator> {
        let output_limit = usize::try_from(parse_memory_size(&self.output_limit)?)
            .map_err(|_| codefort::CodefortError::InvalidConfig("output limit too large".into()))?;

        let catalog = Arc::new(LanguageCatalog::load(&self.languages)?);
        debug!(
            "Loaded {} language(s) from {}",
            catalog.len(),
            catalog.root().display()
        );
        let backend = select_backend(self.backend)?;
        debug!("Using {} backend", backend.name());

        let mut builder = ExecutionCoordinator::builder(catalog, backend)
            .output_limit(output_limit)
            .compile_failure(self.compile_failure);
        if let Some(dir) = &self.tmpdir {
            debug!("Using workspace root: {:?}", dir);
            builder = builder.workspace_root(dir);
        }
        builder.build()
    }
}

/// Execute one file and exit with the program's exit code
pub fn run_file(config: RunConfig) -> Result<(), Box<dyn std::error::Error>> {
    let request = config.request()?;
    let coordinator = config.coordinator()?;

    info!("Executing {} as {}", config.file.display(), request.language);
    let result = coordinator.execute(&request)?;

    if config.json {
        let response = ExecutionResponse::from(&result);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_raw(&result)?;
        print_summary(&result);
    }

    std::process::exit(result.exit_code);
}

fn print_raw(result: &ExecutionResult) -> std::io::Result<()> {
    if let Some(compile) = &result.compile
        && !compile.success()
    {
        eprint!("{}", compile.stderr);
    }
    std::io::stdout().write_all(result.stdout.as_bytes())?;
    std::io::stderr().write_all(result.stderr.as_bytes())?;
    std::io::stdout().flush()
}

fn print_summary(result: &ExecutionResult) {
    let exit_code_styled = if result.exit_code == 0 {
        style(result.exit_code).green().bold()
    } else {
        style(result.exit_code).red().bold()
    };

    let mut line = format!("{}={}", style("exit_code").dim(), exit_code_styled);
    if let Some(compile) = &result.compile {
        line.push_str(&format!(
            " | {}={}",
            style("compile_ms").dim(),
            style(compile.real_time_ms()).bold()
        ));
    }
    match &result.run {
        Some(run) => line.push_str(&format!(
            " | {}={}",
            style("run_ms").dim(),
            style(run.real_time_ms()).bold()
        )),
        None => line.push_str(&format!(" | {}", style("run skipped").yellow())),
    }
    if result.timed_out() {
        line.push_str(&format!(
            " | {}={}",
            style("timed_out").red(),
            style("true").red().bold()
        ));
    }

    eprintln!("{}", line);
}
