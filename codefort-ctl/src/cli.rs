use clap::{Parser, Subcommand};
use codefort::{BackendKind, CompileFailurePolicy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codefort-ctl")]
#[command(version, about = "Compile and run untrusted code in a network-isolated sandbox", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Run a Python file, feeding it stdin from a file
    codefort-ctl run --language python main.py --stdin input.txt

    # Compile and run C with a custom catalog and tight timeouts
    codefort-ctl --languages ./languages run -l c main.c --run-timeout 2000

    # Inspect the catalog and the host
    codefort-ctl languages
    codefort-ctl check
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Language catalog directory
    #[arg(long, value_name = "DIR", default_value = "./languages", global = true)]
    pub languages: PathBuf,

    /// Isolation backend (landlock, bubblewrap, auto)
    #[arg(short, long, value_name = "BACKEND", default_value = "auto", global = true)]
    pub backend: BackendKind,

    /// Per-stream output cap (64K, 2M)
    #[arg(long, value_name = "SIZE", default_value = "2M", global = true)]
    pub output_limit: String,

    /// Run phase policy after a failed compile (run, skip)
    #[arg(long, value_name = "POLICY", default_value = "run", global = true)]
    pub compile_failure: CompileFailurePolicy,

    /// Parent directory for workspaces
    #[arg(long, value_name = "DIR", global = true)]
    pub tmpdir: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile and run one source file
    Run {
        /// Language id from the catalog
        #[arg(short, long)]
        language: String,

        /// Source file to execute
        file: PathBuf,

        /// File whose contents are fed to the program's stdin
        #[arg(long, value_name = "FILE")]
        stdin: Option<PathBuf>,

        /// Compile timeout in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 10_000)]
        compile_timeout: u64,

        /// Run timeout in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 3_000)]
        run_timeout: u64,

        /// Compile memory limit in megabytes (accepted, not enforced)
        #[arg(long, value_name = "MB", default_value_t = 512)]
        compile_memory: u64,

        /// Run memory limit in megabytes (accepted, not enforced)
        #[arg(long, value_name = "MB", default_value_t = 256)]
        run_memory: u64,

        /// Print the full response as JSON instead of raw output
        #[arg(long)]
        json: bool,
    },

    /// List languages in the catalog
    Languages,

    /// Check which isolation backends this host supports
    Check,
}
