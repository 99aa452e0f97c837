//! codefort controller CLI - Run source files in a network-isolated sandbox

mod cli;
mod commands;
mod logging;
mod runner;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{check_requirements, list_languages};
use console::style;
use runner::{RunConfig, run_file};

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let outcome = match cli.command {
        Commands::Run {
            language,
            file,
            stdin,
            compile_timeout,
            run_timeout,
            compile_memory,
            run_memory,
            json,
        } => run_file(RunConfig {
            languages: cli.languages,
            backend: cli.backend,
            output_limit: cli.output_limit,
            compile_failure: cli.compile_failure,
            tmpdir: cli.tmpdir,
            language,
            file,
            stdin,
            compile_timeout,
            run_timeout,
            compile_memory,
            run_memory,
            json,
        }),
        Commands::Languages => list_languages(&cli.languages).map_err(Into::into),
        Commands::Check => {
            check_requirements();
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
