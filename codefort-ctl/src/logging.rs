use console::style;
use env_logger::{Builder, Env};
use log::Level;
use std::io::Write;

/// Initialize logger; `RUST_LOG` wins over the verbose flag
pub fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };

    Builder::from_env(Env::default().default_filter_or(default))
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => style("ERROR").red().bold(),
                Level::Warn => style("WARN ").yellow().bold(),
                Level::Info => style("INFO ").green(),
                Level::Debug => style("DEBUG").cyan(),
                Level::Trace => style("TRACE").dim(),
            };
            writeln!(buf, "{} {}", level, record.args())
        })
        .init();
}
