use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod domain;
mod services;

use cli::Cli;
use domain::constants::LOG_FILTER_ENV;
use services::intercept::{terminate, OutputInterceptor, Stream};
use services::output::{ConsoleLog, DiagnosticLog};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // Routed like host output: lands in the log file while a session is active.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(|| OutputInterceptor::global().writer(Stream::Stderr))
        .try_init();
}

fn main() {
    init_tracing();

    let code = match Cli::try_parse() {
        Ok(cli) => match commands::handle_scan(&cli) {
            Ok(code) => code,
            Err(e) => {
                ConsoleLog::stderr().log(&format!("Error: {e}"));
                1
            }
        },
        Err(e) => {
            let _ = e.print();
            // --help / --version are not failures
            if e.use_stderr() {
                1
            } else {
                0
            }
        }
    };

    terminate(code)
}
