//! rex CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

fn main() {
    // Usage errors exit 1; --help and --version exit 0.
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize logging based on RUST_LOG or default to warn
    init_logging();

    tracing::debug!(version = rex::VERSION, "starting rex");

    match cli.run() {
        Ok(status) => {
            tracing::debug!(%status, "remote command finished");
            std::process::exit(status.code());
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("rex: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr; stdout carries the remote command's output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rex=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
