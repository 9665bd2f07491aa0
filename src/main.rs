use clap::Parser;
use std::process::ExitCode;
use tidyplan::cli::{Cli, run_cli};
use tidyplan::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = OutputFormatter::new(cli.quiet);

    match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            out.error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}
