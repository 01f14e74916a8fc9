use anyhow::Result;
use clap::Parser; // needed for Cli::parse()
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use edkarma_app::cli::commands::{error_reporter, run_cli};
use edkarma_app::cli::opts::Cli;
use edkarma_core::KarmaError;

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<KarmaError>() {
                Some(karma) => {
                    tracing::info!(error = %karma, "store operation failed");
                    error_reporter().report(karma.kind());
                }
                None => eprintln!("edkarma: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let rt = Runtime::new()?;
    rt.block_on(run_cli(args))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
