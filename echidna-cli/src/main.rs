//! `echidna` -- plugin registry vulnerability scanner.

mod cli;
mod error;
mod error_log;
mod logging;
mod metrics_server;
mod output;
mod runner;

use clap::Parser;

use echidna_core::EchidnaConfig;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = EchidnaConfig::load_or_default(&cli.config).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    logging::init_tracing(&config.general).map_err(|e| CliError::Setup(e.to_string()))?;
    tracing::info!(config = %cli.config.display(), "echidna starting");

    let writer = OutputWriter::new(cli.output);
    let report = runner::run(config, &writer).await?;
    writer.render(&report)?;
    Ok(())
}
