mod cli;
mod commands;
mod error;
mod logging;
mod metadata;
mod offline;
mod output;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging(&logging::filter_from_env());

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let envelope = commands::run(&cli).await?;
    output::render(&envelope, cli.pretty)?;

    if !envelope.errors.is_empty() {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
