mod bars;
mod sync;

use std::process::ExitCode;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Sync(args) => sync::run(args, &config, cli.pretty).await,
        Command::Bars(args) => bars::run(args, &config, cli.pretty),
    }
}
