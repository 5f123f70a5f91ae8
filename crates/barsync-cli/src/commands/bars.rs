use std::process::ExitCode;
use std::str::FromStr;

use barsync_core::{Bar, BarStore, Symbol, Timeframe, Warehouse};
use serde::Serialize;

use crate::cli::BarsArgs;
use crate::config::AppConfig;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct BarsOutput {
    symbol: Symbol,
    quote_currency: Symbol,
    timeframe: Timeframe,
    count: usize,
    bars: Vec<Bar>,
}

pub fn run(args: &BarsArgs, config: &AppConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let quote_currency = match &args.quote {
        Some(quote) => Symbol::parse(quote)?,
        None => config.quote_currency()?,
    };
    let timeframe = Timeframe::from_str(&args.timeframe)?;

    let warehouse = Warehouse::open(config.warehouse_config())?;
    let bars = warehouse.query(timeframe, &symbol, &quote_currency, args.limit)?;
    tracing::debug!(%symbol, %quote_currency, %timeframe, rows = bars.len(), "queried bars");

    output::render(
        &BarsOutput {
            symbol,
            quote_currency,
            timeframe,
            count: bars.len(),
            bars,
        },
        pretty,
    )?;
    Ok(ExitCode::SUCCESS)
}
