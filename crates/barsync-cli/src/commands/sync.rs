use std::process::ExitCode;
use std::sync::Arc;

use barsync_core::{
    CryptoCompareClient, FetchScope, JobSpec, Pipeline, PipelineReport, Symbol, Timeframe,
    Warehouse,
};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::cli::SyncArgs;
use crate::config::AppConfig;
use crate::error::CliError;
use crate::output;

/// Exit code when some jobs were dropped or failed to save.
const EXIT_INCOMPLETE: u8 = 3;

#[derive(Debug, Serialize)]
struct SyncOutput {
    run_id: Uuid,
    mode: &'static str,
    quote_currency: Symbol,
    symbols: Vec<Symbol>,
    report: PipelineReport,
}

pub async fn run(args: &SyncArgs, config: &AppConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let symbols = config.trading_symbols()?;
    let quote_currency = config.quote_currency()?;
    let pipeline_config = config.pipeline_config()?;
    let warehouse = Warehouse::open(config.warehouse_config())?;

    let section = &config.cryptocompare;
    if section.api_key.is_empty() {
        tracing::warn!("no CryptoCompare API key configured, requests may be rate limited");
    }
    let mut client =
        CryptoCompareClient::new(section.api_key.as_str()).with_timeout_ms(section.timeout_ms);
    if let Some(base_url) = &section.base_url {
        client = client.with_base_url(base_url.as_str());
    }

    let jobs = build_jobs(&symbols, &quote_currency, args.fetch_all, config);
    let run_id = Uuid::new_v4();
    let mode = if args.fetch_all { "full_history" } else { "recent" };

    let span = tracing::info_span!("sync", %run_id, mode);
    let report = async {
        tracing::info!(
            jobs = jobs.len(),
            symbols = ?symbols.iter().map(Symbol::as_str).collect::<Vec<_>>(),
            warehouse = %warehouse.db_path().display(),
            "starting sync"
        );
        let pipeline = Pipeline::new(Arc::new(client), Arc::new(warehouse), pipeline_config);
        let report = pipeline.run(jobs).await;
        tracing::info!(?report, "sync finished");
        report
    }
    .instrument(span)
    .await;

    output::render(
        &SyncOutput {
            run_id,
            mode,
            quote_currency,
            symbols,
            report,
        },
        pretty,
    )?;

    if report.dropped > 0 || report.save_failed > 0 {
        return Ok(ExitCode::from(EXIT_INCOMPLETE));
    }
    Ok(ExitCode::SUCCESS)
}

/// One job per symbol and timeframe, timeframes in sync order.
fn build_jobs(
    symbols: &[Symbol],
    quote_currency: &Symbol,
    fetch_all: bool,
    config: &AppConfig,
) -> Vec<JobSpec> {
    symbols
        .iter()
        .flat_map(|symbol| {
            Timeframe::SYNC_ORDER.into_iter().map(move |timeframe| JobSpec {
                symbol: symbol.clone(),
                quote_currency: quote_currency.clone(),
                timeframe,
                scope: if fetch_all {
                    FetchScope::FullHistory
                } else {
                    config.recent_scope(timeframe)
                },
            })
        })
        .collect()
}
