//! Behavior-driven tests for the download/save pipeline.
//!
//! These tests verify that every queued job is accounted for across both
//! stages, that failures stay confined to their job, and that data-quality
//! rules apply to full-history jobs only.

mod common;

use std::sync::Arc;
use std::time::Duration;

use barsync_core::{
    FetchError, FetchScope, JobSpec, Pipeline, PipelineConfig, PipelineReport, Timeframe,
};
use common::{fast_backfill, page, symbol, RecordingStore, ScriptedFetchClient, EPOCH};
use rust_decimal_macros::dec;

fn job(base: &str, timeframe: Timeframe, scope: FetchScope) -> JobSpec {
    JobSpec {
        symbol: symbol(base),
        quote_currency: symbol("USD"),
        timeframe,
        scope,
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        queue_capacity: 10,
        backfill: fast_backfill(),
    }
}

async fn run(
    client: Arc<ScriptedFetchClient>,
    store: Arc<RecordingStore>,
    config: PipelineConfig,
    jobs: Vec<JobSpec>,
) -> PipelineReport {
    let pipeline = Pipeline::new(client, store, config);
    tokio::time::timeout(Duration::from_secs(10), pipeline.run(jobs))
        .await
        .expect("pipeline must not hang")
}

// =============================================================================
// Pipeline: Happy path
// =============================================================================

#[tokio::test]
async fn when_recent_jobs_run_each_result_lands_in_its_timeframe() {
    // Given: One recent job per timeframe for a symbol
    let client = Arc::new(
        ScriptedFetchClient::new()
            .script(
                "BTC",
                Timeframe::Hourly,
                vec![page("BTC", Timeframe::Hourly, EPOCH, &[dec!(1), dec!(2)])],
            )
            .script(
                "BTC",
                Timeframe::Daily,
                vec![page("BTC", Timeframe::Daily, EPOCH, &[dec!(1)])],
            )
            .script(
                "BTC",
                Timeframe::Minute,
                vec![page(
                    "BTC",
                    Timeframe::Minute,
                    EPOCH,
                    &[dec!(1), dec!(1), dec!(0)],
                )],
            ),
    );
    let store = Arc::new(RecordingStore::new());

    // When: The pipeline processes them
    let report = run(
        Arc::clone(&client),
        Arc::clone(&store),
        config(),
        vec![
            job("BTC", Timeframe::Hourly, FetchScope::Recent(2)),
            job("BTC", Timeframe::Daily, FetchScope::Recent(1)),
            job("BTC", Timeframe::Minute, FetchScope::Recent(3)),
        ],
    )
    .await;

    // Then: Every job was fetched and saved into the right table
    assert_eq!(
        report,
        PipelineReport {
            submitted: 3,
            fetched: 3,
            partial: 0,
            dropped: 0,
            saved: 3,
            save_failed: 0,
            rows_saved: 6,
        }
    );
    assert_eq!(store.batch_for("BTC", Timeframe::Hourly).map(|b| b.len()), Some(2));
    assert_eq!(store.batch_for("BTC", Timeframe::Daily).map(|b| b.len()), Some(1));

    // And: Recent jobs are not trimmed or filtered
    assert_eq!(store.batch_for("BTC", Timeframe::Minute).map(|b| b.len()), Some(3));
}

#[tokio::test]
async fn recent_jobs_make_one_uncursored_request_with_their_limit() {
    // Given: A recent job for 24 hourly buckets
    let client = Arc::new(ScriptedFetchClient::new().script(
        "ETH",
        Timeframe::Hourly,
        vec![page("ETH", Timeframe::Hourly, EPOCH, &[dec!(1)])],
    ));
    let store = Arc::new(RecordingStore::new());

    // When: The pipeline runs it
    run(
        Arc::clone(&client),
        store,
        config(),
        vec![job("ETH", Timeframe::Hourly, FetchScope::Recent(24))],
    )
    .await;

    // Then: Exactly one request ending "now" was made
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].limit, 24);
    assert!(requests[0].cursor.is_none());
}

#[tokio::test]
async fn more_jobs_than_queue_slots_all_complete() {
    // Given: Far more jobs than the channels can hold at once
    let client = Arc::new(ScriptedFetchClient::new());
    let store = Arc::new(RecordingStore::new());
    let jobs: Vec<JobSpec> = (0..30)
        .map(|_| job("BTC", Timeframe::Daily, FetchScope::Recent(1)))
        .collect();

    // When: They run through a pipeline with tiny queues
    let report = run(
        client,
        Arc::clone(&store),
        PipelineConfig {
            queue_capacity: 1,
            backfill: fast_backfill(),
        },
        jobs,
    )
    .await;

    // Then: Every job passes through both stages
    assert_eq!(report.submitted, 30);
    assert_eq!(report.fetched, 30);
    assert_eq!(report.saved, 30);
    assert_eq!(store.batches().len(), 30);
}

#[tokio::test]
async fn an_empty_job_list_returns_immediately() {
    let report = run(
        Arc::new(ScriptedFetchClient::new()),
        Arc::new(RecordingStore::new()),
        config(),
        Vec::new(),
    )
    .await;

    assert_eq!(report, PipelineReport::default());
}

// =============================================================================
// Pipeline: Failure isolation
// =============================================================================

#[tokio::test]
async fn when_a_job_fetches_nothing_it_is_dropped_and_the_run_still_finishes() {
    // Given: One job whose fetch fails outright and one that succeeds
    let client = Arc::new(
        ScriptedFetchClient::new()
            .script(
                "BTC",
                Timeframe::Hourly,
                vec![Err(FetchError::transport("connection reset"))],
            )
            .script(
                "ETH",
                Timeframe::Hourly,
                vec![page("ETH", Timeframe::Hourly, EPOCH, &[dec!(1)])],
            ),
    );
    let store = Arc::new(RecordingStore::new());

    // When: Both jobs are queued
    let report = run(
        client,
        Arc::clone(&store),
        config(),
        vec![
            job("BTC", Timeframe::Hourly, FetchScope::Recent(1)),
            job("ETH", Timeframe::Hourly, FetchScope::Recent(1)),
        ],
    )
    .await;

    // Then: The failed job never reaches the store, the other one does
    assert_eq!(report.dropped, 1);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.saved, 1);
    assert!(store.batch_for("BTC", Timeframe::Hourly).is_none());
    assert!(store.batch_for("ETH", Timeframe::Hourly).is_some());
}

#[tokio::test]
async fn when_a_backfill_breaks_part_way_its_bars_are_still_saved() {
    // Given: A full-history job that fails after one good page
    let client = Arc::new(ScriptedFetchClient::new().script(
        "BTC",
        Timeframe::Daily,
        vec![
            page("BTC", Timeframe::Daily, EPOCH, &[dec!(1), dec!(2)]),
            Err(FetchError::upstream("rate limit exceeded")),
        ],
    ));
    let store = Arc::new(RecordingStore::new());

    // When: The job runs
    let report = run(
        client,
        Arc::clone(&store),
        config(),
        vec![job("BTC", Timeframe::Daily, FetchScope::FullHistory)],
    )
    .await;

    // Then: The partial result is forwarded and saved
    assert_eq!(report.partial, 1);
    assert_eq!(report.saved, 1);
    assert_eq!(report.rows_saved, 2);
}

#[tokio::test]
async fn when_the_store_rejects_one_batch_the_others_are_still_saved() {
    // Given: A store that cannot write minute bars
    let client = Arc::new(
        ScriptedFetchClient::new()
            .script(
                "BTC",
                Timeframe::Minute,
                vec![page("BTC", Timeframe::Minute, EPOCH, &[dec!(1)])],
            )
            .script(
                "BTC",
                Timeframe::Daily,
                vec![page("BTC", Timeframe::Daily, EPOCH, &[dec!(1)])],
            ),
    );
    let store = Arc::new(RecordingStore::new().failing_on(Timeframe::Minute));

    // When: Jobs for both timeframes run
    let report = run(
        client,
        Arc::clone(&store),
        config(),
        vec![
            job("BTC", Timeframe::Minute, FetchScope::Recent(1)),
            job("BTC", Timeframe::Daily, FetchScope::Recent(1)),
        ],
    )
    .await;

    // Then: Only the failing batch is lost
    assert_eq!(report.save_failed, 1);
    assert_eq!(report.saved, 1);
    assert!(store.batch_for("BTC", Timeframe::Daily).is_some());
}

// =============================================================================
// Pipeline: Data quality
// =============================================================================

#[tokio::test]
async fn full_history_jobs_strip_bars_with_all_zero_prices() {
    // Given: A history page containing a bar with zero open, high, low and close
    let mut history = page("BTC", Timeframe::Hourly, EPOCH, &[dec!(1), dec!(1), dec!(1)])
        .expect("page");
    let blank = &mut history.bars[1];
    blank.open = dec!(0);
    blank.high = dec!(0);
    blank.low = dec!(0);
    blank.close = dec!(0);

    let client = Arc::new(ScriptedFetchClient::new().script(
        "BTC",
        Timeframe::Hourly,
        vec![Ok(history.clone())],
    ));
    let recent_client = Arc::new(ScriptedFetchClient::new().script(
        "BTC",
        Timeframe::Hourly,
        vec![Ok(history)],
    ));

    // When: The same data arrives through a full-history job and a recent job
    let full_store = Arc::new(RecordingStore::new());
    run(
        client,
        Arc::clone(&full_store),
        config(),
        vec![job("BTC", Timeframe::Hourly, FetchScope::FullHistory)],
    )
    .await;

    let recent_store = Arc::new(RecordingStore::new());
    run(
        recent_client,
        Arc::clone(&recent_store),
        config(),
        vec![job("BTC", Timeframe::Hourly, FetchScope::Recent(3))],
    )
    .await;

    // Then: Only the full-history job removes the blank bar
    let full = full_store
        .batch_for("BTC", Timeframe::Hourly)
        .expect("full-history batch");
    assert_eq!(full.len(), 2);
    assert!(full.iter().all(|bar| !bar.is_zero_ohlc()));

    let recent = recent_store
        .batch_for("BTC", Timeframe::Hourly)
        .expect("recent batch");
    assert_eq!(recent.len(), 3);
}
