//! Two-stage ingestion pipeline.
//!
//! A download stage and a save stage run as separate tasks joined by bounded
//! channels. Each job holds a [`CompletionToken`]; the download stage takes a
//! second token before forwarding a result, so the pending count only reaches
//! zero once every submitted job has left both stages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::backfill::{self, BackfillConfig};
use crate::fetch::{FetchClient, FetchError, PageRequest};
use crate::store::{BarStore, PersistenceError};
use crate::{Bar, Symbol, Timeframe};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// How much history a job asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchScope {
    FullHistory,
    /// The most recent `n` buckets, one request.
    Recent(usize),
}

impl FetchScope {
    /// Negative limits request the full history.
    pub fn from_limit(limit: i64) -> Self {
        match usize::try_from(limit) {
            Ok(n) => Self::Recent(n),
            Err(_) => Self::FullHistory,
        }
    }
}

/// One (symbol, timeframe) unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub symbol: Symbol,
    pub quote_currency: Symbol,
    pub timeframe: Timeframe,
    pub scope: FetchScope,
}

/// Counts outstanding stage work across the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    pending: AtomicUsize,
    drained: Notify,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of pending work.
    pub fn acquire(&self) -> CompletionToken {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        CompletionToken {
            tracker: self.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Resolve once no token is outstanding.
    pub async fn wait(&self) {
        loop {
            let drained = self.inner.drained.notified();
            if self.pending() == 0 {
                return;
            }
            drained.await;
        }
    }

    fn release(&self) {
        let previous = self.inner.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "completion token released twice");
        if previous == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

/// One unit of pending work; released on drop.
#[derive(Debug)]
pub struct CompletionToken {
    tracker: CompletionTracker,
}

impl CompletionToken {
    /// Register follow-up work on the same tracker.
    pub fn acquire_another(&self) -> CompletionToken {
        self.tracker.acquire()
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

/// A job queued for the download stage.
#[derive(Debug)]
pub struct Job {
    pub spec: JobSpec,
    completion: CompletionToken,
}

struct SaveJob {
    spec: JobSpec,
    bars: Vec<Bar>,
    completion: CompletionToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub backfill: BackfillConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backfill: BackfillConfig::default(),
        }
    }
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub submitted: usize,
    /// Jobs fetched without error.
    pub fetched: usize,
    /// Jobs forwarded with bars retrieved before an error.
    pub partial: usize,
    /// Jobs that produced nothing and were not forwarded.
    pub dropped: usize,
    pub saved: usize,
    pub save_failed: usize,
    pub rows_saved: usize,
}

#[derive(Debug, Default)]
struct DownloadStats {
    fetched: usize,
    partial: usize,
    dropped: usize,
}

#[derive(Debug, Default)]
struct SaveStats {
    saved: usize,
    save_failed: usize,
    rows_saved: usize,
}

pub struct Pipeline {
    client: Arc<dyn FetchClient>,
    store: Arc<dyn BarStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn FetchClient>,
        store: Arc<dyn BarStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Queue every job, wait for all of them to clear both stages, then shut
    /// the stages down.
    pub async fn run(&self, jobs: Vec<JobSpec>) -> PipelineReport {
        let capacity = self.config.queue_capacity.max(1);
        let (download_tx, download_rx) = mpsc::channel::<Job>(capacity);
        let (save_tx, save_rx) = mpsc::channel::<SaveJob>(capacity);
        let tracker = CompletionTracker::new();

        let download: JoinHandle<DownloadStats> = tokio::spawn(
            download_stage(
                download_rx,
                save_tx,
                Arc::clone(&self.client),
                self.config.backfill,
            )
            .in_current_span(),
        );
        let save: JoinHandle<SaveStats> =
            tokio::spawn(save_stage(save_rx, Arc::clone(&self.store)).in_current_span());

        let submitted = jobs.len();
        for spec in jobs {
            let job = Job {
                spec,
                completion: tracker.acquire(),
            };
            if let Err(rejected) = download_tx.send(job).await {
                tracing::error!(
                    symbol = %rejected.0.spec.symbol,
                    timeframe = %rejected.0.spec.timeframe,
                    "download stage is gone, job not queued"
                );
            }
        }

        tracker.wait().await;
        drop(download_tx);

        let downloads = download.await.unwrap_or_else(|error| {
            tracing::error!(%error, "download stage terminated abnormally");
            DownloadStats::default()
        });
        let saves = save.await.unwrap_or_else(|error| {
            tracing::error!(%error, "save stage terminated abnormally");
            SaveStats::default()
        });

        PipelineReport {
            submitted,
            fetched: downloads.fetched,
            partial: downloads.partial,
            dropped: downloads.dropped,
            saved: saves.saved,
            save_failed: saves.save_failed,
            rows_saved: saves.rows_saved,
        }
    }
}

/// Bars for one job plus the error that cut the fetch short, if any.
struct Download {
    bars: Vec<Bar>,
    interrupted: Option<FetchError>,
}

async fn download(
    client: &dyn FetchClient,
    spec: &JobSpec,
    config: &BackfillConfig,
) -> Result<Download, FetchError> {
    match spec.scope {
        FetchScope::FullHistory => {
            let backfill = backfill::fetch_full_history(
                client,
                &spec.symbol,
                &spec.quote_currency,
                spec.timeframe,
                config,
            )
            .await?;
            Ok(Download {
                bars: backfill::strip_zero_ohlc(backfill.bars),
                interrupted: backfill.interrupted,
            })
        }
        FetchScope::Recent(limit) => {
            let request = PageRequest::new(
                spec.symbol.clone(),
                spec.quote_currency.clone(),
                spec.timeframe,
                limit,
            );
            let page = client.fetch_page(request).await?;
            Ok(Download {
                bars: page.bars,
                interrupted: None,
            })
        }
    }
}

async fn download_stage(
    mut jobs: mpsc::Receiver<Job>,
    save_tx: mpsc::Sender<SaveJob>,
    client: Arc<dyn FetchClient>,
    config: BackfillConfig,
) -> DownloadStats {
    let mut stats = DownloadStats::default();

    while let Some(job) = jobs.recv().await {
        let span = tracing::info_span!(
            "download",
            symbol = %job.spec.symbol,
            quote_currency = %job.spec.quote_currency,
            timeframe = %job.spec.timeframe,
        );

        async {
            tracing::info!(scope = ?job.spec.scope, "fetching");

            let fetched = match download(client.as_ref(), &job.spec, &config).await {
                Ok(fetched) => fetched,
                Err(error) => {
                    tracing::error!(%error, "fetch failed, dropping job");
                    stats.dropped += 1;
                    return;
                }
            };

            match &fetched.interrupted {
                Some(error) => {
                    tracing::warn!(%error, bars = fetched.bars.len(), "fetch incomplete, saving what was retrieved");
                    stats.partial += 1;
                }
                None => {
                    tracing::info!(bars = fetched.bars.len(), "fetched");
                    stats.fetched += 1;
                }
            }

            let save_job = SaveJob {
                spec: job.spec.clone(),
                bars: fetched.bars,
                completion: job.completion.acquire_another(),
            };
            if save_tx.send(save_job).await.is_err() {
                tracing::error!("save stage is gone, result discarded");
            }
        }
        .instrument(span)
        .await;

        drop(job);
    }

    stats
}

async fn save_stage(mut jobs: mpsc::Receiver<SaveJob>, store: Arc<dyn BarStore>) -> SaveStats {
    let mut stats = SaveStats::default();

    while let Some(SaveJob {
        spec,
        bars,
        completion,
    }) = jobs.recv().await
    {
        let span = tracing::info_span!(
            "save",
            symbol = %spec.symbol,
            quote_currency = %spec.quote_currency,
            timeframe = %spec.timeframe,
        );

        async {
            tracing::info!(bars = bars.len(), "saving");

            let timeframe = spec.timeframe;
            let task_store = Arc::clone(&store);
            let result = tokio::task::spawn_blocking(move || task_store.upsert(timeframe, &bars))
                .await
                .unwrap_or_else(|error| {
                    Err(PersistenceError::Task {
                        message: error.to_string(),
                    })
                });

            match result {
                Ok(rows) => {
                    tracing::info!(rows, "saved");
                    stats.saved += 1;
                    stats.rows_saved += rows;
                }
                Err(error) => {
                    tracing::error!(%error, "save failed");
                    stats.save_failed += 1;
                }
            }
        }
        .instrument(span)
        .await;

        drop(completion);
    }

    stats
}
