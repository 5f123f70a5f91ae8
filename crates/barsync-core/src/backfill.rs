//! Backward pagination over a size-limited histo API.
//!
//! The walk starts slightly in the future and requests full pages ending at a
//! cursor, moving the cursor to just before the earliest bucket of each page.
//! It ends when the upstream returns an empty page, a page in which no bar
//! carries base volume (history before listing is padded with such bars), or
//! an error. Bars gathered before an error are kept.

use std::time::Duration;

use serde::Serialize;

use crate::fetch::{FetchClient, FetchError, PageRequest, MAX_PAGE_SIZE};
use crate::{Bar, Symbol, Timeframe, UtcDateTime};

/// Tunables for a full-history walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillConfig {
    pub page_size: usize,
    /// Fixed pause between successive page requests.
    pub polite_delay: Duration,
    /// Forward offset of the first cursor from the local clock.
    pub clock_skew: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            polite_delay: Duration::from_secs(10),
            clock_skew: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The upstream returned an empty page.
    ExhaustedHistory,
    /// Every bar of the last page had zero base volume.
    UnmaterializedPage,
    /// A page request failed.
    Interrupted,
}

/// Outcome of a full-history walk that retrieved at least something, or
/// retrieved nothing without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backfill {
    /// Bars sorted ascending by `ts`, ties in arrival order.
    pub bars: Vec<Bar>,
    /// Set when the walk was cut short after some pages succeeded.
    pub interrupted: Option<FetchError>,
    /// Number of pages accepted.
    pub pages: usize,
    pub stop: StopReason,
}

impl Backfill {
    pub fn is_partial(&self) -> bool {
        self.interrupted.is_some()
    }
}

/// Reconstruct the full history of one pair at one timeframe.
///
/// Returns `Err` only when a request failed before any bar was accepted.
pub async fn fetch_full_history(
    client: &dyn FetchClient,
    symbol: &Symbol,
    quote_currency: &Symbol,
    timeframe: Timeframe,
    config: &BackfillConfig,
) -> Result<Backfill, FetchError> {
    let skew = time::Duration::try_from(config.clock_skew).unwrap_or(time::Duration::ZERO);
    let mut cursor = UtcDateTime::now().saturating_add(skew);
    let mut bars: Vec<Bar> = Vec::new();
    let mut pages = 0usize;

    tracing::info!(%symbol, %quote_currency, %timeframe, "starting full-history backfill");

    let (stop, interrupted) = loop {
        tracing::debug!(%symbol, %quote_currency, %timeframe, cursor = %cursor, "fetching page");

        let request = PageRequest::new(
            symbol.clone(),
            quote_currency.clone(),
            timeframe,
            config.page_size,
        )
        .with_cursor(cursor);

        let page = match client.fetch_page(request).await {
            Ok(page) => page,
            Err(error) => {
                tracing::error!(%symbol, %quote_currency, %timeframe, %error, "page request failed");
                break (StopReason::Interrupted, Some(error));
            }
        };

        if page.bars.is_empty() {
            tracing::debug!(%symbol, %quote_currency, %timeframe, "no more history");
            break (StopReason::ExhaustedHistory, None);
        }

        if page.bars.iter().all(Bar::has_zero_base_volume) {
            tracing::warn!(
                %symbol,
                %quote_currency,
                %timeframe,
                "page carries no base volume, treating it as the start of history"
            );
            break (StopReason::UnmaterializedPage, None);
        }

        pages += 1;
        bars.extend(page.bars);
        cursor = page.time_from.saturating_sub(timeframe.bucket());

        tracing::debug!(%symbol, %quote_currency, %timeframe, delay = ?config.polite_delay, "pausing before next page");
        tokio::time::sleep(config.polite_delay).await;
    };

    if bars.is_empty() {
        if let Some(error) = interrupted {
            return Err(error);
        }
    }

    // Stable: equal timestamps keep arrival order.
    bars.sort_by_key(|bar| bar.ts);

    if timeframe.is_sub_hour() {
        drop_unsettled_tail(&mut bars);
    }

    if interrupted.is_some() {
        tracing::warn!(
            %symbol,
            %quote_currency,
            %timeframe,
            bars = bars.len(),
            pages,
            "backfill ended early, keeping bars fetched so far"
        );
    } else {
        tracing::info!(%symbol, %quote_currency, %timeframe, bars = bars.len(), pages, ?stop, "backfill complete");
    }

    Ok(Backfill {
        bars,
        interrupted,
        pages,
        stop,
    })
}

/// Drop the newest bar when its bucket has not traded yet.
pub fn drop_unsettled_tail(bars: &mut Vec<Bar>) {
    if bars.last().is_some_and(Bar::has_zero_base_volume) {
        bars.pop();
    }
}

/// Remove bars whose open, high, low and close are all zero.
pub fn strip_zero_ohlc(bars: Vec<Bar>) -> Vec<Bar> {
    bars.into_iter().filter(|bar| !bar.is_zero_ohlc()).collect()
}
