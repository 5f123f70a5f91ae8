//! Store port used by the save stage, and its warehouse implementation.

use barsync_warehouse::{BarRecord, StoredBar, Warehouse, WarehouseError};
use thiserror::Error;

use crate::{Bar, Symbol, Timeframe, UtcDateTime, ValidationError};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("stored row does not form a valid bar: {0}")]
    InvalidRow(#[from] ValidationError),

    #[error("store task failed: {message}")]
    Task { message: String },
}

/// Idempotent bar persistence keyed by `(symbol, quote_currency, ts)`.
///
/// Calls block; async callers run them on the blocking pool.
pub trait BarStore: Send + Sync {
    /// Insert or overwrite the OHLCV fields of each bar, keeping row identity.
    /// Returns the number of distinct keys written.
    fn upsert(&self, timeframe: Timeframe, bars: &[Bar]) -> Result<usize, PersistenceError>;

    /// Up to `limit` bars of one pair, ascending by `ts`.
    fn query(
        &self,
        timeframe: Timeframe,
        symbol: &Symbol,
        quote_currency: &Symbol,
        limit: usize,
    ) -> Result<Vec<Bar>, PersistenceError>;
}

impl BarStore for Warehouse {
    fn upsert(&self, timeframe: Timeframe, bars: &[Bar]) -> Result<usize, PersistenceError> {
        let records: Vec<BarRecord> = bars.iter().map(to_record).collect();
        Ok(self.upsert_bars(timeframe.table(), &records)?)
    }

    fn query(
        &self,
        timeframe: Timeframe,
        symbol: &Symbol,
        quote_currency: &Symbol,
        limit: usize,
    ) -> Result<Vec<Bar>, PersistenceError> {
        self.query_bars(
            timeframe.table(),
            symbol.as_str(),
            quote_currency.as_str(),
            limit,
        )?
        .into_iter()
        .map(|stored| from_stored(stored).map_err(PersistenceError::from))
        .collect()
    }
}

pub fn to_record(bar: &Bar) -> BarRecord {
    BarRecord {
        symbol: bar.symbol.as_str().to_owned(),
        quote_currency: bar.quote_currency.as_str().to_owned(),
        ts: bar.ts.format_warehouse(),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume_base: bar.volume_base,
        volume_quote: bar.volume_quote,
    }
}

pub fn from_stored(stored: StoredBar) -> Result<Bar, ValidationError> {
    let record = stored.record;
    Bar::new(
        Symbol::parse(&record.symbol)?,
        Symbol::parse(&record.quote_currency)?,
        UtcDateTime::parse_warehouse(&record.ts)?,
        record.open,
        record.high,
        record.low,
        record.close,
        record.volume_base,
        record.volume_quote,
    )
}
