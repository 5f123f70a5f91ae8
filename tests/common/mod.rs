//! Shared fixtures for behavior tests: scripted fetch client, recording store
//! and bar builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use barsync_core::backfill::BackfillConfig;
use barsync_core::{
    Bar, BarStore, FetchClient, FetchError, FetchPage, PageRequest, PersistenceError, Symbol,
    Timeframe, UtcDateTime, WarehouseError,
};
use rust_decimal::Decimal;

/// 2024-01-01T00:00:00Z
pub const EPOCH: i64 = 1_704_067_200;

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

pub fn ts(seconds: i64) -> UtcDateTime {
    UtcDateTime::from_unix_timestamp(seconds).expect("valid timestamp")
}

pub fn bar_for(base: &str, seconds: i64, price: Decimal, volume_base: Decimal) -> Bar {
    Bar::new(
        symbol(base),
        symbol("USD"),
        ts(seconds),
        price,
        price,
        price,
        price,
        volume_base,
        price * volume_base,
    )
    .expect("valid bar")
}

pub fn bar(seconds: i64, price: Decimal, volume_base: Decimal) -> Bar {
    bar_for("BTC", seconds, price, volume_base)
}

/// A page of consecutive buckets starting at `start`, one bar per volume.
pub fn page(
    base: &str,
    timeframe: Timeframe,
    start: i64,
    volumes: &[Decimal],
) -> Result<FetchPage, FetchError> {
    let step = timeframe.bucket().whole_seconds();
    let bars = volumes
        .iter()
        .enumerate()
        .map(|(index, volume)| {
            bar_for(base, start + step * index as i64, Decimal::ONE_HUNDRED, *volume)
        })
        .collect();
    Ok(FetchPage {
        bars,
        time_from: ts(start),
    })
}

pub fn empty_page(start: i64) -> Result<FetchPage, FetchError> {
    Ok(FetchPage {
        bars: Vec::new(),
        time_from: ts(start),
    })
}

pub fn fast_backfill() -> BackfillConfig {
    BackfillConfig {
        polite_delay: Duration::ZERO,
        ..BackfillConfig::default()
    }
}

/// Fetch client replaying per-(symbol, timeframe) scripts. An exhausted
/// script answers with an empty page.
#[derive(Default)]
pub struct ScriptedFetchClient {
    scripts: Mutex<HashMap<(String, Timeframe), VecDeque<Result<FetchPage, FetchError>>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedFetchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(
        self,
        base: &str,
        timeframe: Timeframe,
        responses: Vec<Result<FetchPage, FetchError>>,
    ) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert((base.to_string(), timeframe), responses.into());
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_for(&self, base: &str, timeframe: Timeframe) -> Vec<PageRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.symbol.as_str() == base && request.timeframe == timeframe)
            .collect()
    }
}

impl FetchClient for ScriptedFetchClient {
    fn fetch_page<'a>(
        &'a self,
        request: PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchPage, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());

            let key = (request.symbol.as_str().to_string(), request.timeframe);
            let next = self
                .scripts
                .lock()
                .expect("scripts lock")
                .get_mut(&key)
                .and_then(VecDeque::pop_front);

            next.unwrap_or_else(|| {
                Ok(FetchPage {
                    bars: Vec::new(),
                    time_from: request.cursor.unwrap_or_else(UtcDateTime::now),
                })
            })
        })
    }
}

/// Store that records every batch it is handed.
#[derive(Default)]
pub struct RecordingStore {
    batches: Mutex<Vec<(Timeframe, Vec<Bar>)>>,
    failing: Mutex<Vec<Timeframe>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(self, timeframe: Timeframe) -> Self {
        self.failing.lock().expect("failing lock").push(timeframe);
        self
    }

    pub fn batches(&self) -> Vec<(Timeframe, Vec<Bar>)> {
        self.batches.lock().expect("batches lock").clone()
    }

    pub fn batch_for(&self, base: &str, timeframe: Timeframe) -> Option<Vec<Bar>> {
        self.batches()
            .into_iter()
            .find(|(batch_timeframe, bars)| {
                *batch_timeframe == timeframe
                    && bars.first().map_or(false, |bar| bar.symbol.as_str() == base)
            })
            .map(|(_, bars)| bars)
    }
}

impl BarStore for RecordingStore {
    fn upsert(&self, timeframe: Timeframe, bars: &[Bar]) -> Result<usize, PersistenceError> {
        if self.failing.lock().expect("failing lock").contains(&timeframe) {
            return Err(PersistenceError::Warehouse(WarehouseError::InvalidRecord(
                format!("{timeframe} store offline"),
            )));
        }
        self.batches
            .lock()
            .expect("batches lock")
            .push((timeframe, bars.to_vec()));
        Ok(bars.len())
    }

    fn query(
        &self,
        timeframe: Timeframe,
        symbol: &Symbol,
        quote_currency: &Symbol,
        limit: usize,
    ) -> Result<Vec<Bar>, PersistenceError> {
        let mut bars: Vec<Bar> = self
            .batches()
            .into_iter()
            .filter(|(batch_timeframe, _)| *batch_timeframe == timeframe)
            .flat_map(|(_, bars)| bars)
            .filter(|bar| &bar.symbol == symbol && &bar.quote_currency == quote_currency)
            .collect();
        bars.sort_by_key(|bar| bar.ts);
        bars.truncate(limit);
        Ok(bars)
    }
}
