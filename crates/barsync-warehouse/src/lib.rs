//! # Barsync Warehouse
//!
//! DuckDB-based bar storage for barsync.
//!
//! ## Overview
//!
//! The warehouse keeps one table per timeframe, each keyed by
//! `(symbol, quote_currency, ts)`. Writes are idempotent upserts: a repeated
//! key overwrites the price and volume columns and keeps the row's surrogate
//! `id`. Prices and volumes are stored as canonical decimal text, so every
//! value a `Decimal` can hold survives a round trip unchanged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use barsync_warehouse::{BarRecord, BarTable, Warehouse};
//! use rust_decimal::Decimal;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let rows = vec![BarRecord {
//!         symbol: "BTC".to_string(),
//!         quote_currency: "USD".to_string(),
//!         ts: "2024-01-01 00:00:00".to_string(),
//!         open: Decimal::new(4200050, 2),
//!         high: Decimal::new(4210000, 2),
//!         low: Decimal::new(4190000, 2),
//!         close: Decimal::new(4205000, 2),
//!         volume_base: Decimal::new(125, 1),
//!         volume_quote: Decimal::new(525_625, 0),
//!     }];
//!     warehouse.upsert_bars(BarTable::Hourly, &rows)?;
//!
//!     let stored = warehouse.query_bars(BarTable::Hourly, "BTC", "USD", 10)?;
//!     println!("{} rows", stored.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `bars_1m` | Minute bars |
//! | `bars_1h` | Hourly bars |
//! | `bars_1d` | Daily bars |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::collections::HashMap;
use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::duckdb::{params, Connection, ToSql};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A record could not be written or read back faithfully.
    #[error("invalid bar record: {0}")]
    InvalidRecord(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for barsync data.
    pub barsync_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_barsync_home())
    }
}

impl WarehouseConfig {
    /// Standard layout under a given home directory.
    pub fn in_home(barsync_home: impl Into<PathBuf>) -> Self {
        let barsync_home = barsync_home.into();
        let db_path = barsync_home.join("warehouse.duckdb");
        Self {
            barsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// One table per timeframe, all with identical shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarTable {
    Minute,
    Hourly,
    Daily,
}

impl BarTable {
    pub const ALL: [Self; 3] = [Self::Minute, Self::Hourly, Self::Daily];

    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Minute => "bars_1m",
            Self::Hourly => "bars_1h",
            Self::Daily => "bars_1d",
        }
    }
}

impl Display for BarTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A bar (OHLCV) row as written to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarRecord {
    /// Base asset symbol (e.g. "BTC").
    pub symbol: String,
    /// Quote currency the prices are denominated in (e.g. "USD").
    pub quote_currency: String,
    /// Bucket start in UTC, formatted `YYYY-MM-DD HH:MM:SS`.
    pub ts: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume in units of the base asset.
    pub volume_base: Decimal,
    /// Volume in units of the quote currency.
    pub volume_quote: Decimal,
}

/// A bar row read back from the warehouse together with its surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBar {
    pub id: i64,
    #[serde(flatten)]
    pub record: BarRecord,
}

/// The main warehouse interface for bar storage.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        tracing::debug!(path = %warehouse.db_path().display(), "warehouse opened");
        Ok(warehouse)
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Insert or update bars keyed by `(symbol, quote_currency, ts)`.
    ///
    /// On key collision only the price/volume columns and `updated_at` are
    /// overwritten; the surrogate `id` is kept. Rows repeating a key within
    /// `rows` collapse to the last occurrence. The whole batch is written in
    /// one transaction and rolled back on any failure.
    ///
    /// Returns the number of distinct keys written.
    pub fn upsert_bars(&self, table: BarTable, rows: &[BarRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let rows = collapse_duplicate_keys(rows);
        let upsert_sql = format!(
            "INSERT INTO {table} \
             (symbol, quote_currency, ts, open, high, low, close, volume_base, volume_quote, updated_at) \
             VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP) \
             ON CONFLICT (symbol, quote_currency, ts) DO UPDATE SET \
                 open = EXCLUDED.open, \
                 high = EXCLUDED.high, \
                 low = EXCLUDED.low, \
                 close = EXCLUDED.close, \
                 volume_base = EXCLUDED.volume_base, \
                 volume_quote = EXCLUDED.volume_quote, \
                 updated_at = EXCLUDED.updated_at",
            table = table.table_name()
        );

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(upsert_sql.as_str())?;
            for row in &rows {
                validate_record(row)?;
                let prices = [
                    canonical_text(row.open),
                    canonical_text(row.high),
                    canonical_text(row.low),
                    canonical_text(row.close),
                    canonical_text(row.volume_base),
                    canonical_text(row.volume_quote),
                ];
                let params: [&dyn ToSql; 9] = [
                    &row.symbol,
                    &row.quote_currency,
                    &row.ts,
                    &prices[0],
                    &prices[1],
                    &prices[2],
                    &prices[3],
                    &prices[4],
                    &prices[5],
                ];
                statement.execute(params.as_slice())?;
            }
            Ok(rows.len())
        })();

        let written = finalize_transaction(&connection, result)?;
        tracing::debug!(table = %table, rows = written, "upserted bars");
        Ok(written)
    }

    /// Read up to `limit` bars for one pair, ordered ascending by `ts`.
    pub fn query_bars(
        &self,
        table: BarTable,
        symbol: &str,
        quote_currency: &str,
        limit: usize,
    ) -> Result<Vec<StoredBar>, WarehouseError> {
        let query_sql = format!(
            "SELECT id, symbol, quote_currency, strftime(ts, '%Y-%m-%d %H:%M:%S'), \
                    open, high, low, close, volume_base, volume_quote \
             FROM {table} \
             WHERE symbol = ? AND quote_currency = ? \
             ORDER BY ts ASC \
             LIMIT ?",
            table = table.table_name()
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(query_sql.as_str())?;
        let raw_rows = statement
            .query_map(params![symbol, quote_currency, limit], |row| {
                Ok(RawBarRow {
                    id: row.get(0)?,
                    symbol: row.get(1)?,
                    quote_currency: row.get(2)?,
                    ts: row.get(3)?,
                    values: [
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                    ],
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows.into_iter().map(RawBarRow::into_stored).collect()
    }
}

/// Row as returned by DuckDB before decimal parsing.
struct RawBarRow {
    id: i64,
    symbol: String,
    quote_currency: String,
    ts: String,
    values: [String; 6],
}

impl RawBarRow {
    fn into_stored(self) -> Result<StoredBar, WarehouseError> {
        let [open, high, low, close, volume_base, volume_quote] = self.values;
        Ok(StoredBar {
            id: self.id,
            record: BarRecord {
                symbol: self.symbol,
                quote_currency: self.quote_currency,
                ts: self.ts,
                open: parse_decimal("open", &open)?,
                high: parse_decimal("high", &high)?,
                low: parse_decimal("low", &low)?,
                close: parse_decimal("close", &close)?,
                volume_base: parse_decimal("volume_base", &volume_base)?,
                volume_quote: parse_decimal("volume_quote", &volume_quote)?,
            },
        })
    }
}

/// Shortest exact text for a value: no trailing zeros, no exponent.
fn canonical_text(value: Decimal) -> String {
    value.normalize().to_string()
}

fn parse_decimal(column: &str, text: &str) -> Result<Decimal, WarehouseError> {
    Decimal::from_str(text)
        .map(|value| value.normalize())
        .map_err(|error| {
            WarehouseError::InvalidRecord(format!("column {column} holds '{text}': {error}"))
        })
}

fn validate_record(row: &BarRecord) -> Result<(), WarehouseError> {
    if row.symbol.trim().is_empty() || row.quote_currency.trim().is_empty() {
        return Err(WarehouseError::InvalidRecord(format!(
            "bar at {} is missing its symbol or quote currency",
            row.ts
        )));
    }
    Ok(())
}

/// Keep one row per natural key, the last one seen, in first-seen order.
fn collapse_duplicate_keys(rows: &[BarRecord]) -> Vec<BarRecord> {
    let mut positions: HashMap<(&str, &str, &str), usize> = HashMap::with_capacity(rows.len());
    let mut output: Vec<BarRecord> = Vec::with_capacity(rows.len());

    for row in rows {
        let key = (
            row.symbol.as_str(),
            row.quote_currency.as_str(),
            row.ts.as_str(),
        );
        match positions.get(&key) {
            Some(&index) => output[index] = row.clone(),
            None => {
                positions.insert(key, output.len());
                output.push(row.clone());
            }
        }
    }

    output
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = connection.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback_error, "rollback after failed upsert also failed");
            }
            Err(error)
        }
    }
}

/// Resolve the barsync home directory from environment or default.
fn resolve_barsync_home() -> PathBuf {
    if let Some(path) = env::var_os("BARSYNC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".barsync");
    }

    PathBuf::from(".barsync")
}
