//! # Barsync Core
//!
//! Domain types and ingestion machinery for barsync.
//!
//! ## Overview
//!
//! - **Bar model** with exact decimal prices and volumes
//! - **Fetch client** contract and the CryptoCompare histo implementation
//! - **Backfill** that walks an unbounded history backward page by page
//! - **Pipeline** that overlaps downloading with persisting across jobs
//! - **Store port** implemented by the DuckDB warehouse
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Upstream fetch clients (CryptoCompare) |
//! | [`backfill`] | Full-history backward pagination |
//! | [`domain`] | Domain models (Bar, Symbol, Timeframe, UtcDateTime) |
//! | [`error`] | Core error types |
//! | [`fetch`] | Fetch client trait, page request and errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pipeline`] | Two-stage download/save pipeline |
//! | [`store`] | Bar store trait and warehouse mapping |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use barsync_core::{
//!     CryptoCompareClient, FetchScope, JobSpec, Pipeline, PipelineConfig, Symbol, Timeframe,
//!     Warehouse,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(CryptoCompareClient::new("api-key"));
//!     let store = Arc::new(Warehouse::open_default()?);
//!     let pipeline = Pipeline::new(client, store, PipelineConfig::default());
//!
//!     let jobs = vec![JobSpec {
//!         symbol: Symbol::parse("BTC")?,
//!         quote_currency: Symbol::parse("USD")?,
//!         timeframe: Timeframe::Hourly,
//!         scope: FetchScope::Recent(24),
//!     }];
//!     let report = pipeline.run(jobs).await;
//!     println!("saved {} rows", report.rows_saved);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / caller   │
//! └────────┬────────┘
//!          │ JobSpec per (symbol, timeframe)
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Download stage  │────▶│ Backfill / page  │──▶ FetchClient ──▶ HttpClient
//! └────────┬────────┘     └──────────────────┘
//!          │ bounded channel
//!          ▼
//! ┌─────────────────┐
//! │   Save stage    │──▶ BarStore (Warehouse)
//! └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - The API key is appended to request URLs only at send time and never logged
//! - Symbols are validated before they reach a URL or a SQL parameter

pub mod adapters;
pub mod backfill;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod http_client;
pub mod pipeline;
pub mod store;

pub use adapters::CryptoCompareClient;

pub use backfill::{fetch_full_history, Backfill, BackfillConfig, StopReason};

pub use domain::{Bar, Symbol, Timeframe, UtcDateTime};

pub use error::ValidationError;

pub use fetch::{FetchClient, FetchError, FetchPage, PageRequest, MAX_PAGE_SIZE};

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use pipeline::{
    CompletionToken, CompletionTracker, FetchScope, Job, JobSpec, Pipeline, PipelineConfig,
    PipelineReport,
};

pub use store::{BarStore, PersistenceError};

// Warehouse (re-exported from barsync-warehouse)
pub use barsync_warehouse::{
    BarRecord, BarTable, StoredBar, Warehouse, WarehouseConfig, WarehouseError,
};
