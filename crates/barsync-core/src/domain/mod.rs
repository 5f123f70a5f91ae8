//! # Domain Models
//!
//! Canonical domain types for barsync market data.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bar`] | OHLCV bar for one bucket, exact decimals |
//! | [`Symbol`] | Validated base asset or quote currency ticker |
//! | [`Timeframe`] | Bucket granularity (1m, 1h, 1d) |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! ```rust
//! use barsync_core::{Bar, Symbol, UtcDateTime, ValidationError};
//! use rust_decimal::Decimal;
//!
//! let ts = UtcDateTime::parse("2024-01-01T00:00:00Z").unwrap();
//! let negative = Bar::new(
//!     Symbol::parse("BTC").unwrap(),
//!     Symbol::parse("USD").unwrap(),
//!     ts,
//!     Decimal::NEGATIVE_ONE,
//!     Decimal::ONE,
//!     Decimal::ONE,
//!     Decimal::ONE,
//!     Decimal::ONE,
//!     Decimal::ONE,
//! );
//! assert!(matches!(negative, Err(ValidationError::NegativeValue { field: "open" })));
//! ```

mod models;
mod symbol;
mod timeframe;
mod timestamp;

pub use models::Bar;
pub use symbol::Symbol;
pub use timeframe::Timeframe;
pub use timestamp::UtcDateTime;
