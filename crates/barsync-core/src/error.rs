use thiserror::Error;

/// Validation and contract errors exposed by `barsync-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("ticker contains non-alphanumeric character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid timeframe '{value}', expected one of 1m, 1h, 1d")]
    InvalidTimeframe { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp is out of range: {value}")]
    TimestampOutOfRange { value: i64 },
    #[error("timestamp must match YYYY-MM-DD HH:MM:SS: '{value}'")]
    InvalidWarehouseTimestamp { value: String },

    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}
