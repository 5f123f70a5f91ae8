use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Symbol, UtcDateTime, ValidationError};

/// OHLCV bar for one bucket of a (symbol, quote currency) pair.
///
/// The natural key is `(symbol, quote_currency, ts)`; `ts` is the bucket
/// start. All prices and volumes are exact decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub quote_currency: Symbol,
    pub ts: UtcDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Traded volume in units of `symbol`.
    pub volume_base: Decimal,
    /// Traded volume in units of `quote_currency`.
    pub volume_quote: Decimal,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        quote_currency: Symbol,
        ts: UtcDateTime,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume_base: Decimal,
        volume_quote: Decimal,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_non_negative("volume_base", volume_base)?;
        validate_non_negative("volume_quote", volume_quote)?;

        Ok(Self {
            symbol,
            quote_currency,
            ts,
            open,
            high,
            low,
            close,
            volume_base,
            volume_quote,
        })
    }

    /// True when nothing traded in the base asset during this bucket.
    pub fn has_zero_base_volume(&self) -> bool {
        self.volume_base.is_zero()
    }

    /// True when open, high, low and close are all exactly zero.
    pub fn is_zero_ohlc(&self) -> bool {
        self.open.is_zero() && self.high.is_zero() && self.low.is_zero() && self.close.is_zero()
    }
}

fn validate_non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
