use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Longest ticker accepted for a base asset or quote currency.
const MAX_TICKER_LEN: usize = 20;

/// Uppercase crypto ticker such as `BTC`, `USDT`, `1INCH` or `1000SATS`.
///
/// Tickers are ASCII alphanumerics in any position; digits may lead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let ticker = input.trim();
        if ticker.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        if let Some((index, ch)) = ticker
            .char_indices()
            .find(|(_, ch)| !ch.is_ascii_alphanumeric())
        {
            return Err(ValidationError::SymbolInvalidChar { ch, index });
        }

        // All ASCII from here, so bytes and chars agree.
        if ticker.len() > MAX_TICKER_LEN {
            return Err(ValidationError::SymbolTooLong {
                len: ticker.len(),
                max: MAX_TICKER_LEN,
            });
        }

        Ok(Self(ticker.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
