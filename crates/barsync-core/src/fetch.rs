//! Remote fetch contract for paginated histo endpoints.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::{Bar, Symbol, Timeframe, UtcDateTime};

/// Largest page the upstream API will serve in one call.
pub const MAX_PAGE_SIZE: usize = 2000;

/// One bounded page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub symbol: Symbol,
    pub quote_currency: Symbol,
    pub timeframe: Timeframe,
    pub limit: usize,
    /// Only bars ending at or before this instant; `None` means "now".
    pub cursor: Option<UtcDateTime>,
}

impl PageRequest {
    pub fn new(symbol: Symbol, quote_currency: Symbol, timeframe: Timeframe, limit: usize) -> Self {
        Self {
            symbol,
            quote_currency,
            timeframe,
            limit: limit.min(MAX_PAGE_SIZE),
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: UtcDateTime) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// Result of one paginated call, bars in API order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPage {
    pub bars: Vec<Bar>,
    /// Earliest timestamp covered by the page; the next cursor derives from it.
    pub time_from: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("upstream error: {message}")]
    Upstream { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Fetch client contract. Implementations never retry.
pub trait FetchClient: Send + Sync {
    fn fetch_page<'a>(
        &'a self,
        request: PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchPage, FetchError>> + Send + 'a>>;
}
