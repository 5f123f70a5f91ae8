use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::fetch::{FetchClient, FetchError, FetchPage, PageRequest};
use crate::http_client::{
    HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient, DEFAULT_TIMEOUT_MS,
};
use crate::{Bar, UtcDateTime};

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com/data/v2";

/// Envelope status marking an application-level failure.
const RESPONSE_ERROR: &str = "Error";

/// Fetch client for the CryptoCompare `min-api` v2 histo endpoints.
#[derive(Clone)]
pub struct CryptoCompareClient {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl CryptoCompareClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), api_key)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Request URL without the credential, safe to log.
    fn public_url(&self, request: &PageRequest) -> String {
        let mut url = format!(
            "{}/{}?fsym={}&tsym={}&limit={}",
            self.base_url,
            request.timeframe.endpoint(),
            urlencoding::encode(request.symbol.as_str()),
            urlencoding::encode(request.quote_currency.as_str()),
            request.limit
        );
        if let Some(cursor) = request.cursor {
            url.push_str(&format!("&toTs={}", cursor.unix_timestamp()));
        }
        url
    }

    fn authenticated_url(&self, public_url: &str) -> String {
        if self.api_key.is_empty() {
            return public_url.to_owned();
        }
        format!(
            "{public_url}&api_key={}",
            urlencoding::encode(self.api_key.as_str())
        )
    }

    async fn execute(&self, request: PageRequest) -> Result<FetchPage, FetchError> {
        let public_url = self.public_url(&request);
        tracing::debug!(url = %public_url, "requesting histo page");

        let http_request = HttpRequest::get(self.authenticated_url(&public_url))
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|error| FetchError::transport(error.message()))?;

        let page = decode_page(&request, &response)?;
        tracing::debug!(
            url = %public_url,
            bars = page.bars.len(),
            time_from = %page.time_from,
            "received histo page"
        );
        Ok(page)
    }
}

impl FetchClient for CryptoCompareClient {
    fn fetch_page<'a>(
        &'a self,
        request: PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchPage, FetchError>> + Send + 'a>> {
        Box::pin(self.execute(request))
    }
}

#[derive(Debug, Deserialize)]
struct EnvelopeStatus {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct HistoEnvelope {
    #[serde(rename = "Data")]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "TimeFrom")]
    time_from: Option<i64>,
    #[serde(rename = "Data")]
    bars: Option<Vec<HistoBar>>,
}

#[derive(Debug, Deserialize)]
struct HistoBar {
    time: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volumefrom: Decimal,
    volumeto: Decimal,
}

/// Map a raw HTTP exchange to a page.
///
/// The envelope's `Response` field decides upstream failure regardless of
/// HTTP status. A non-2xx body that is not an envelope is a transport
/// failure; a 2xx body that is not a valid envelope is a decode failure.
fn decode_page(request: &PageRequest, response: &HttpResponse) -> Result<FetchPage, FetchError> {
    let success = response.is_success();
    let status = response.status;
    let body = response.body.as_str();

    let envelope_status = match serde_json::from_str::<EnvelopeStatus>(body) {
        Ok(envelope_status) => envelope_status,
        Err(_) if !success => {
            return Err(FetchError::transport(format!(
                "upstream returned status {status}"
            )))
        }
        Err(error) => {
            return Err(FetchError::decode(format!(
                "histo payload is not valid JSON: {error}"
            )))
        }
    };

    if envelope_status.response == RESPONSE_ERROR {
        return Err(FetchError::upstream(envelope_status.message));
    }

    if !success {
        return Err(FetchError::transport(format!(
            "upstream returned status {status}"
        )));
    }

    let envelope: HistoEnvelope = serde_json::from_str(body)
        .map_err(|error| FetchError::decode(format!("malformed histo payload: {error}")))?;

    let data = envelope
        .data
        .ok_or_else(|| FetchError::decode("histo payload is missing Data"))?;
    let raw_bars = data
        .bars
        .ok_or_else(|| FetchError::decode("histo payload is missing Data.Data"))?;

    let bars = raw_bars
        .into_iter()
        .map(|raw| normalize_bar(request, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let time_from = match data.time_from {
        Some(seconds) => to_timestamp(seconds)?,
        None => bars
            .iter()
            .map(|bar| bar.ts)
            .min()
            .ok_or_else(|| FetchError::decode("histo payload is missing Data.TimeFrom"))?,
    };

    Ok(FetchPage { bars, time_from })
}

fn normalize_bar(request: &PageRequest, raw: HistoBar) -> Result<Bar, FetchError> {
    Bar::new(
        request.symbol.clone(),
        request.quote_currency.clone(),
        to_timestamp(raw.time)?,
        raw.open,
        raw.high,
        raw.low,
        raw.close,
        raw.volumefrom,
        raw.volumeto,
    )
    .map_err(|error| FetchError::decode(format!("invalid bar at {}: {error}", raw.time)))
}

fn to_timestamp(seconds: i64) -> Result<UtcDateTime, FetchError> {
    UtcDateTime::from_unix_timestamp(seconds).map_err(|error| FetchError::decode(error.to_string()))
}
