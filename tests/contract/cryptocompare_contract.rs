//! Contract tests for the CryptoCompare histo client.
//!
//! A canned transport stands in for the network so the request shape and the
//! mapping of every response class to a page or an error can be pinned down.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use barsync_core::{
    CryptoCompareClient, FetchClient, FetchError, HttpClient, HttpError, HttpRequest,
    HttpResponse, PageRequest, Symbol, Timeframe, UtcDateTime, MAX_PAGE_SIZE,
};
use rust_decimal_macros::dec;

struct CannedHttpClient {
    response: Result<HttpResponse, HttpError>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_url(&self) -> String {
        self.seen
            .lock()
            .expect("seen lock")
            .last()
            .map(|request| request.url.clone())
            .expect("a request was sent")
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.seen.lock().expect("seen lock").push(request);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

fn client(transport: &Arc<CannedHttpClient>) -> CryptoCompareClient {
    let transport: Arc<dyn HttpClient> = Arc::clone(transport) as Arc<dyn HttpClient>;
    CryptoCompareClient::with_http_client(transport, "test-key")
        .with_base_url("https://histo.test/data/v2")
}

fn request(timeframe: Timeframe, limit: usize) -> PageRequest {
    PageRequest::new(
        Symbol::parse("BTC").expect("symbol"),
        Symbol::parse("USD").expect("symbol"),
        timeframe,
        limit,
    )
}

const DAILY_PAGE: &str = r#"{
    "Response": "Success",
    "Message": "",
    "HasWarning": false,
    "Type": 100,
    "Data": {
        "Aggregated": false,
        "TimeFrom": 1704067200,
        "TimeTo": 1704153600,
        "Data": [
            {"time": 1704067200, "high": 42890.12, "low": 42180.5, "open": 42280.33,
             "volumefrom": 21543.77, "volumeto": 918273645.12, "close": 42560.01,
             "conversionType": "direct", "conversionSymbol": ""},
            {"time": 1704153600, "high": 45250, "low": 42560.01, "open": 42560.01,
             "volumefrom": 40123.5, "volumeto": 1765432198.4, "close": 44970.2,
             "conversionType": "direct", "conversionSymbol": ""}
        ]
    }
}"#;

// =============================================================================
// Request shape
// =============================================================================

#[tokio::test]
async fn request_targets_the_timeframe_endpoint_with_pair_limit_and_key() {
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(DAILY_PAGE)));

    client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect("page decodes");

    assert_eq!(
        transport.last_url(),
        "https://histo.test/data/v2/histoday?fsym=BTC&tsym=USD&limit=2&api_key=test-key"
    );
}

#[tokio::test]
async fn cursor_becomes_to_ts_in_unix_seconds() {
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(DAILY_PAGE)));
    let cursor = UtcDateTime::parse("2024-01-10T00:00:05Z").expect("timestamp");

    client(&transport)
        .fetch_page(request(Timeframe::Minute, 10).with_cursor(cursor))
        .await
        .expect("page decodes");

    let url = transport.last_url();
    assert!(url.contains("/histominute?"), "unexpected url: {url}");
    assert!(url.contains("&toTs=1704844805"), "unexpected url: {url}");
}

#[tokio::test]
async fn limit_is_capped_at_the_upstream_maximum() {
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(DAILY_PAGE)));
    client(&transport)
        .fetch_page(request(Timeframe::Hourly, 50_000))
        .await
        .expect("page decodes");

    assert!(transport
        .last_url()
        .contains(&format!("&limit={MAX_PAGE_SIZE}&")));
}

// =============================================================================
// Response mapping
// =============================================================================

#[tokio::test]
async fn success_envelope_decodes_into_exact_bars() {
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(DAILY_PAGE)));

    let page = client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect("page decodes");

    assert_eq!(page.time_from.unix_timestamp(), 1_704_067_200);
    assert_eq!(page.bars.len(), 2);

    let first = &page.bars[0];
    assert_eq!(first.symbol.as_str(), "BTC");
    assert_eq!(first.quote_currency.as_str(), "USD");
    assert_eq!(first.open, dec!(42280.33));
    assert_eq!(first.high, dec!(42890.12));
    assert_eq!(first.low, dec!(42180.5));
    assert_eq!(first.close, dec!(42560.01));
    assert_eq!(first.volume_base, dec!(21543.77));
    assert_eq!(first.volume_quote, dec!(918273645.12));
    assert_eq!(page.bars[1].ts.unix_timestamp(), 1_704_153_600);
}

#[tokio::test]
async fn error_envelope_maps_to_upstream_error_even_with_http_200() {
    let body = r#"{"Response":"Error","Message":"fsym param is invalid","HasWarning":false,"Type":2,"Data":{}}"#;
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(body)));

    let error = client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect_err("must fail");

    assert_eq!(error, FetchError::upstream("fsym param is invalid"));
}

#[tokio::test]
async fn error_envelope_on_http_429_is_still_an_upstream_error() {
    let body = r#"{"Response":"Error","Message":"You are over your rate limit","Data":{}}"#;
    let transport = CannedHttpClient::new(Ok(HttpResponse::with_status(429, body)));

    let error = client(&transport)
        .fetch_page(request(Timeframe::Hourly, 2))
        .await
        .expect_err("must fail");

    assert!(matches!(error, FetchError::Upstream { .. }));
}

#[tokio::test]
async fn malformed_json_maps_to_decode_error() {
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json("{\"Response\": \"Succ")));

    let error = client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect_err("must fail");

    assert!(matches!(error, FetchError::Decode { .. }));
}

#[tokio::test]
async fn non_numeric_price_maps_to_decode_error() {
    let body = r#"{"Response":"Success","Message":"","Data":{"TimeFrom":1704067200,"TimeTo":1704067200,
        "Data":[{"time":1704067200,"open":"n/a","high":1,"low":1,"close":1,"volumefrom":1,"volumeto":1}]}}"#;
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(body)));

    let error = client(&transport)
        .fetch_page(request(Timeframe::Daily, 1))
        .await
        .expect_err("must fail");

    assert!(matches!(error, FetchError::Decode { .. }));
}

#[tokio::test]
async fn server_error_page_maps_to_transport_error() {
    let transport = CannedHttpClient::new(Ok(HttpResponse::with_status(
        503,
        "<html><body>Service Unavailable</body></html>",
    )));

    let error = client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect_err("must fail");

    assert!(matches!(error, FetchError::Transport { .. }));
}

#[tokio::test]
async fn network_failure_maps_to_transport_error() {
    let transport = CannedHttpClient::new(Err(HttpError::new("connection failed: refused")));

    let error = client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect_err("must fail");

    assert_eq!(error, FetchError::transport("connection failed: refused"));
}

#[tokio::test]
async fn empty_history_decodes_into_an_empty_page() {
    let body = r#"{"Response":"Success","Message":"","Data":{"TimeFrom":1000,"TimeTo":1000,"Data":[]}}"#;
    let transport = CannedHttpClient::new(Ok(HttpResponse::ok_json(body)));

    let page = client(&transport)
        .fetch_page(request(Timeframe::Daily, 2))
        .await
        .expect("page decodes");

    assert!(page.bars.is_empty());
    assert_eq!(page.time_from.unix_timestamp(), 1000);
}
