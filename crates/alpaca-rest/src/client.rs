//! Alpaca crypto market data client.

use std::collections::HashMap;
use std::time::Duration;

use auth::ApiCredentials;
use chrono::{DateTime, SecondsFormat, Utc};
use common::AlpacaEnvironment;
use model::{Bar, OrderBook};
use rest_client::RestClient;

use crate::error::AlpacaRestError;
use crate::responses::{HistoricalBarsResponse, LatestBarsResponse, LatestOrderBooksResponse};

/// Per-request timeout for market data calls. Kept well under the polling interval
/// budget so a stalled request cannot hold a poller hostage.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const LATEST_BARS_PATH: &str = "/v1beta3/crypto/us/latest/bars";
const LATEST_ORDERBOOKS_PATH: &str = "/v1beta3/crypto/us/latest/orderbooks";
const HISTORICAL_BARS_PATH: &str = "/v1beta3/crypto/us/bars";

/// Maximum bars per historical page accepted by the API.
const HISTORICAL_PAGE_SIZE: u32 = 10_000;

/// Join symbols for the `symbols` query parameter, escaping the `/` in each pair.
pub fn encode_symbols(symbols: &[String]) -> String {
    symbols
        .iter()
        .map(|s| s.replace('/', "%2F"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parameters for a historical bars download.
#[derive(Debug, Clone)]
pub struct HistoricalBarsRequest {
    pub symbol: String,
    /// Bar timeframe, e.g. `1Min`, `1Hour`, `1Day`.
    pub timeframe: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Upper bound on the number of pages followed.
    pub max_pages: usize,
}

impl HistoricalBarsRequest {
    fn query(&self, page_token: Option<&str>) -> String {
        let mut query = format!(
            "symbols={}&timeframe={}&start={}&end={}&limit={}&sort=asc",
            encode_symbols(std::slice::from_ref(&self.symbol)),
            self.timeframe,
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            HISTORICAL_PAGE_SIZE,
        );
        if let Some(token) = page_token {
            query.push_str("&page_token=");
            query.push_str(token);
        }
        query
    }
}

/// Client for the Alpaca crypto market data REST API.
#[derive(Debug, Clone)]
pub struct AlpacaDataClient {
    client: RestClient,
    credentials: ApiCredentials,
}

impl AlpacaDataClient {
    /// Create a client for the given environment with the default request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        credentials: ApiCredentials,
        environment: AlpacaEnvironment,
    ) -> Result<Self, AlpacaRestError> {
        Self::with_base_url(environment.data_base_url(), credentials, REQUEST_TIMEOUT)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(
        base_url: &str,
        credentials: ApiCredentials,
        timeout: Duration,
    ) -> Result<Self, AlpacaRestError> {
        let client = RestClient::new(base_url, timeout)?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Latest bar per symbol.
    ///
    /// GET /v1beta3/crypto/us/latest/bars
    pub async fn get_latest_bars(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Bar>, AlpacaRestError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!("symbols={}", encode_symbols(symbols));
        let headers = self.credentials.auth_headers();
        let response: LatestBarsResponse = self
            .client
            .get(LATEST_BARS_PATH, Some(&query), Some(&headers))
            .await?;

        let bars = response.into_bars();
        tracing::debug!(requested = symbols.len(), received = bars.len(), "Latest bars received");
        Ok(bars)
    }

    /// Latest order book snapshot per symbol.
    ///
    /// GET /v1beta3/crypto/us/latest/orderbooks
    pub async fn get_latest_orderbooks(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, OrderBook>, AlpacaRestError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!("symbols={}", encode_symbols(symbols));
        let headers = self.credentials.auth_headers();
        let response: LatestOrderBooksResponse = self
            .client
            .get(LATEST_ORDERBOOKS_PATH, Some(&query), Some(&headers))
            .await?;

        let books = response.into_order_books();
        tracing::debug!(
            requested = symbols.len(),
            received = books.len(),
            "Latest order books received"
        );
        Ok(books)
    }

    /// Download historical bars for one symbol, following pagination.
    ///
    /// GET /v1beta3/crypto/us/bars
    ///
    /// Stops at the last page or after `request.max_pages` pages, whichever comes first.
    pub async fn get_historical_bars(
        &self,
        request: &HistoricalBarsRequest,
    ) -> Result<Vec<Bar>, AlpacaRestError> {
        if request.end <= request.start {
            return Err(AlpacaRestError::InvalidRequest(format!(
                "end {} is not after start {}",
                request.end, request.start
            )));
        }

        let headers = self.credentials.auth_headers();
        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..request.max_pages {
            let query = request.query(page_token.as_deref());
            let response: HistoricalBarsResponse = self
                .client
                .get(HISTORICAL_BARS_PATH, Some(&query), Some(&headers))
                .await?;

            let page_bars = response
                .bars
                .into_iter()
                .filter(|(symbol, _)| *symbol == request.symbol)
                .flat_map(|(_, raw)| raw.into_iter().map(Bar::from));
            bars.extend(page_bars);

            tracing::debug!(
                symbol = %request.symbol,
                page = page + 1,
                total = bars.len(),
                "Historical bars page received"
            );

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(bars),
            }
        }

        tracing::warn!(
            symbol = %request.symbol,
            max_pages = request.max_pages,
            "Historical download stopped at page limit"
        );
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_symbols() {
        let symbols = vec!["BTC/USD".to_string(), "ETH/USD".to_string()];
        assert_eq!(encode_symbols(&symbols), "BTC%2FUSD,ETH%2FUSD");
    }

    #[test]
    fn test_encode_symbols_preserves_case() {
        let symbols = vec!["btc/usd".to_string()];
        assert_eq!(encode_symbols(&symbols), "btc%2Fusd");
    }

    #[test]
    fn test_historical_query() {
        let request = HistoricalBarsRequest {
            symbol: "BTC/USD".to_string(),
            timeframe: "1Min".to_string(),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            max_pages: 5,
        };

        assert_eq!(
            request.query(None),
            "symbols=BTC%2FUSD&timeframe=1Min&start=2024-01-01T00:00:00Z&end=2024-01-02T00:00:00Z&limit=10000&sort=asc"
        );
        assert!(request.query(Some("tok")).ends_with("&page_token=tok"));
    }

    #[tokio::test]
    async fn test_empty_symbols_skip_request() {
        let credentials = ApiCredentials::new("key".into(), "secret".into()).unwrap();
        // Unroutable base URL: any request would fail.
        let client =
            AlpacaDataClient::with_base_url("http://127.0.0.1:9", credentials, REQUEST_TIMEOUT)
                .unwrap();

        assert!(client.get_latest_bars(&[]).await.unwrap().is_empty());
        assert!(client.get_latest_orderbooks(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_historical_rejects_inverted_range() {
        let credentials = ApiCredentials::new("key".into(), "secret".into()).unwrap();
        let client = AlpacaDataClient::new(credentials, AlpacaEnvironment::Paper).unwrap();
        let request = HistoricalBarsRequest {
            symbol: "BTC/USD".to_string(),
            timeframe: "1Min".to_string(),
            start: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            max_pages: 1,
        };

        let err = client.get_historical_bars(&request).await.unwrap_err();
        assert!(matches!(err, AlpacaRestError::InvalidRequest(_)));
    }
}
