//! Alpaca trading API client, limited to the asset catalog.

use std::time::Duration;

use auth::ApiCredentials;
use common::AlpacaEnvironment;
use rest_client::RestClient;

use crate::client::REQUEST_TIMEOUT;
use crate::error::AlpacaRestError;
use crate::responses::Asset;

const ASSETS_PATH: &str = "/v2/assets";

/// Client for the Alpaca trading API.
#[derive(Debug, Clone)]
pub struct AlpacaTradingClient {
    client: RestClient,
    credentials: ApiCredentials,
    environment: AlpacaEnvironment,
}

impl AlpacaTradingClient {
    pub fn new(
        credentials: ApiCredentials,
        environment: AlpacaEnvironment,
    ) -> Result<Self, AlpacaRestError> {
        Self::with_timeout(credentials, environment, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        credentials: ApiCredentials,
        environment: AlpacaEnvironment,
        timeout: Duration,
    ) -> Result<Self, AlpacaRestError> {
        let client = RestClient::new(environment.trading_base_url(), timeout)?;
        Ok(Self {
            client,
            credentials,
            environment,
        })
    }

    /// Get the environment this client is connected to.
    pub fn environment(&self) -> AlpacaEnvironment {
        self.environment
    }

    /// All crypto assets, tradable or not.
    ///
    /// GET /v2/assets?asset_class=crypto
    pub async fn list_crypto_assets(&self) -> Result<Vec<Asset>, AlpacaRestError> {
        let headers = self.credentials.auth_headers();
        let assets: Vec<Asset> = self
            .client
            .get(ASSETS_PATH, Some("asset_class=crypto"), Some(&headers))
            .await?;

        tracing::debug!(count = assets.len(), "Crypto assets received");
        Ok(assets)
    }

    /// Symbols of every crypto asset currently flagged tradable.
    pub async fn tradable_symbols(&self) -> Result<Vec<String>, AlpacaRestError> {
        let assets = self.list_crypto_assets().await?;
        Ok(tradable_symbols(&assets))
    }
}

fn tradable_symbols(assets: &[Asset]) -> Vec<String> {
    assets
        .iter()
        .filter(|a| a.tradable)
        .map(|a| a.symbol.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(symbol: &str, tradable: bool) -> Asset {
        Asset {
            id: String::new(),
            asset_class: "crypto".to_string(),
            exchange: "CRYPTO".to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            status: "active".to_string(),
            tradable,
            marginable: false,
            shortable: false,
        }
    }

    #[test]
    fn test_tradable_filter_keeps_order() {
        let assets = vec![
            asset("BTC/USD", true),
            asset("DOGE/USD", false),
            asset("ETH/USD", true),
        ];
        assert_eq!(tradable_symbols(&assets), vec!["BTC/USD", "ETH/USD"]);
    }

    #[test]
    fn test_environment_selects_host() {
        let credentials = ApiCredentials::new("key".into(), "secret".into()).unwrap();
        let client = AlpacaTradingClient::new(credentials, AlpacaEnvironment::Live).unwrap();
        assert_eq!(client.environment(), AlpacaEnvironment::Live);
    }
}
