//! Binance spot price client
//!
//! Fetches the latest spot price for a fixed symbol from the Binance REST
//! ticker endpoint. One shared client serves both series.

use super::{SpotQuote, SpotSource};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Ticker response from Binance
#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

/// Binance REST spot client for /api/v3/ticker/price
pub struct BinanceSpotClient {
    base_url: String,
    symbol: String,
    client: Client,
}

impl BinanceSpotClient {
    pub fn new(base_url: impl Into<String>, symbol: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into(),
            symbol: symbol.into().to_uppercase(),
            client,
        }
    }

    fn ticker_url(&self) -> String {
        format!("{}/api/v3/ticker/price", self.base_url)
    }

    fn parse_response(raw: &str) -> anyhow::Result<Decimal> {
        let ticker: TickerResponse = serde_json::from_str(raw)?;
        Decimal::from_str(&ticker.price)
            .map_err(|e| anyhow::anyhow!("bad price {}: {}", ticker.price, e))
    }
}

#[async_trait]
impl SpotSource for BinanceSpotClient {
    async fn fetch(&self) -> anyhow::Result<SpotQuote> {
        let response = self
            .client
            .get(self.ticker_url())
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Binance ticker status {}", response.status());
        }

        let body = response.text().await?;
        let price = Self::parse_response(&body)?;

        Ok(SpotQuote {
            price,
            observed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_uppercases_symbol() {
        let client = BinanceSpotClient::new("https://api.binance.com", "btcusdt");
        assert_eq!(client.symbol, "BTCUSDT");
    }

    #[test]
    fn test_ticker_url() {
        let client = BinanceSpotClient::new("https://api.binance.com", "BTCUSDT");
        assert_eq!(
            client.ticker_url(),
            "https://api.binance.com/api/v3/ticker/price"
        );
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{"symbol":"BTCUSDT","price":"67000.50000000"}"#;
        assert_eq!(
            BinanceSpotClient::parse_response(raw).unwrap(),
            dec!(67000.50000000)
        );
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(BinanceSpotClient::parse_response("not json").is_err());
    }

    #[test]
    fn test_parse_response_invalid_price() {
        let raw = r#"{"symbol":"BTCUSDT","price":"not_a_number"}"#;
        assert!(BinanceSpotClient::parse_response(raw).is_err());
    }
}
