use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::core::crypto::FiatPriceMap;
use crate::core::decimal::to_decimal;
use crate::providers::util::with_retry;

// Upstream caps the joined fsyms query parameter length
const MAX_SYMBOLS_LEN: usize = 300;
const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 200;

/// CryptoCompare min-api client for symbol-keyed crypto quotes.
pub struct CryptoCompareClient {
    base_url: String,
    client: reqwest::Client,
}

impl CryptoCompareClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("fxm/0.2").build()?;
        Ok(CryptoCompareClient {
            base_url: base_url.to_string(),
            client,
        })
    }

    /// Price of 1 unit of `symbol` in `fiat`.
    pub async fn get_price(&self, symbol: &str, fiat: &str, timeout: Duration) -> Result<Decimal> {
        let url = format!("{}/data/price", self.base_url);
        let fiat = fiat.to_uppercase();
        let query = [
            ("fsym", symbol.to_uppercase()),
            ("tsyms", fiat.clone()),
        ];
        let data = self.fetch(&url, &query, timeout).await?;

        data.get(&fiat)
            .and_then(to_decimal)
            .ok_or_else(|| anyhow!("No {} price found for symbol: {}", fiat, symbol))
    }

    /// Batched quotes: symbol -> fiat -> price. Symbols are deduped and
    /// chunked so each request stays under the upstream length cap;
    /// non-numeric entries are dropped.
    pub async fn get_prices(
        &self,
        symbols: &[String],
        fiats: &[String],
        timeout: Duration,
    ) -> Result<FiatPriceMap> {
        let url = format!("{}/data/pricemulti", self.base_url);
        let tsyms = fiats
            .iter()
            .map(|f| f.to_uppercase())
            .collect::<Vec<_>>()
            .join(",");

        let mut result = FiatPriceMap::new();

        for chunk in chunk_symbols(symbols) {
            let query = [("fsyms", chunk.join(",")), ("tsyms", tsyms.clone())];
            let data = self.fetch(&url, &query, timeout).await?;

            let Some(rows) = data.as_object() else {
                return Err(anyhow!("Unexpected pricemulti payload"));
            };
            for (symbol, prices) in rows {
                let Some(prices) = prices.as_object() else {
                    continue;
                };
                let row = result.entry(symbol.to_uppercase()).or_default();
                for (fiat, value) in prices {
                    match to_decimal(value) {
                        Some(price) => {
                            row.insert(fiat.to_uppercase(), price);
                        }
                        None => debug!("Dropping non-numeric price {symbol}->{fiat}"),
                    }
                }
            }
        }

        Ok(result)
    }

    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        debug!("Requesting crypto prices from {}", url);
        let response = with_retry(
            || self.client.get(url).query(query).timeout(timeout).send(),
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} from {}", response.status(), url));
        }

        let data = response.json::<serde_json::Value>().await?;

        // CryptoCompare reports failures in-band with a 200 status
        if data.get("Response").and_then(|v| v.as_str()) == Some("Error") {
            let message = data
                .get("Message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(anyhow!("CryptoCompare error: {}", message));
        }

        Ok(data)
    }
}

fn chunk_symbols(symbols: &[String]) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0;

    for symbol in symbols {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() || !seen.insert(symbol.clone()) {
            continue;
        }

        let separator = usize::from(!current.is_empty());
        if !current.is_empty() && current_len + separator + symbol.len() > MAX_SYMBOLS_LEN {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current_len += symbol.len() + usize::from(!current.is_empty());
        current.push(symbol);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_single_price_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/price"))
            .and(query_param("fsym", "BTC"))
            .and(query_param("tsyms", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"USD": 50000}"#))
            .mount(&server)
            .await;

        let client = CryptoCompareClient::new(&server.uri()).unwrap();
        let price = client
            .get_price("btc", "usd", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(price, Decimal::from(50000));
    }

    #[tokio::test]
    async fn test_batched_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/pricemulti"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"BTC": {"EUR": 46000, "USD": 50000}, "ETH": {"EUR": 2500.5, "USD": 2700}}"#,
            ))
            .mount(&server)
            .await;

        let client = CryptoCompareClient::new(&server.uri()).unwrap();
        let prices = client
            .get_prices(
                &["BTC".to_string(), "ETH".to_string()],
                &["EUR".to_string(), "USD".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(prices["BTC"]["USD"], Decimal::from(50000));
        assert_eq!(
            prices["ETH"]["EUR"],
            Decimal::from_str("2500.5").unwrap()
        );
    }

    #[tokio::test]
    async fn test_in_band_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/pricemulti"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"Response": "Error", "Message": "fsyms param is invalid"}"#,
            ))
            .mount(&server)
            .await;

        let client = CryptoCompareClient::new(&server.uri()).unwrap();
        let result = client
            .get_prices(
                &["???".to_string()],
                &["USD".to_string()],
                Duration::from_secs(5),
            )
            .await;

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("CryptoCompare error: fsyms param is invalid")
        );
    }

    #[test]
    fn test_chunking_respects_length_cap_and_dedupes() {
        let symbols: Vec<String> = (0..100)
            .map(|i| format!("TOKEN{i:03}"))
            .chain(std::iter::once("TOKEN000".to_string()))
            .collect();

        let chunks = chunk_symbols(&symbols);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 100); // duplicate dropped
        for chunk in &chunks {
            assert!(chunk.join(",").len() <= MAX_SYMBOLS_LEN);
        }
    }

    #[test]
    fn test_chunking_skips_blank_symbols() {
        let chunks = chunk_symbols(&[" ".to_string(), "btc".to_string()]);
        assert_eq!(chunks, vec![vec!["BTC".to_string()]]);
    }
}
