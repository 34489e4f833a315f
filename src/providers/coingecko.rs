use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::debug;

use crate::core::crypto::FiatPriceMap;
use crate::core::decimal::to_decimal;
use crate::providers::util::with_retry;

const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 300;

/// CoinGecko client for contract-address keyed token quotes.
pub struct CoinGeckoClient {
    base_url: String,
    platform: String,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, platform: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("fxm/0.2").build()?;
        Ok(CoinGeckoClient {
            base_url: base_url.to_string(),
            platform: platform.to_string(),
            client,
        })
    }

    /// Token quotes by contract address: address -> fiat -> price.
    /// Addresses come back lowercased, fiat codes uppercased.
    pub async fn get_prices_by_addresses(
        &self,
        addresses: &[String],
        fiats: &[String],
        timeout: Duration,
    ) -> Result<FiatPriceMap> {
        if addresses.is_empty() {
            return Ok(FiatPriceMap::new());
        }

        let url = format!(
            "{}/api/v3/simple/token_price/{}",
            self.base_url, self.platform
        );
        let contract_addresses = addresses
            .iter()
            .map(|a| a.trim().to_lowercase())
            .collect::<Vec<_>>()
            .join(",");
        let vs_currencies = fiats
            .iter()
            .map(|f| f.to_lowercase())
            .collect::<Vec<_>>()
            .join(",");
        debug!("Requesting token prices from {}", url);

        let response = with_retry(
            || {
                self.client
                    .get(&url)
                    .query(&[
                        ("contract_addresses", &contract_addresses),
                        ("vs_currencies", &vs_currencies),
                    ])
                    .timeout(timeout)
                    .send()
            },
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for token price lookup on {}",
                response.status(),
                self.platform
            ));
        }

        let data = response.json::<serde_json::Value>().await?;
        let rows = data
            .as_object()
            .ok_or_else(|| anyhow!("Unexpected token price payload"))?;

        let mut result = FiatPriceMap::new();
        for (address, prices) in rows {
            let Some(prices) = prices.as_object() else {
                continue;
            };
            let row = result.entry(address.to_lowercase()).or_default();
            for (fiat, value) in prices {
                match to_decimal(value) {
                    Some(price) => {
                        row.insert(fiat.to_uppercase(), price);
                    }
                    None => debug!("Dropping non-numeric token price {address}->{fiat}"),
                }
            }
        }

        Ok(result)
    }
}
