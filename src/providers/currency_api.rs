use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::core::rates::{BaseRateProvider, RawRateMatrix};

// CurrencyApiProvider implementation for BaseRateProvider
//
// Talks to the fawazahmed0 currency CDN: one document per base currency,
// shaped { "date": "...", "<base>": { "<quote>": rate } }. Values are left
// raw; the engine normalizes them before they reach the matrix.
pub struct CurrencyApiProvider {
    base_url: String,
    currencies: Vec<String>,
    client: reqwest::Client,
}

impl CurrencyApiProvider {
    pub fn new(base_url: &str, currencies: &[String]) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("fxm/0.2").build()?;
        Ok(CurrencyApiProvider {
            base_url: base_url.to_string(),
            currencies: currencies.to_vec(),
            client,
        })
    }

    async fn fetch_rates(&self, currency: &str, timeout: Duration) -> Result<serde_json::Value> {
        let url = format!(
            "{}/currencies/{}.min.json",
            self.base_url,
            currency.to_lowercase()
        );
        debug!("Requesting fiat rates from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for currency: {} URL: {}", e, currency, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency: {}",
                response.status(),
                currency
            ));
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[async_trait]
impl BaseRateProvider for CurrencyApiProvider {
    async fn get_matrix(&self, timeout: Duration) -> Result<RawRateMatrix> {
        let mut matrix = RawRateMatrix::new();

        for currency in &self.currencies {
            let payload = self.fetch_rates(currency, timeout).await?;
            let rates = payload
                .get(currency.to_lowercase())
                .and_then(|v| v.as_object())
                .ok_or_else(|| anyhow!("No rate data found for currency: {}", currency))?;

            let row: HashMap<String, serde_json::Value> = rates
                .iter()
                .map(|(quote, value)| (quote.to_uppercase(), value.clone()))
                .collect();
            matrix.insert(currency.to_uppercase(), row);
        }

        Ok(matrix)
    }
}
