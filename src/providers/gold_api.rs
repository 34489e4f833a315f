use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::core::commodity::{CommodityPrice, CommodityPriceProvider, CommodityType, WeightUnit};

// GoldApiProvider implementation for CommodityPriceProvider
//
// The upstream quotes precious metals in USD per troy ounce.
pub struct GoldApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl GoldApiProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("fxm/0.2").build()?;
        Ok(GoldApiProvider {
            base_url: base_url.to_string(),
            client,
        })
    }
}

#[derive(Deserialize, Debug)]
struct SpotPriceResponse {
    price: Decimal,
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl CommodityPriceProvider for GoldApiProvider {
    async fn get_price(
        &self,
        commodity: CommodityType,
        timeout: Duration,
    ) -> Result<CommodityPrice> {
        let url = format!("{}/price/{}", self.base_url, commodity.ticker());
        debug!("Requesting {} spot price from {}", commodity, url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for commodity: {}", e, commodity))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for commodity: {}",
                response.status(),
                commodity
            ));
        }

        let data = response
            .json::<SpotPriceResponse>()
            .await
            .map_err(|e| anyhow!("Failed to parse spot price for {}: {}", commodity, e))?;

        debug!(
            "Received {} spot: {} USD/oz t",
            data.name.as_deref().unwrap_or(commodity.ticker()),
            data.price
        );

        Ok(CommodityPrice {
            price: data.price,
            currency: "USD".to_string(),
            unit: WeightUnit::TroyOunce,
        })
    }
}
