//! Crypto asset pricing abstractions

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;

/// Identifies a held crypto asset for price lookup. Tokens carrying a
/// contract address are looked up by address to avoid symbol collisions
/// across chains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CryptoAssetKey {
    pub symbol: String,
    pub contract_address: Option<String>,
}

/// lookup key -> fiat ISO -> price of 1 unit in that fiat.
pub type FiatPriceMap = HashMap<String, HashMap<String, Decimal>>;

/// Batched lookup result, split by how the asset was resolved.
#[derive(Debug, Clone, Default)]
pub struct CryptoPriceMap {
    pub by_symbol: FiatPriceMap,
    pub by_address: FiatPriceMap,
}

#[async_trait]
pub trait CryptoPriceProvider: Send + Sync {
    /// Price of 1 unit of `symbol` denominated in `fiat`.
    async fn get_price(&self, symbol: &str, fiat: &str, timeout: Duration) -> Result<Decimal>;

    async fn get_prices_by_symbols(
        &self,
        symbols: &[String],
        fiats: &[String],
        timeout: Duration,
    ) -> Result<FiatPriceMap>;

    async fn get_prices_by_addresses(
        &self,
        addresses: &[String],
        fiats: &[String],
        timeout: Duration,
    ) -> Result<FiatPriceMap>;
}
