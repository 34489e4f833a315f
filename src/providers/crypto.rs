use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::core::crypto::{CryptoPriceProvider, FiatPriceMap};
use crate::providers::coingecko::CoinGeckoClient;
use crate::providers::cryptocompare::CryptoCompareClient;

// CryptoMarketClient implementation for CryptoPriceProvider
//
// Symbol lookups go to CryptoCompare, contract-address lookups to
// CoinGecko; the engine decides which keys take which route.
pub struct CryptoMarketClient {
    symbols: CryptoCompareClient,
    addresses: CoinGeckoClient,
}

impl CryptoMarketClient {
    pub fn new(symbols: CryptoCompareClient, addresses: CoinGeckoClient) -> Self {
        CryptoMarketClient { symbols, addresses }
    }
}

#[async_trait]
impl CryptoPriceProvider for CryptoMarketClient {
    async fn get_price(&self, symbol: &str, fiat: &str, timeout: Duration) -> Result<Decimal> {
        self.symbols.get_price(symbol, fiat, timeout).await
    }

    async fn get_prices_by_symbols(
        &self,
        symbols: &[String],
        fiats: &[String],
        timeout: Duration,
    ) -> Result<FiatPriceMap> {
        self.symbols.get_prices(symbols, fiats, timeout).await
    }

    async fn get_prices_by_addresses(
        &self,
        addresses: &[String],
        fiats: &[String],
        timeout: Duration,
    ) -> Result<FiatPriceMap> {
        self.addresses
            .get_prices_by_addresses(addresses, fiats, timeout)
            .await
    }
}
