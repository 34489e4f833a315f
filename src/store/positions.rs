use crate::core::config::CryptoHolding;
use crate::core::crypto::CryptoAssetKey;
use crate::core::position::PositionReader;
use anyhow::Result;
use async_trait::async_trait;

/// Derives crypto price lookup keys from the `holdings` section of the
/// config file. Symbols are uppercased, contract addresses lowercased;
/// holdings with a blank symbol are skipped.
pub struct ConfigPositionReader {
    holdings: Vec<CryptoHolding>,
}

impl ConfigPositionReader {
    pub fn new(holdings: &[CryptoHolding]) -> Self {
        Self {
            holdings: holdings.to_vec(),
        }
    }
}

#[async_trait]
impl PositionReader for ConfigPositionReader {
    async fn held_crypto_assets(&self) -> Result<Vec<CryptoAssetKey>> {
        let mut out = Vec::new();
        for holding in &self.holdings {
            let symbol = holding.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            let contract_address = holding
                .contract_address
                .as_deref()
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_lowercase);
            out.push(CryptoAssetKey {
                symbol,
                contract_address,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, address: Option<&str>) -> CryptoHolding {
        CryptoHolding {
            symbol: symbol.to_string(),
            contract_address: address.map(str::to_string),
            units: Some(1.0),
        }
    }

    #[tokio::test]
    async fn test_normalizes_symbols_and_addresses() {
        let reader = ConfigPositionReader::new(&[
            holding("btc", None),
            holding("PEPE", Some(" 0xAbCd00 ")),
        ]);

        let assets = reader.held_crypto_assets().await.unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].symbol, "BTC");
        assert_eq!(assets[0].contract_address, None);
        assert_eq!(assets[1].symbol, "PEPE");
        assert_eq!(assets[1].contract_address.as_deref(), Some("0xabcd00"));
    }

    #[tokio::test]
    async fn test_blank_symbols_are_skipped() {
        let reader =
            ConfigPositionReader::new(&[holding("  ", None), holding("ETH", Some("   "))]);

        let assets = reader.held_crypto_assets().await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].symbol, "ETH");
        // Blank address collapses to a symbol-only key
        assert_eq!(assets[0].contract_address, None);
    }
}
