//! Folds task results into the live rate matrix.

use crate::core::commodity::{CommodityPrice, CommodityType};
use crate::core::decimal::to_decimal;
use crate::core::rates::{RateMatrix, RawRateMatrix};
use crate::engine::scheduler::{TaskKind, TaskOutput, TaskResult};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Accumulates completed task results during a refresh cycle and applies
/// them to the live matrix once the cycle's scheduler loop is done.
///
/// Quote symbols are normalized on the way in: crypto tickers uppercased,
/// contract addresses lowercased and prefixed `addr:`.
pub struct RateMerger {
    supported_currencies: Vec<String>,
    refreshed_base: Option<HashMap<String, HashMap<String, Decimal>>>,
    commodity_prices: HashMap<CommodityType, CommodityPrice>,
    // quote fiat -> matrix key -> price of 1 unit in that fiat
    crypto_prices: HashMap<String, HashMap<String, Decimal>>,
    got_crypto_batch: bool,
}

impl RateMerger {
    pub fn new(supported_currencies: &[String]) -> Self {
        Self {
            supported_currencies: supported_currencies.to_vec(),
            refreshed_base: None,
            commodity_prices: HashMap::new(),
            crypto_prices: HashMap::new(),
            got_crypto_batch: false,
        }
    }

    /// Consumes one task result. Failures are logged and contribute nothing
    /// this cycle; successful values are staged for [`RateMerger::apply`].
    pub fn consume(&mut self, result: TaskResult) {
        let TaskResult { kind, outcome, .. } = result;

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                match &kind {
                    TaskKind::Base => error!("Failed base fiat matrix fetch: {e:#}"),
                    TaskKind::Commodity { commodity } => {
                        error!("Failed {commodity} price fetch: {e:#}")
                    }
                    TaskKind::Crypto {
                        symbol,
                        base_currency,
                    } => error!("Failed crypto price for {symbol} in {base_currency}: {e:#}"),
                    TaskKind::CryptoBatch { asset_count } => {
                        error!("Failed batched crypto price fetch ({asset_count} assets): {e:#}")
                    }
                }
                return;
            }
        };

        match output {
            TaskOutput::Base(raw) => {
                self.refreshed_base = Some(normalize_base(raw));
            }
            TaskOutput::Commodity(price) => {
                if let TaskKind::Commodity { commodity } = kind {
                    self.commodity_prices.insert(commodity, price);
                }
            }
            TaskOutput::Crypto(price) => {
                if let TaskKind::Crypto {
                    symbol,
                    base_currency,
                } = kind
                {
                    self.crypto_prices
                        .entry(base_currency)
                        .or_default()
                        .insert(symbol.to_uppercase(), price);
                }
            }
            TaskOutput::CryptoBatch(map) => {
                self.got_crypto_batch = true;
                for (symbol, fiat_map) in map.by_symbol {
                    for (fiat, price) in fiat_map {
                        self.crypto_prices
                            .entry(fiat)
                            .or_default()
                            .insert(symbol.to_uppercase(), price);
                    }
                }
                for (address, fiat_map) in map.by_address {
                    for (fiat, price) in fiat_map {
                        self.crypto_prices
                            .entry(fiat)
                            .or_default()
                            .insert(format!("addr:{}", address.to_lowercase()), price);
                    }
                }
            }
        }
    }

    /// True once a position-driven crypto batch has landed successfully.
    pub fn got_crypto_batch(&self) -> bool {
        self.got_crypto_batch
    }

    /// Applies everything staged so far to the live matrix, key by key.
    /// Returns true when a refreshed base matrix was merged in.
    pub fn apply(self, matrix: &mut RateMatrix) -> bool {
        let base_refreshed = self.refreshed_base.is_some();

        if let Some(rows) = self.refreshed_base {
            for (base, quotes) in rows {
                for (quote, rate) in quotes {
                    matrix.insert(&base, &quote, rate);
                }
            }
        }

        for base in &self.supported_currencies {
            for (commodity, spot) in &self.commodity_prices {
                apply_commodity(matrix, base, *commodity, spot);
            }
            if let Some(prices) = self.crypto_prices.get(base) {
                apply_crypto(matrix, base, prices);
            }
        }

        base_refreshed
    }
}

fn normalize_base(raw: RawRateMatrix) -> HashMap<String, HashMap<String, Decimal>> {
    let mut rows = HashMap::new();
    for (base, quotes) in raw {
        let mut row = HashMap::new();
        for (quote, value) in quotes {
            match to_decimal(&value) {
                Some(rate) => {
                    row.insert(quote, rate);
                }
                None => warn!("Dropping non-numeric rate {base}->{quote}"),
            }
        }
        rows.insert(base, row);
    }
    rows
}

/// Derives `matrix[base][ticker]` from a spot price quoted in the
/// provider's currency. When the fiat leg from `base` to that currency is
/// not known yet, the entry is deferred to the next cycle.
fn apply_commodity(matrix: &mut RateMatrix, base: &str, commodity: CommodityType, spot: &CommodityPrice) {
    if spot.price.is_zero() {
        warn!("Skipping {commodity} for {base}: zero spot price");
        return;
    }

    let rate = if base == spot.currency {
        Decimal::ONE.checked_div(spot.price)
    } else {
        match matrix.get(base, &spot.currency) {
            Some(leg) if !leg.is_zero() => leg.checked_div(spot.price),
            _ => {
                debug!(
                    "No {base}->{} leg yet; deferring {commodity} for {base}",
                    spot.currency
                );
                None
            }
        }
    };

    if let Some(rate) = rate {
        matrix.insert(base, commodity.ticker(), rate);
    }
}

fn apply_crypto(matrix: &mut RateMatrix, base: &str, prices: &HashMap<String, Decimal>) {
    for (key, price) in prices {
        if price.is_zero() {
            warn!("Skipping {key} for {base}: zero price");
            continue;
        }
        if let Some(rate) = Decimal::ONE.checked_div(*price) {
            matrix.insert(base, key, rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commodity::WeightUnit;
    use crate::core::crypto::CryptoPriceMap;
    use anyhow::anyhow;
    use serde_json::json;
    use std::str::FromStr;

    fn supported() -> Vec<String> {
        vec!["EUR".to_string(), "USD".to_string()]
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ok_result(kind: TaskKind, output: TaskOutput) -> TaskResult {
        TaskResult {
            id: 1,
            kind,
            outcome: Ok(output),
        }
    }

    fn usd_spot(price: &str) -> CommodityPrice {
        CommodityPrice {
            price: dec(price),
            currency: "USD".to_string(),
            unit: WeightUnit::TroyOunce,
        }
    }

    #[test]
    fn test_base_merge_drops_non_numeric_entries() {
        let mut merger = RateMerger::new(&supported());
        let mut row = HashMap::new();
        row.insert("USD".to_string(), json!("1.08"));
        row.insert("GBP".to_string(), json!("not-a-number"));
        row.insert("JPY".to_string(), json!(163.2));
        let mut raw = RawRateMatrix::new();
        raw.insert("EUR".to_string(), row);

        merger.consume(ok_result(TaskKind::Base, TaskOutput::Base(raw)));

        let mut matrix = RateMatrix::new();
        assert!(merger.apply(&mut matrix));

        assert_eq!(matrix.get("EUR", "USD"), Some(dec("1.08")));
        assert_eq!(matrix.get("EUR", "GBP"), None);
        assert!(matrix.get("EUR", "JPY").is_some());
    }

    #[test]
    fn test_commodity_inversion_law() {
        let mut matrix = RateMatrix::new();
        matrix.insert("EUR", "USD", dec("1.08"));

        let mut merger = RateMerger::new(&supported());
        merger.consume(ok_result(
            TaskKind::Commodity {
                commodity: CommodityType::Gold,
            },
            TaskOutput::Commodity(usd_spot("2000")),
        ));
        assert!(!merger.apply(&mut matrix));

        // EUR leg goes through the fiat matrix, USD is a direct inversion
        assert_eq!(matrix.get("EUR", "XAU"), Some(dec("0.00054")));
        assert_eq!(matrix.get("USD", "XAU"), Some(dec("0.0005")));
    }

    #[test]
    fn test_commodity_skipped_when_fiat_leg_missing() {
        let mut matrix = RateMatrix::new();
        matrix.insert("USD", "EUR", dec("0.9259"));

        let mut merger = RateMerger::new(&supported());
        merger.consume(ok_result(
            TaskKind::Commodity {
                commodity: CommodityType::Silver,
            },
            TaskOutput::Commodity(usd_spot("25")),
        ));
        merger.apply(&mut matrix);

        // No EUR->USD leg known, so only the USD entry lands this cycle
        assert_eq!(matrix.get("EUR", "XAG"), None);
        assert_eq!(matrix.get("USD", "XAG"), Some(dec("0.04")));
    }

    #[test]
    fn test_zero_spot_price_never_produces_infinity() {
        let mut matrix = RateMatrix::new();
        matrix.insert("USD", "XAU", dec("0.0005"));

        let mut merger = RateMerger::new(&supported());
        merger.consume(ok_result(
            TaskKind::Commodity {
                commodity: CommodityType::Gold,
            },
            TaskOutput::Commodity(usd_spot("0")),
        ));
        merger.apply(&mut matrix);

        // Previous value stays, no division by zero happened
        assert_eq!(matrix.get("USD", "XAU"), Some(dec("0.0005")));
    }

    #[test]
    fn test_failed_task_retains_previous_value() {
        let mut matrix = RateMatrix::new();
        matrix.insert("EUR", "XAU", dec("0.00054"));

        let mut merger = RateMerger::new(&supported());
        merger.consume(TaskResult {
            id: 1,
            kind: TaskKind::Commodity {
                commodity: CommodityType::Gold,
            },
            outcome: Err(anyhow!("503 from upstream")),
        });
        merger.apply(&mut matrix);

        assert_eq!(matrix.get("EUR", "XAU"), Some(dec("0.00054")));
    }

    #[test]
    fn test_single_crypto_inversion() {
        let mut matrix = RateMatrix::new();

        let mut merger = RateMerger::new(&supported());
        merger.consume(ok_result(
            TaskKind::Crypto {
                symbol: "btc".to_string(),
                base_currency: "USD".to_string(),
            },
            TaskOutput::Crypto(dec("50000")),
        ));
        merger.apply(&mut matrix);

        assert_eq!(matrix.get("USD", "BTC"), Some(dec("0.00002")));
    }

    #[test]
    fn test_crypto_batch_symbol_and_address_keys() {
        let mut matrix = RateMatrix::new();

        let mut batch = CryptoPriceMap::default();
        batch
            .by_symbol
            .entry("BTC".to_string())
            .or_default()
            .insert("USD".to_string(), dec("50000"));
        batch
            .by_address
            .entry("0xAbCd".to_string())
            .or_default()
            .insert("EUR".to_string(), dec("4"));

        let mut merger = RateMerger::new(&supported());
        merger.consume(ok_result(
            TaskKind::CryptoBatch { asset_count: 2 },
            TaskOutput::CryptoBatch(batch),
        ));
        assert!(merger.got_crypto_batch());
        merger.apply(&mut matrix);

        assert_eq!(matrix.get("USD", "BTC"), Some(dec("0.00002")));
        assert_eq!(matrix.get("EUR", "addr:0xabcd"), Some(dec("0.25")));
    }

    #[test]
    fn test_unsupported_quote_fiat_is_ignored() {
        let mut matrix = RateMatrix::new();

        let mut batch = CryptoPriceMap::default();
        batch
            .by_symbol
            .entry("BTC".to_string())
            .or_default()
            .insert("GBP".to_string(), dec("40000"));

        let mut merger = RateMerger::new(&supported());
        merger.consume(ok_result(
            TaskKind::CryptoBatch { asset_count: 1 },
            TaskOutput::CryptoBatch(batch),
        ));
        merger.apply(&mut matrix);

        assert_eq!(matrix.get("GBP", "BTC"), None);
        assert!(matrix.is_empty());
    }
}
