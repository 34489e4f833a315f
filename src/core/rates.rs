//! Exchange rate matrix and the base fiat rate port.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Unvalidated provider payload: base currency -> quote symbol -> raw value.
pub type RawRateMatrix = HashMap<String, HashMap<String, serde_json::Value>>;

/// base currency -> quote symbol -> rate.
///
/// `matrix[base][quote]` is the quantity of `quote` obtainable for exactly
/// 1 unit of `base`. Quote symbols are fiat ISO codes, commodity tickers
/// ("XAU"), uppercase crypto tickers ("BTC") or address keys
/// ("addr:<lowercase contract address>").
///
/// The matrix is merged key-by-key across refresh cycles, never replaced
/// wholesale: a provider outage degrades freshness, not completeness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateMatrix(HashMap<String, HashMap<String, Decimal>>);

impl RateMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds one empty row per base currency.
    pub fn with_bases<S: AsRef<str>>(bases: &[S]) -> Self {
        let mut rows = HashMap::new();
        for base in bases {
            rows.insert(base.as_ref().to_string(), HashMap::new());
        }
        Self(rows)
    }

    pub fn get(&self, base: &str, quote: &str) -> Option<Decimal> {
        self.0.get(base).and_then(|quotes| quotes.get(quote)).copied()
    }

    pub fn insert(&mut self, base: &str, quote: &str, rate: Decimal) {
        self.0
            .entry(base.to_string())
            .or_default()
            .insert(quote.to_string(), rate);
    }

    pub fn quotes(&self, base: &str) -> Option<&HashMap<String, Decimal>> {
        self.0.get(base)
    }

    pub fn bases(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// True when no rate has ever been recorded; seeded-but-empty rows count
    /// as empty.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|quotes| quotes.is_empty())
    }

    /// Total number of rate entries across all bases.
    pub fn len(&self) -> usize {
        self.0.values().map(|quotes| quotes.len()).sum()
    }
}

#[async_trait]
pub trait BaseRateProvider: Send + Sync {
    /// Full fiat matrix, raw and unvalidated.
    async fn get_matrix(&self, timeout: Duration) -> Result<RawRateMatrix>;
}
