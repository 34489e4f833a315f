//! Commodity pricing abstractions

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommodityType {
    Gold,
    Silver,
    Platinum,
    Palladium,
}

impl CommodityType {
    pub const ALL: [CommodityType; 4] = [
        CommodityType::Gold,
        CommodityType::Silver,
        CommodityType::Platinum,
        CommodityType::Palladium,
    ];

    /// Matrix quote symbol for this commodity.
    pub fn ticker(&self) -> &'static str {
        match self {
            CommodityType::Gold => "XAU",
            CommodityType::Silver => "XAG",
            CommodityType::Platinum => "XPT",
            CommodityType::Palladium => "XPD",
        }
    }
}

impl Display for CommodityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CommodityType::Gold => "gold",
                CommodityType::Silver => "silver",
                CommodityType::Platinum => "platinum",
                CommodityType::Palladium => "palladium",
            }
        )
    }
}

impl FromStr for CommodityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gold" | "xau" => Ok(CommodityType::Gold),
            "silver" | "xag" => Ok(CommodityType::Silver),
            "platinum" | "xpt" => Ok(CommodityType::Platinum),
            "palladium" | "xpd" => Ok(CommodityType::Palladium),
            _ => Err(anyhow::anyhow!("Invalid commodity: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightUnit {
    TroyOunce,
    Gram,
}

impl Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                WeightUnit::TroyOunce => "oz t",
                WeightUnit::Gram => "g",
            }
        )
    }
}

/// Spot price of one unit of a commodity, denominated in `currency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommodityPrice {
    pub price: Decimal,
    pub currency: String,
    pub unit: WeightUnit,
}

#[async_trait]
pub trait CommodityPriceProvider: Send + Sync {
    async fn get_price(
        &self,
        commodity: CommodityType,
        timeout: Duration,
    ) -> Result<CommodityPrice>;
}
