//! Core business logic abstractions

pub mod commodity;
pub mod config;
pub mod crypto;
pub mod decimal;
pub mod log;
pub mod position;
pub mod rates;
pub mod storage;

// Re-export main types for cleaner imports
pub use commodity::{CommodityPrice, CommodityPriceProvider, CommodityType, WeightUnit};
pub use crypto::{CryptoAssetKey, CryptoPriceMap, CryptoPriceProvider, FiatPriceMap};
pub use position::PositionReader;
pub use rates::{BaseRateProvider, RateMatrix, RawRateMatrix};
pub use storage::RateStorage;
