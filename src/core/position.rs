//! Portfolio position abstraction

use crate::core::crypto::CryptoAssetKey;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PositionReader: Send + Sync {
    /// Crypto assets currently held, used to widen price coverage beyond the
    /// baseline symbol set.
    async fn held_crypto_assets(&self) -> Result<Vec<CryptoAssetKey>>;
}
