use crate::core::rates::RateMatrix;
use crate::core::storage::RateStorage;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// In-memory stand-in for the persisted rate store. Used by tests and as a
/// fallback when the on-disk keyspace cannot be opened.
#[derive(Default)]
pub struct MemoryRateStore {
    inner: Mutex<Option<(DateTime<Utc>, RateMatrix)>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStorage for MemoryRateStore {
    async fn get(&self) -> Result<Option<RateMatrix>> {
        Ok(self
            .inner
            .lock()
            .await
            .as_ref()
            .map(|(_, rates)| rates.clone()))
    }

    async fn last_saved(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().await.as_ref().map(|(ts, _)| *ts))
    }

    async fn save(&self, rates: &RateMatrix) -> Result<()> {
        *self.inner.lock().await = Some((Utc::now(), rates.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_save_then_get() {
        let store = MemoryRateStore::new();
        assert!(store.get().await.unwrap().is_none());
        assert!(store.last_saved().await.unwrap().is_none());

        let mut matrix = RateMatrix::new();
        matrix.insert("USD", "BTC", Decimal::new(2, 5));
        store.save(&matrix).await.unwrap();

        assert_eq!(store.get().await.unwrap(), Some(matrix));
        assert!(store.last_saved().await.unwrap().is_some());
    }
}
