use crate::core::rates::RateMatrix;
use crate::core::storage::RateStorage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const RATES_KEY: &str = "rates.v1";

#[derive(Serialize, Deserialize)]
struct StoredRates {
    last_saved: DateTime<Utc>,
    rates: RateMatrix,
}

/// Durable rate matrix storage on top of a fjall keyspace.
///
/// The whole matrix is written as one JSON document together with its save
/// timestamp; rates serialize as nested string-keyed maps of
/// decimal-as-string.
pub struct FjallRateStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallRateStore {
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open rate store at {}", path.display()))?;
        let partition = keyspace
            .open_partition("exchange_rates", PartitionCreateOptions::default())
            .context("Failed to open exchange_rates partition")?;
        Ok(Self { keyspace, partition })
    }

    fn read(&self) -> Result<Option<StoredRates>> {
        match self.partition.get(RATES_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RateStorage for FjallRateStore {
    async fn get(&self) -> Result<Option<RateMatrix>> {
        Ok(self.read()?.map(|stored| stored.rates))
    }

    async fn last_saved(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.map(|stored| stored.last_saved))
    }

    async fn save(&self, rates: &RateMatrix) -> Result<()> {
        let stored = StoredRates {
            last_saved: Utc::now(),
            rates: rates.clone(),
        };
        self.partition
            .insert(RATES_KEY, serde_json::to_vec(&stored)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Persisted {} rates", rates.len());
        Ok(())
    }
}
