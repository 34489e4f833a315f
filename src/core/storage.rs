//! Persisted rate matrix abstraction

use crate::core::rates::RateMatrix;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable, non-authoritative copy of the rate matrix. The in-memory matrix
/// wins on any disagreement; storage failures must never fail a refresh.
#[async_trait]
pub trait RateStorage: Send + Sync {
    async fn get(&self) -> Result<Option<RateMatrix>>;

    async fn last_saved(&self) -> Result<Option<DateTime<Utc>>>;

    async fn save(&self, rates: &RateMatrix) -> Result<()>;
}
