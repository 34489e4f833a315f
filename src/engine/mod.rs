//! Market-rate aggregation engine.
//!
//! Fans out provider fetches under a global deadline, merges whatever lands
//! in time into a long-lived matrix, and caches the result with two
//! independent staleness policies (in-memory TTL, persisted refresh
//! interval). Only one refresh cycle runs at a time per engine instance.

pub mod merger;
pub mod scheduler;

use crate::core::commodity::{CommodityPriceProvider, CommodityType};
use crate::core::crypto::{CryptoAssetKey, CryptoPriceMap, CryptoPriceProvider};
use crate::core::position::PositionReader;
use crate::core::rates::{BaseRateProvider, RateMatrix};
use crate::core::storage::RateStorage;
use anyhow::Result;
use chrono::{DateTime, Utc};
use merger::RateMerger;
use scheduler::{Task, TaskKind, TaskOutput};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Timing and coverage knobs for the refresh engine.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    pub supported_currencies: Vec<String>,
    /// Symbols fetched on every initial load, independent of holdings.
    pub base_crypto_symbols: Vec<String>,
    /// How long a base/commodity refresh stays fresh in memory.
    pub cache_ttl: Duration,
    /// How often the matrix is persisted when nothing forces a save.
    pub storage_refresh_interval: Duration,
    pub default_timeout: Duration,
    pub initial_load_timeout: Duration,
    /// The cold-start follow-up cycle resolves position-driven assets and
    /// gets extra headroom.
    pub followup_timeout: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            supported_currencies: vec!["EUR".to_string(), "USD".to_string()],
            base_crypto_symbols: ["BTC", "ETH", "LTC", "TRX", "BNB", "USDT", "USDC"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cache_ttl: Duration::from_secs(300),
            storage_refresh_interval: Duration::from_secs(6 * 60 * 60),
            default_timeout: Duration::from_secs(4),
            initial_load_timeout: Duration::from_secs(7),
            followup_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Default)]
struct EngineState {
    matrix: Option<RateMatrix>,
    last_base_refresh: Option<DateTime<Utc>>,
    cold_start_refresh_pending: bool,
    hydrated: bool,
}

/// The aggregation engine façade. Construct once, inject wherever rates are
/// needed; all state lives behind the cycle lock.
pub struct RateEngine {
    base_provider: Arc<dyn BaseRateProvider>,
    commodity_provider: Arc<dyn CommodityPriceProvider>,
    crypto_provider: Arc<dyn CryptoPriceProvider>,
    storage: Arc<dyn RateStorage>,
    positions: Arc<dyn PositionReader>,
    tuning: EngineTuning,
    state: Mutex<EngineState>,
}

impl RateEngine {
    pub fn new(
        base_provider: Arc<dyn BaseRateProvider>,
        commodity_provider: Arc<dyn CommodityPriceProvider>,
        crypto_provider: Arc<dyn CryptoPriceProvider>,
        storage: Arc<dyn RateStorage>,
        positions: Arc<dyn PositionReader>,
        tuning: EngineTuning,
    ) -> Self {
        Self {
            base_provider,
            commodity_provider,
            crypto_provider,
            storage,
            positions,
            tuning,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Returns the current rate matrix, refreshing it first when the cache
    /// policy calls for it. Concurrent callers queue on the cycle lock and
    /// each receives the result of whichever cycle completes next.
    ///
    /// `initial_load` must be true only for the very first fetch after
    /// application start; it widens crypto coverage to the baseline symbol
    /// set and arms the one-time follow-up refresh.
    ///
    /// Provider, storage and position failures never fail this call; they
    /// surface as staleness or missing keys in the returned matrix.
    pub async fn get_rates(&self, initial_load: bool) -> Result<RateMatrix> {
        let mut state = self.state.lock().await;
        self.hydrate_once(&mut state).await;
        self.refresh_cycle(&mut state, initial_load).await
    }

    /// Best-effort hydration from storage, awaited by the first caller only.
    async fn hydrate_once(&self, state: &mut EngineState) {
        if state.hydrated {
            return;
        }
        state.hydrated = true;

        match self.storage.get().await {
            Ok(Some(stored)) if !stored.is_empty() => {
                debug!("Hydrated {} rates from storage", stored.len());
                state.matrix = Some(stored);
                match self.storage.last_saved().await {
                    Ok(Some(ts)) => state.last_base_refresh = Some(ts),
                    Ok(None) => {}
                    Err(e) => warn!("Failed to read last-saved timestamp: {e:#}"),
                }
            }
            Ok(_) => debug!("No persisted rates to hydrate"),
            Err(e) => warn!("Failed to hydrate rates from storage: {e:#}"),
        }
    }

    async fn refresh_cycle(
        &self,
        state: &mut EngineState,
        initial_load: bool,
    ) -> Result<RateMatrix> {
        let followup = state.cold_start_refresh_pending;
        let ttl_elapsed = match state.last_base_refresh {
            None => true,
            Some(ts) => (Utc::now() - ts)
                .to_std()
                .is_ok_and(|age| age >= self.tuning.cache_ttl),
        };
        // The pending follow-up forces one full cycle even inside the TTL
        let refresh_base = state.matrix.is_none() || ttl_elapsed || followup;

        if !refresh_base && !initial_load {
            if let Some(matrix) = &state.matrix {
                info!("Using cached exchange rates");
                return Ok(matrix.clone());
            }
        }

        let timeout = if initial_load {
            self.tuning.initial_load_timeout
        } else if followup {
            self.tuning.followup_timeout
        } else {
            self.tuning.default_timeout
        };
        info!(initial_load, refresh_base, ?timeout, "Refreshing exchange rates");

        let mut matrix = state
            .matrix
            .take()
            .unwrap_or_else(|| RateMatrix::with_bases(&self.tuning.supported_currencies));

        let tasks = self.schedule_tasks(refresh_base, initial_load, timeout).await;
        let mut merger = RateMerger::new(&self.tuning.supported_currencies);
        scheduler::run_until_deadline(tasks, timeout, |result| merger.consume(result)).await;

        let got_crypto_batch = merger.got_crypto_batch();
        if merger.apply(&mut matrix) {
            state.last_base_refresh = Some(Utc::now());
        }

        // A completed follow-up cycle (or freshly landed position-driven
        // rates) forces a save so address-keyed entries survive a restart.
        self.save_to_storage(&matrix, followup || got_crypto_batch)
            .await;

        if state.cold_start_refresh_pending {
            state.cold_start_refresh_pending = false;
        } else if initial_load {
            state.cold_start_refresh_pending = true;
        }

        let snapshot = matrix.clone();
        state.matrix = Some(matrix);
        Ok(snapshot)
    }

    async fn schedule_tasks(
        &self,
        refresh_base: bool,
        initial_load: bool,
        timeout: Duration,
    ) -> Vec<Task> {
        let mut tasks = Vec::new();
        let mut next_id = 0u64;
        let mut id = move || {
            next_id += 1;
            next_id
        };

        if refresh_base {
            let provider = Arc::clone(&self.base_provider);
            tasks.push(Task::new(id(), TaskKind::Base, async move {
                provider.get_matrix(timeout).await.map(TaskOutput::Base)
            }));

            for commodity in CommodityType::ALL {
                let provider = Arc::clone(&self.commodity_provider);
                tasks.push(Task::new(
                    id(),
                    TaskKind::Commodity { commodity },
                    async move {
                        provider
                            .get_price(commodity, timeout)
                            .await
                            .map(TaskOutput::Commodity)
                    },
                ));
            }
        }

        if initial_load {
            for base_currency in &self.tuning.supported_currencies {
                for symbol in &self.tuning.base_crypto_symbols {
                    let provider = Arc::clone(&self.crypto_provider);
                    let symbol = symbol.clone();
                    let base_currency = base_currency.clone();
                    tasks.push(Task::new(
                        id(),
                        TaskKind::Crypto {
                            symbol: symbol.clone(),
                            base_currency: base_currency.clone(),
                        },
                        async move {
                            provider
                                .get_price(&symbol, &base_currency, timeout)
                                .await
                                .map(TaskOutput::Crypto)
                        },
                    ));
                }
            }
        }

        // Position-driven coverage rides along with every executed cycle; a
        // missing or empty portfolio must not block the fiat refresh.
        let assets = match self.positions.held_crypto_assets().await {
            Ok(assets) => assets,
            Err(e) => {
                debug!("Position lookup failed; skipping portfolio crypto prices: {e:#}");
                Vec::new()
            }
        };
        if !assets.is_empty() {
            let provider = Arc::clone(&self.crypto_provider);
            let fiats = self.tuning.supported_currencies.clone();
            let asset_count = assets.len();
            tasks.push(Task::new(
                id(),
                TaskKind::CryptoBatch { asset_count },
                async move {
                    fetch_crypto_price_map(provider, assets, fiats, timeout)
                        .await
                        .map(TaskOutput::CryptoBatch)
                },
            ));
        }

        tasks
    }

    async fn save_to_storage(&self, matrix: &RateMatrix, force: bool) {
        if matrix.is_empty() {
            debug!("Nothing to persist yet");
            return;
        }

        let due = match self.storage.last_saved().await {
            Ok(Some(ts)) => (Utc::now() - ts)
                .to_std()
                .is_ok_and(|age| age >= self.tuning.storage_refresh_interval),
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to read last-saved timestamp: {e:#}");
                true
            }
        };

        if !(force || due) {
            return;
        }

        debug!("Saving exchange rates to storage");
        if let Err(e) = self.storage.save(matrix).await {
            error!("Failed to persist refreshed exchange rates: {e:#}");
        }
    }
}

/// Splits held assets into address-keyed and symbol-keyed lookups and
/// batches both. Addresses are preferred over symbols for tokens that carry
/// one, to avoid cross-chain symbol collisions.
async fn fetch_crypto_price_map(
    provider: Arc<dyn CryptoPriceProvider>,
    assets: Vec<CryptoAssetKey>,
    fiats: Vec<String>,
    timeout: Duration,
) -> Result<CryptoPriceMap> {
    let mut symbols = BTreeSet::new();
    let mut addresses = BTreeSet::new();
    for asset in assets {
        match asset.contract_address {
            Some(address) if !address.trim().is_empty() => {
                addresses.insert(address.trim().to_lowercase());
            }
            _ => {
                let symbol = asset.symbol.trim().to_uppercase();
                if !symbol.is_empty() {
                    symbols.insert(symbol);
                }
            }
        }
    }

    let mut map = CryptoPriceMap::default();

    if !symbols.is_empty() {
        let symbols: Vec<String> = symbols.into_iter().collect();
        let by_symbol = provider
            .get_prices_by_symbols(&symbols, &fiats, timeout)
            .await?;
        for (symbol, prices) in by_symbol {
            map.by_symbol.insert(symbol.to_uppercase(), prices);
        }
    }

    if !addresses.is_empty() {
        let addresses: Vec<String> = addresses.into_iter().collect();
        let by_address = provider
            .get_prices_by_addresses(&addresses, &fiats, timeout)
            .await?;
        for (address, prices) in by_address {
            map.by_address.insert(address.to_lowercase(), prices);
        }
    }

    Ok(map)
}
