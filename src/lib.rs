pub mod cli;
pub mod core;
pub mod engine;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::storage::RateStorage;
use crate::engine::{EngineTuning, RateEngine};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Rates,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    match command {
        AppCommand::Rates => run_rates(config_path).await,
    }
}

async fn run_rates(config_path: Option<&str>) -> Result<()> {
    info!("Exchange rate tracker starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let engine = build_engine(&config)?;

    let spinner = cli::ui::new_spinner("Refreshing exchange rates...");
    let matrix = engine.get_rates(true).await?;
    spinner.finish_and_clear();

    cli::rates::display_matrix(&matrix, &config.currencies);
    Ok(())
}

/// Wires the provider adapters, storage and position reader from config
/// into a ready-to-use engine.
pub fn build_engine(config: &AppConfig) -> Result<RateEngine> {
    let currency_api_url = config.providers.currency_api.as_ref().map_or(
        "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1",
        |p| &p.base_url,
    );
    let base_provider = Arc::new(providers::currency_api::CurrencyApiProvider::new(
        currency_api_url,
        &config.currencies,
    )?);

    let gold_api_url = config
        .providers
        .gold_api
        .as_ref()
        .map_or("https://api.gold-api.com", |p| &p.base_url);
    let commodity_provider = Arc::new(providers::gold_api::GoldApiProvider::new(gold_api_url)?);

    let cryptocompare_url = config
        .providers
        .cryptocompare
        .as_ref()
        .map_or("https://min-api.cryptocompare.com", |p| &p.base_url);
    let coingecko_url = config
        .providers
        .coingecko
        .as_ref()
        .map_or("https://api.coingecko.com", |p| &p.base_url);
    let platform = config
        .providers
        .coingecko
        .as_ref()
        .and_then(|p| p.platform.as_deref())
        .unwrap_or("ethereum");
    let crypto_provider = Arc::new(providers::crypto::CryptoMarketClient::new(
        providers::cryptocompare::CryptoCompareClient::new(cryptocompare_url)?,
        providers::coingecko::CoinGeckoClient::new(coingecko_url, platform)?,
    ));

    let cache_dir = config.default_data_path()?.join("cache");
    let storage: Arc<dyn RateStorage> = match store::rates::FjallRateStore::open(&cache_dir) {
        Ok(disk) => Arc::new(disk),
        Err(e) => {
            warn!("Falling back to in-memory rate storage: {e:#}");
            Arc::new(store::memory::MemoryRateStore::new())
        }
    };

    let positions = Arc::new(store::positions::ConfigPositionReader::new(&config.holdings));

    Ok(RateEngine::new(
        base_provider,
        commodity_provider,
        crypto_provider,
        storage,
        positions,
        tuning_from(config),
    ))
}

fn tuning_from(config: &AppConfig) -> EngineTuning {
    let mut tuning = EngineTuning {
        supported_currencies: config.currencies.clone(),
        ..EngineTuning::default()
    };
    if let Some(secs) = config.engine.cache_ttl_secs {
        tuning.cache_ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = config.engine.storage_refresh_secs {
        tuning.storage_refresh_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = config.engine.default_timeout_secs {
        tuning.default_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = config.engine.initial_load_timeout_secs {
        tuning.initial_load_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = config.engine.followup_timeout_secs {
        tuning.followup_timeout = Duration::from_secs(secs);
    }
    tuning
}
