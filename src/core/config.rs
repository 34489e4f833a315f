use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryptoHolding {
    pub symbol: String,
    pub contract_address: Option<String>,
    pub units: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencyApiConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoldApiConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryptoCompareConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub currency_api: Option<CurrencyApiConfig>,
    pub gold_api: Option<GoldApiConfig>,
    pub cryptocompare: Option<CryptoCompareConfig>,
    pub coingecko: Option<CoinGeckoConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            currency_api: Some(CurrencyApiConfig {
                base_url: "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1"
                    .to_string(),
            }),
            gold_api: Some(GoldApiConfig {
                base_url: "https://api.gold-api.com".to_string(),
            }),
            cryptocompare: Some(CryptoCompareConfig {
                base_url: "https://min-api.cryptocompare.com".to_string(),
            }),
            coingecko: Some(CoinGeckoConfig {
                base_url: "https://api.coingecko.com".to_string(),
                platform: None,
            }),
        }
    }
}

/// Refresh engine tuning overrides; anything unset falls back to the
/// engine defaults.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EngineConfig {
    pub cache_ttl_secs: Option<u64>,
    pub storage_refresh_secs: Option<u64>,
    pub default_timeout_secs: Option<u64>,
    pub initial_load_timeout_secs: Option<u64>,
    pub followup_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
    #[serde(default)]
    pub holdings: Vec<CryptoHolding>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub data_path: Option<String>,
}

fn default_currencies() -> Vec<String> {
    vec!["EUR".to_string(), "USD".to_string()]
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxm", "fxm")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "fxm", "fxm")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
