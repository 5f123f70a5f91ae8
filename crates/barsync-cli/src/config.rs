//! TOML configuration for the `barsync` binary.
//!
//! ```toml
//! [cryptocompare]
//! api_key = "..."          # or BARSYNC_CRYPTOCOMPARE_API_KEY
//!
//! [warehouse]
//! home = "/var/lib/barsync" # or BARSYNC_HOME, default ~/.barsync
//!
//! [fetch]
//! trading_symbols = ["BTC", "ETH"]
//! vs_currency = "USD"
//! limit_hourly = 48
//! limit_daily = 30
//! limit_minute = 120
//!
//! [pipeline]
//! queue_capacity = 10
//! polite_delay_ms = 10000
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use barsync_core::backfill::BackfillConfig;
use barsync_core::{FetchScope, PipelineConfig, Symbol, Timeframe, ValidationError, MAX_PAGE_SIZE};
use barsync_warehouse::WarehouseConfig;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "barsync.toml";
pub const API_KEY_ENV: &str = "BARSYNC_CRYPTOCOMPARE_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid config value: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub cryptocompare: CryptoCompareSection,
    pub warehouse: WarehouseSection,
    pub fetch: FetchSection,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoCompareSection {
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for CryptoCompareSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            timeout_ms: barsync_core::http_client::DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseSection {
    pub home: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub max_pool_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSection {
    pub trading_symbols: Vec<String>,
    pub vs_currency: String,
    pub limit_hourly: i64,
    pub limit_daily: i64,
    pub limit_minute: i64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            trading_symbols: Vec::new(),
            vs_currency: String::from("USD"),
            limit_hourly: 48,
            limit_daily: 30,
            limit_minute: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub queue_capacity: usize,
    pub page_size: usize,
    pub polite_delay_ms: u64,
    pub clock_skew_ms: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let backfill = BackfillConfig::default();
        Self {
            queue_capacity: barsync_core::pipeline::DEFAULT_QUEUE_CAPACITY,
            page_size: backfill.page_size,
            polite_delay_ms: millis(backfill.polite_delay),
            clock_skew_ms: millis(backfill.clock_skew),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl AppConfig {
    /// Load configuration and apply environment overrides.
    ///
    /// An explicit path must exist. Without one, `./barsync.toml` is read when
    /// present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    tracing::debug!("no config file found, using defaults");
                    Self::default()
                }
            }
        };

        if let Ok(api_key) = env::var(API_KEY_ENV) {
            if !api_key.trim().is_empty() {
                config.cryptocompare.api_key = api_key;
            }
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn quote_currency(&self) -> Result<Symbol, ConfigError> {
        Ok(Symbol::parse(&self.fetch.vs_currency)?)
    }

    pub fn trading_symbols(&self) -> Result<Vec<Symbol>, ConfigError> {
        if self.fetch.trading_symbols.is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "fetch.trading_symbols must list at least one symbol",
            )));
        }

        self.fetch
            .trading_symbols
            .iter()
            .map(|symbol| Symbol::parse(symbol).map_err(ConfigError::from))
            .collect()
    }

    /// Scope of the incremental refresh for one timeframe.
    pub fn recent_scope(&self, timeframe: Timeframe) -> FetchScope {
        let limit = match timeframe {
            Timeframe::Hourly => self.fetch.limit_hourly,
            Timeframe::Daily => self.fetch.limit_daily,
            Timeframe::Minute => self.fetch.limit_minute,
        };
        FetchScope::from_limit(limit)
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        let mut config = match &self.warehouse.home {
            Some(home) => WarehouseConfig::in_home(home),
            None => WarehouseConfig::default(),
        };
        if let Some(db_path) = &self.warehouse.db_path {
            config.db_path = db_path.clone();
        }
        if let Some(max_pool_size) = self.warehouse.max_pool_size {
            config.max_pool_size = max_pool_size;
        }
        config
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let section = &self.pipeline;
        if section.queue_capacity == 0 {
            return Err(ConfigError::Invalid(String::from(
                "pipeline.queue_capacity must be greater than zero",
            )));
        }
        if section.page_size == 0 || section.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "pipeline.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(PipelineConfig {
            queue_capacity: section.queue_capacity,
            backfill: BackfillConfig {
                page_size: section.page_size,
                polite_delay: Duration::from_millis(section.polite_delay_ms),
                clock_skew: Duration::from_millis(section.clock_skew_ms),
            },
        })
    }
}
