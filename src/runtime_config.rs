// =============================================================================
// Runtime Configuration — Scanner settings with atomic save
// =============================================================================
//
// Every tunable parameter of the screener lives here. All fields carry a
// serde default so that adding new fields never breaks loading an older
// config file. Persistence uses an atomic tmp + rename pattern.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exchange::client::DEFAULT_BASE_URL;
use crate::exchange::markets::{SWAP_MARKET_TYPE, USDT_SETTLEMENT_MARKER};
use crate::market_data::Timeframe;
use crate::types::DetectionMode;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "cradle_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_timeframes() -> Vec<Timeframe> {
    vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]
}

fn default_settlement_marker() -> String {
    USDT_SETTLEMENT_MARKER.to_string()
}

fn default_market_type() -> String {
    SWAP_MARKET_TYPE.to_string()
}

fn default_candle_limit() -> u32 {
    100
}

fn default_min_candles() -> usize {
    5
}

fn default_request_interval_ms() -> u64 {
    300
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_auto_refresh_settle_secs() -> u64 {
    5
}

fn default_exchange_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the screener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Scan universe ------------------------------------------------------

    /// Timeframes scanned when a request does not name any.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,

    /// Explicit symbol list. Empty means "resolve from the market listing".
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Substring a listed symbol must contain to be scanned.
    #[serde(default = "default_settlement_marker")]
    pub settlement_marker: String,

    /// Market type a listed symbol must have to be scanned.
    #[serde(default = "default_market_type")]
    pub market_type: String,

    // --- Detection ----------------------------------------------------------

    /// Candles requested per (symbol, timeframe).
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    /// Series shorter than this are skipped as insufficient history.
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,

    /// Which candle pairs are evaluated.
    #[serde(default)]
    pub detection_mode: DetectionMode,

    // --- Exchange pacing ----------------------------------------------------

    /// Minimum spacing between two exchange requests (milliseconds).
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Upper bound on in-flight candle requests.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Extra attempts for retryable provider failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Back-off before the first retry; doubles on each further attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    // --- Auto-refresh -------------------------------------------------------

    /// Re-run the scan at every close of the shortest configured timeframe.
    #[serde(default)]
    pub auto_refresh: bool,

    /// Delay after the candle close before the auto scan starts.
    #[serde(default = "default_auto_refresh_settle_secs")]
    pub auto_refresh_settle_secs: u64,

    // --- Exchange -----------------------------------------------------------

    #[serde(default = "default_exchange_base_url")]
    pub exchange_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeframes: default_timeframes(),
            symbols: Vec::new(),
            settlement_marker: default_settlement_marker(),
            market_type: default_market_type(),
            candle_limit: default_candle_limit(),
            min_candles: default_min_candles(),
            detection_mode: DetectionMode::default(),
            request_interval_ms: default_request_interval_ms(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            auto_refresh: false,
            auto_refresh_settle_secs: default_auto_refresh_settle_secs(),
            exchange_base_url: default_exchange_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        config.validate()?;

        info!(
            path = %path.display(),
            timeframes = ?config.timeframes,
            symbols = config.symbols.len(),
            "config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    /// Reject settings the scanner cannot work with.
    pub fn validate(&self) -> Result<()> {
        // The detector needs two candles of history behind the judged pair.
        if self.min_candles < 3 {
            bail!("min_candles must be at least 3 (got {})", self.min_candles);
        }
        if (self.candle_limit as usize) < self.min_candles {
            bail!(
                "candle_limit ({}) must not be below min_candles ({})",
                self.candle_limit,
                self.min_candles
            );
        }
        if self.max_concurrent_fetches == 0 {
            bail!("max_concurrent_fetches must be at least 1");
        }
        // Auto-refresh must fire before the shortest candle closes again.
        if let Some(period) = self.timeframes.iter().map(|tf| tf.seconds() as u64).min() {
            if self.auto_refresh_settle_secs > period {
                bail!(
                    "auto_refresh_settle_secs ({}) must not exceed the shortest timeframe period ({}s)",
                    self.auto_refresh_settle_secs,
                    period
                );
            }
        }
        Ok(())
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
