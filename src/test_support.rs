// =============================================================================
// In-memory exchange adapters and fixtures for tests
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app_state::AppState;
use crate::exchange::markets::native_id;
use crate::exchange::{CandleProvider, Market, MarketLister, ProviderError};
use crate::market_data::{Candle, CandleSeries, Timeframe};
use crate::runtime_config::RuntimeConfig;

const HOUR_MS: i64 = 3_600_000;

/// (open, close) rows whose last pair is a bullish cradle.
pub const BULLISH_LATEST: &[(f64, f64)] = &[
    (9.5, 10.0),
    (10.0, 12.0),
    (12.0, 14.0),
    (11.5, 10.8),
    (10.8, 11.6),
];

pub fn series_from(rows: &[(f64, f64)]) -> CandleSeries {
    let candles = rows
        .iter()
        .enumerate()
        .map(|(i, &(open, close))| {
            Candle::new(
                i as i64 * HOUR_MS,
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1_000.0,
            )
        })
        .collect();
    CandleSeries::from_unordered(candles)
}

/// Serves fixed rows per symbol for every timeframe; unknown symbols fail.
#[derive(Default)]
pub struct StaticCandles {
    rows: HashMap<String, &'static [(f64, f64)]>,
    delay: Duration,
}

impl StaticCandles {
    pub fn with(mut self, symbol: &str, rows: &'static [(f64, f64)]) -> Self {
        self.rows.insert(symbol.to_string(), rows);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl CandleProvider for StaticCandles {
    async fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        _limit: u32,
    ) -> Result<CandleSeries, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.rows.get(symbol) {
            Some(rows) => Ok(series_from(rows)),
            None => Err(ProviderError::Api {
                code: "40034".into(),
                message: format!("unknown symbol {symbol}"),
            }),
        }
    }
}

/// Fixed market listing, or a transport failure.
#[derive(Default)]
pub struct StaticMarkets {
    markets: Vec<Market>,
    fail: bool,
}

impl StaticMarkets {
    pub fn listing(entries: &[(&str, &str)]) -> Self {
        let markets = entries
            .iter()
            .map(|&(symbol, market_type)| Market {
                symbol: symbol.to_string(),
                id: native_id(symbol),
                base: String::new(),
                quote: String::new(),
                market_type: market_type.to_string(),
                active: true,
            })
            .collect();
        Self {
            markets,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            markets: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl MarketLister for StaticMarkets {
    async fn load_markets(&self) -> Result<Vec<Market>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        Ok(self.markets.clone())
    }
}

/// Default config with pacing and retry delays disabled.
pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        timeframes: vec![Timeframe::H1],
        request_interval_ms: 0,
        retry_backoff_ms: 0,
        ..RuntimeConfig::default()
    }
}

pub fn test_state(candles: StaticCandles, markets: StaticMarkets) -> Arc<AppState> {
    let path = std::env::temp_dir().join(format!("cradle-test-{}.json", uuid::Uuid::new_v4()));
    Arc::new(AppState::new(
        test_config(),
        path,
        Arc::new(candles),
        Arc::new(markets),
    ))
}

/// Poll until no scan holds the slot, or panic after two seconds.
pub async fn wait_for_idle(state: &AppState) {
    for _ in 0..200 {
        if state.running_scan_id().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan did not finish in time");
}
