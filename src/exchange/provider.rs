// =============================================================================
// Exchange seams — market listing and candle retrieval
// =============================================================================
//
// The scanner only ever talks to these traits, so tests swap in in-memory
// providers and a different exchange only needs a new adapter.
// =============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::exchange::markets::Market;
use crate::market_data::{CandleSeries, Timeframe};

/// Failure of a single exchange call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("exchange returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("exchange rejected request (code {code}): {message}")]
    Api { code: String, message: String },

    #[error("rate limited by exchange")]
    RateLimited,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timeframe {0} is not offered by this exchange")]
    UnsupportedTimeframe(Timeframe),
}

impl ProviderError {
    /// Whether repeating the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Api { .. } | Self::Malformed(_) | Self::UnsupportedTimeframe(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Source of OHLCV candles for one (symbol, timeframe) pair.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// Fetch at most `limit` of the most recent candles, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries, ProviderError>;
}

/// Source of the tradable instrument listing.
#[async_trait]
pub trait MarketLister: Send + Sync {
    async fn load_markets(&self) -> Result<Vec<Market>, ProviderError>;
}
