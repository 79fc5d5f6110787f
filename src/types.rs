// =============================================================================
// Shared types used across the Cradle screener
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Timeframe;

/// Direction of a detected cradle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Setup {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Setup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Which candle pair produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedOn {
    /// Pair ending on the most recent, possibly still open, candle.
    LatestCandle,
    /// Pair ending on the last fully closed candle.
    PreviousCandle,
}

impl std::fmt::Display for DetectedOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LatestCandle => write!(f, "Latest Candle"),
            Self::PreviousCandle => write!(f, "Previous Candle"),
        }
    }
}

/// Which candle pairs the scanner evaluates per series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Evaluate both the latest and the last closed pair.
    LatestAndPrevious,
    /// Evaluate only the last closed pair.
    ClosedOnly,
}

impl Default for DetectionMode {
    fn default() -> Self {
        Self::LatestAndPrevious
    }
}

impl DetectionMode {
    pub fn checks_latest(&self) -> bool {
        matches!(self, Self::LatestAndPrevious)
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LatestAndPrevious => write!(f, "latest_and_previous"),
            Self::ClosedOnly => write!(f, "closed_only"),
        }
    }
}

/// One cradle found during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupMatch {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub setup: Setup,
    pub detected_on: DetectedOn,
    /// Open time (UTC ms) of the confirming candle.
    pub candle_open_time: i64,
    /// Close of the confirming candle.
    pub close: f64,
}
