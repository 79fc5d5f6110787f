use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::exchange::ProviderError;
use crate::market_data::Timeframe;

/// Reasons a scan cannot start. None of these are raised once scanning is
/// under way; per-pair problems are absorbed by the scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no timeframe selected")]
    NoTimeframes,

    #[error("no symbols resolved for scanning")]
    NoSymbols,

    #[error("scan {0} is already running")]
    AlreadyRunning(String),

    #[error("failed to load market listing: {0}")]
    MarketListing(#[from] ProviderError),
}

/// The immutable input of one scan: which symbols on which timeframes.
///
/// Both lists keep the caller's order with duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    symbols: Vec<String>,
    timeframes: Vec<Timeframe>,
}

impl ScanRequest {
    /// Build a request. Fails with [`ScanError::NoTimeframes`] when no
    /// timeframe is given; an empty symbol list is allowed and produces an
    /// empty scan.
    pub fn new<S, T>(symbols: S, timeframes: T) -> Result<Self, ScanError>
    where
        S: IntoIterator,
        S::Item: Into<String>,
        T: IntoIterator<Item = Timeframe>,
    {
        let mut seen_tf = HashSet::new();
        let timeframes: Vec<Timeframe> = timeframes
            .into_iter()
            .filter(|tf| seen_tf.insert(*tf))
            .collect();

        if timeframes.is_empty() {
            return Err(ScanError::NoTimeframes);
        }

        let mut seen_sym = HashSet::new();
        let symbols: Vec<String> = symbols
            .into_iter()
            .map(Into::into)
            .map(|s: String| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen_sym.insert(s.clone()))
            .collect();

        Ok(Self {
            symbols,
            timeframes,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Number of (symbol, timeframe) pairs the scan will visit.
    pub fn pair_count(&self) -> usize {
        self.symbols.len() * self.timeframes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_timeframes() {
        let err = ScanRequest::new(["BTC/USDT:USDT"], Vec::new()).unwrap_err();
        assert!(matches!(err, ScanError::NoTimeframes));
    }

    #[test]
    fn allows_empty_symbols() {
        let req = ScanRequest::new(Vec::<String>::new(), [Timeframe::H1]).unwrap();
        assert!(req.symbols().is_empty());
        assert_eq!(req.pair_count(), 0);
    }

    #[test]
    fn keeps_order_and_drops_duplicates() {
        let req = ScanRequest::new(
            ["ETH/USDT:USDT", " BTC/USDT:USDT ", "ETH/USDT:USDT", ""],
            [Timeframe::D1, Timeframe::H1, Timeframe::D1],
        )
        .unwrap();
        assert_eq!(req.symbols(), ["ETH/USDT:USDT", "BTC/USDT:USDT"]);
        assert_eq!(req.timeframes(), [Timeframe::D1, Timeframe::H1]);
        assert_eq!(req.pair_count(), 4);
    }
}
