use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle. `open_time` is the bucket start in UTC milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close strictly below open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Close strictly above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

// ---------------------------------------------------------------------------
// CandleSeries -- time-ordered candles for one (symbol, timeframe) pair
// ---------------------------------------------------------------------------

/// Time-ascending candles for one (symbol, timeframe) pair. Index 0 is the
/// oldest candle; the last one is the most recent and may still be open.
///
/// Timestamps are strictly increasing; `from_unordered` enforces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Normalise candles as returned by an exchange: sort by open time and keep
    /// the last occurrence of any duplicated timestamp (the freshest update of
    /// the in-progress candle).
    pub fn from_unordered(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);

        let mut normalized: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match normalized.last_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => normalized.push(candle),
            }
        }

        Self { candles: normalized }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open_time: i64, close: f64) -> Candle {
        Candle::new(open_time, close, close + 1.0, close - 1.0, close, 10.0)
    }

    #[test]
    fn from_unordered_sorts_and_keeps_latest_duplicate() {
        let series = CandleSeries::from_unordered(vec![
            candle(120_000, 3.0),
            candle(0, 1.0),
            candle(60_000, 2.0),
            candle(120_000, 3.5),
        ]);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.5]);
        assert_eq!(series.len(), 3);
        assert!(series
            .candles()
            .windows(2)
            .all(|w| w[0].open_time < w[1].open_time));
    }

    #[test]
    fn direction_helpers() {
        let up = Candle::new(0, 1.0, 2.0, 0.5, 1.5, 1.0);
        let down = Candle::new(0, 1.5, 2.0, 0.5, 1.0, 1.0);
        let doji = Candle::new(0, 1.0, 2.0, 0.5, 1.0, 1.0);
        assert!(up.is_bullish() && !up.is_bearish());
        assert!(down.is_bearish() && !down.is_bullish());
        assert!(!doji.is_bullish() && !doji.is_bearish());
    }

    #[test]
    fn from_unordered_accepts_empty() {
        let series = CandleSeries::from_unordered(Vec::new());
        assert_eq!(series.len(), 0);
        assert!(series.get(0).is_none());
    }
}
