// =============================================================================
// Cradle Setup Detector
// =============================================================================
//
// A cradle is a two-candle reversal that pivots inside the EMA10/EMA20 zone.
// For the pair (prev = index-1, curr = index) the zone is evaluated at prev:
//
//   zone_low  = min(ema10[prev], ema20[prev])
//   zone_high = max(ema10[prev], ema20[prev])
//
// Decision rule (first match wins):
//   Bullish = prev closes down inside the zone AND curr closes up
//   Bearish = prev closes up   inside the zone AND curr closes down
//
// The two rules require opposite prev directions, so they can never both hold.
// =============================================================================

use crate::indicators::EmaPair;
use crate::market_data::{Candle, CandleSeries};
use crate::types::Setup;

/// Smallest index that has enough history behind it to be judged.
pub const MIN_INDEX: usize = 2;

/// Classify the candle pair ending at `index`.
///
/// Returns `None` when `index < 2`, when `index` is past the end of `candles`,
/// when either EMA slice does not reach `index - 1`, or when the pair is not a
/// cradle.
pub fn detect_cradle(
    candles: &[Candle],
    ema10: &[f64],
    ema20: &[f64],
    index: usize,
) -> Option<Setup> {
    if index < MIN_INDEX || index >= candles.len() {
        return None;
    }

    let prev = &candles[index - 1];
    let curr = &candles[index];

    let fast = *ema10.get(index - 1)?;
    let slow = *ema20.get(index - 1)?;
    let zone_low = fast.min(slow);
    let zone_high = fast.max(slow);

    let in_zone = zone_low <= prev.close && prev.close <= zone_high;
    if !in_zone {
        return None;
    }

    if prev.is_bearish() && curr.is_bullish() {
        Some(Setup::Bullish)
    } else if prev.is_bullish() && curr.is_bearish() {
        Some(Setup::Bearish)
    } else {
        None
    }
}

/// [`detect_cradle`] over a series and its precomputed EMA pair.
pub fn detect_in_series(series: &CandleSeries, emas: &EmaPair, index: usize) -> Option<Setup> {
    detect_cradle(series.candles(), &emas.fast, &emas.slow, index)
}
