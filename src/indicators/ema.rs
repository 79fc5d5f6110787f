// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   alpha  = 2 / (span + 1)
//   EMA_0  = close_0
//   EMA_t  = close_t * alpha + EMA_{t-1} * (1 - alpha)
//
// Unlike a windowed EMA there is no SMA warm-up: the series is seeded with the
// first close and the output always has the same length as the input.
// =============================================================================

/// Span of the fast EMA bounding the cradle zone.
pub const FAST_SPAN: usize = 10;
/// Span of the slow EMA bounding the cradle zone.
pub const SLOW_SPAN: usize = 20;

/// Compute the recursive EMA of `closes` for the given `span`.
///
/// The output has exactly `closes.len()` elements and `output[0] == closes[0]`.
/// An empty input yields an empty vec. A `span` of zero is treated as one,
/// which makes the EMA track the input exactly.
pub fn compute_ema(closes: &[f64], span: usize) -> Vec<f64> {
    let Some((&first, rest)) = closes.split_first() else {
        return Vec::new();
    };

    let alpha = 2.0 / (span.max(1) as f64 + 1.0);

    let mut result = Vec::with_capacity(closes.len());
    result.push(first);

    let mut prev = first;
    for &close in rest {
        let ema = alpha * close + (1.0 - alpha) * prev;
        result.push(ema);
        prev = ema;
    }

    result
}

/// The EMA10 / EMA20 envelope computed once per candle series.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaPair {
    pub fast: Vec<f64>,
    pub slow: Vec<f64>,
}

impl EmaPair {
    /// Compute both EMAs over the full close sequence.
    pub fn compute(closes: &[f64]) -> Self {
        Self {
            fast: compute_ema(closes, FAST_SPAN),
            slow: compute_ema(closes, SLOW_SPAN),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(compute_ema(&[], 10).is_empty());
    }

    #[test]
    fn ema_length_matches_input_and_seeds_with_first() {
        let closes = vec![5.0, 7.0, 6.0, 9.0, 12.0, 3.0];
        for span in [1, 2, 10, 20, 200] {
            let ema = compute_ema(&closes, span);
            assert_eq!(ema.len(), closes.len());
            assert_eq!(ema[0], closes[0]);
        }
    }

    #[test]
    fn ema_single_element() {
        assert_eq!(compute_ema(&[42.0], 20), vec![42.0]);
    }

    #[test]
    fn ema_known_values() {
        // span 3 => alpha = 0.5
        let ema = compute_ema(&[2.0, 4.0, 8.0], 3);
        assert!((ema[0] - 2.0).abs() < 1e-12);
        assert!((ema[1] - 3.0).abs() < 1e-12);
        assert!((ema[2] - 5.5).abs() < 1e-12);
    }

    #[test]
    fn ema_constant_series_is_flat() {
        let ema = compute_ema(&[100.0; 50], 20);
        assert!(ema.iter().all(|v| (v - 100.0).abs() < 1e-12));
    }

    #[test]
    fn ema_span_zero_tracks_input() {
        let closes = vec![1.0, 3.0, 2.0];
        assert_eq!(compute_ema(&closes, 0), closes);
    }

    #[test]
    fn fast_ema_reacts_more_than_slow() {
        let mut closes = vec![10.0; 30];
        closes.push(20.0);
        let pair = EmaPair::compute(&closes);
        let last = closes.len() - 1;
        assert!(pair.fast[last] > pair.slow[last]);
        assert_eq!(pair.fast.len(), closes.len());
        assert_eq!(pair.slow.len(), closes.len());
    }
}
