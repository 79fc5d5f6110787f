// =============================================================================
// Scan events and progress tracking
// =============================================================================
//
// The scanner never talks to a UI. It emits `ScanEvent`s on a channel and any
// number of reporters fold them into logs, dashboard state, etc.
// =============================================================================

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::market_data::Timeframe;
use crate::types::SetupMatch;

/// Progress after one symbol of a timeframe has been processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub timeframe: Timeframe,
    pub symbol: String,
    pub processed: usize,
    pub total: usize,
    /// `processed / total`, in `[0, 1]`.
    pub fraction: f64,
    pub elapsed_ms: u64,
    pub eta_secs: u64,
}

/// Everything one timeframe produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeframeReport {
    pub timeframe: Option<Timeframe>,
    pub latest: Vec<SetupMatch>,
    pub previous: Vec<SetupMatch>,
    pub elapsed_ms: u64,
    pub evaluated: usize,
    pub insufficient: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl TimeframeReport {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe: Some(timeframe),
            ..Self::default()
        }
    }

    pub fn match_count(&self) -> usize {
        self.latest.len() + self.previous.len()
    }
}

/// Totals of a finished scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub latest_count: usize,
    pub previous_count: usize,
    pub pairs_total: usize,
    pub evaluated: usize,
    pub insufficient: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

/// Events emitted by the scanner, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    Started {
        scan_id: String,
        timeframes: Vec<Timeframe>,
        symbols: usize,
    },
    TimeframeStarted {
        timeframe: Timeframe,
        total: usize,
    },
    Progress(ProgressUpdate),
    TimeframeCompleted(TimeframeReport),
    Finished(ScanSummary),
}

/// Remaining time extrapolated from the average time per processed item.
pub fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Duration {
    if processed == 0 || processed >= total {
        return Duration::ZERO;
    }
    let per_item = elapsed.as_secs_f64() / processed as f64;
    Duration::from_secs_f64(per_item * (total - processed) as f64)
}

/// `"{m}m {s}s"`, the way durations are shown to the user.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Per-timeframe progress counter.
#[derive(Debug)]
pub struct ProgressTracker {
    timeframe: Timeframe,
    total: usize,
    processed: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(timeframe: Timeframe, total: usize) -> Self {
        Self {
            timeframe,
            total,
            processed: 0,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count `symbol` as processed and describe the new position.
    pub fn record(&mut self, symbol: &str) -> ProgressUpdate {
        self.processed = (self.processed + 1).min(self.total);
        self.update_at(symbol, self.elapsed())
    }

    fn update_at(&self, symbol: &str, elapsed: Duration) -> ProgressUpdate {
        let fraction = if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        };

        ProgressUpdate {
            timeframe: self.timeframe,
            symbol: symbol.to_string(),
            processed: self.processed,
            total: self.total,
            fraction,
            elapsed_ms: elapsed.as_millis() as u64,
            eta_secs: estimate_remaining(elapsed, self.processed, self.total).as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_extrapolates_average() {
        // 4 of 10 done in 8s => 2s each => 12s left.
        let eta = estimate_remaining(Duration::from_secs(8), 4, 10);
        assert_eq!(eta.as_secs(), 12);
    }

    #[test]
    fn eta_is_zero_at_edges() {
        assert_eq!(estimate_remaining(Duration::from_secs(5), 0, 10), Duration::ZERO);
        assert_eq!(estimate_remaining(Duration::from_secs(5), 10, 10), Duration::ZERO);
        assert_eq!(estimate_remaining(Duration::from_secs(5), 0, 0), Duration::ZERO);
    }

    #[test]
    fn tracker_reports_fraction_and_eta() {
        let mut tracker = ProgressTracker::new(Timeframe::H4, 4);
        tracker.processed = 1;
        let update = tracker.update_at("BTC/USDT:USDT", Duration::from_secs(3));
        assert_eq!(update.processed, 1);
        assert!((update.fraction - 0.25).abs() < 1e-12);
        assert_eq!(update.eta_secs, 9);
        assert_eq!(update.elapsed_ms, 3_000);

        for _ in 0..10 {
            tracker.record("ETH/USDT:USDT");
        }
        let last = tracker.record("ETH/USDT:USDT");
        assert_eq!(last.processed, 4);
        assert!((last.fraction - 1.0).abs() < 1e-12);
        assert_eq!(last.eta_secs, 0);
    }

    #[test]
    fn format_duration_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0m 0s");
        assert_eq!(format_duration(Duration::from_millis(125_900)), "2m 5s");
    }

    #[test]
    fn events_serialise_with_type_tag() {
        let event = ScanEvent::TimeframeStarted {
            timeframe: Timeframe::H1,
            total: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "timeframe_started");
        assert_eq!(json["timeframe"], "1h");
    }
}
