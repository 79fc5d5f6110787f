// =============================================================================
// Scan status — dashboard view of the current/last scan
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::market_data::Timeframe;
use crate::scanner::progress::{ScanEvent, ScanSummary};
use crate::types::SetupMatch;

pub const NO_SETUPS_MESSAGE: &str = "No valid Cradle setups found.";
pub const COMPLETE_MESSAGE: &str = "Scan complete";
pub const CANCELLED_MESSAGE: &str = "Scan cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Progress and incremental results of one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeStatus {
    pub timeframe: Timeframe,
    pub total: usize,
    pub processed: usize,
    pub fraction: f64,
    pub eta_secs: u64,
    pub current_symbol: Option<String>,
    pub done: bool,
    pub elapsed_ms: Option<u64>,
    pub latest: Vec<SetupMatch>,
    pub previous: Vec<SetupMatch>,
    pub failed: usize,
    pub insufficient: usize,
}

impl TimeframeStatus {
    fn pending(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            total: 0,
            processed: 0,
            fraction: 0.0,
            eta_secs: 0,
            current_symbol: None,
            done: false,
            elapsed_ms: None,
            latest: Vec::new(),
            previous: Vec::new(),
            failed: 0,
            insufficient: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub scan_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub symbols: usize,
    pub timeframes: Vec<TimeframeStatus>,
    /// All latest-candle matches so far, in scan order.
    pub latest: Vec<SetupMatch>,
    /// All previous-candle matches so far, in scan order.
    pub previous: Vec<SetupMatch>,
    pub message: Option<String>,
    pub summary: Option<ScanSummary>,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            phase: ScanPhase::Idle,
            scan_id: None,
            started_at: None,
            finished_at: None,
            symbols: 0,
            timeframes: Vec::new(),
            latest: Vec::new(),
            previous: Vec::new(),
            message: None,
            summary: None,
        }
    }
}

impl ScanStatus {
    pub fn is_running(&self) -> bool {
        self.phase == ScanPhase::Running
    }

    /// Reset for a new scan. Results of the previous scan are dropped.
    pub fn begin(&mut self, scan_id: &str, timeframes: &[Timeframe], symbols: usize) {
        *self = Self {
            phase: ScanPhase::Running,
            scan_id: Some(scan_id.to_string()),
            started_at: Some(Utc::now()),
            symbols,
            timeframes: timeframes.iter().copied().map(TimeframeStatus::pending).collect(),
            ..Self::default()
        };
    }

    fn timeframe_mut(&mut self, timeframe: Timeframe) -> &mut TimeframeStatus {
        let pos = match self.timeframes.iter().position(|t| t.timeframe == timeframe) {
            Some(pos) => pos,
            None => {
                self.timeframes.push(TimeframeStatus::pending(timeframe));
                self.timeframes.len() - 1
            }
        };
        &mut self.timeframes[pos]
    }

    /// Fold one scanner event into the status.
    pub fn apply(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::Started {
                scan_id,
                timeframes,
                symbols,
            } => {
                if self.scan_id.as_deref() != Some(scan_id.as_str()) || !self.is_running() {
                    self.begin(scan_id, timeframes, *symbols);
                }
            }
            ScanEvent::TimeframeStarted { timeframe, total } => {
                let tf = self.timeframe_mut(*timeframe);
                tf.total = *total;
                tf.fraction = if *total == 0 { 1.0 } else { 0.0 };
            }
            ScanEvent::Progress(update) => {
                let tf = self.timeframe_mut(update.timeframe);
                tf.total = update.total;
                tf.processed = update.processed;
                tf.fraction = update.fraction;
                tf.eta_secs = update.eta_secs;
                tf.current_symbol = Some(update.symbol.clone());
            }
            ScanEvent::TimeframeCompleted(report) => {
                let Some(timeframe) = report.timeframe else {
                    return;
                };
                let tf = self.timeframe_mut(timeframe);
                tf.done = true;
                tf.eta_secs = 0;
                tf.current_symbol = None;
                tf.elapsed_ms = Some(report.elapsed_ms);
                tf.latest = report.latest.clone();
                tf.previous = report.previous.clone();
                tf.failed = report.failed;
                tf.insufficient = report.insufficient;

                self.latest.extend(report.latest.iter().cloned());
                self.previous.extend(report.previous.iter().cloned());
            }
            ScanEvent::Finished(summary) => {
                self.phase = if summary.cancelled {
                    ScanPhase::Cancelled
                } else {
                    ScanPhase::Completed
                };
                self.finished_at = Some(Utc::now());
                self.message = Some(status_message(summary).to_string());
                self.summary = Some(summary.clone());
            }
        }
    }
}

/// Final line shown to the user for a finished scan.
pub fn status_message(summary: &ScanSummary) -> &'static str {
    if summary.cancelled {
        CANCELLED_MESSAGE
    } else if summary.latest_count + summary.previous_count == 0 {
        NO_SETUPS_MESSAGE
    } else {
        COMPLETE_MESSAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::progress::{ProgressUpdate, TimeframeReport};
    use crate::types::{DetectedOn, Setup};

    fn sample_match(symbol: &str) -> SetupMatch {
        SetupMatch {
            symbol: symbol.to_string(),
            timeframe: Timeframe::H1,
            setup: Setup::Bearish,
            detected_on: DetectedOn::PreviousCandle,
            candle_open_time: 0,
            close: 1.0,
        }
    }

    #[test]
    fn default_is_idle() {
        let status = ScanStatus::default();
        assert_eq!(status.phase, ScanPhase::Idle);
        assert!(!status.is_running());
    }

    #[test]
    fn folds_a_full_scan() {
        let mut status = ScanStatus::default();
        status.apply(&ScanEvent::Started {
            scan_id: "s1".into(),
            timeframes: vec![Timeframe::H1],
            symbols: 2,
        });
        assert!(status.is_running());
        assert_eq!(status.timeframes.len(), 1);

        status.apply(&ScanEvent::TimeframeStarted {
            timeframe: Timeframe::H1,
            total: 2,
        });
        status.apply(&ScanEvent::Progress(ProgressUpdate {
            timeframe: Timeframe::H1,
            symbol: "BTC/USDT:USDT".into(),
            processed: 1,
            total: 2,
            fraction: 0.5,
            elapsed_ms: 300,
            eta_secs: 1,
        }));
        assert_eq!(status.timeframes[0].processed, 1);
        assert_eq!(status.timeframes[0].current_symbol.as_deref(), Some("BTC/USDT:USDT"));

        let mut report = TimeframeReport::new(Timeframe::H1);
        report.previous.push(sample_match("BTC/USDT:USDT"));
        report.elapsed_ms = 700;
        status.apply(&ScanEvent::TimeframeCompleted(report));
        assert!(status.timeframes[0].done);
        assert_eq!(status.previous.len(), 1);

        status.apply(&ScanEvent::Finished(ScanSummary {
            scan_id: "s1".into(),
            previous_count: 1,
            ..ScanSummary::default()
        }));
        assert_eq!(status.phase, ScanPhase::Completed);
        assert_eq!(status.message.as_deref(), Some(COMPLETE_MESSAGE));
    }

    #[test]
    fn new_scan_discards_previous_results() {
        let mut status = ScanStatus::default();
        status.begin("s1", &[Timeframe::H1], 1);
        status.latest.push(sample_match("BTC/USDT:USDT"));
        status.phase = ScanPhase::Completed;

        status.apply(&ScanEvent::Started {
            scan_id: "s2".into(),
            timeframes: vec![Timeframe::D1],
            symbols: 3,
        });
        assert!(status.latest.is_empty());
        assert_eq!(status.scan_id.as_deref(), Some("s2"));
        assert_eq!(status.timeframes[0].timeframe, Timeframe::D1);
    }

    #[test]
    fn messages_reflect_outcome() {
        let empty = ScanSummary::default();
        assert_eq!(status_message(&empty), NO_SETUPS_MESSAGE);

        let cancelled = ScanSummary {
            cancelled: true,
            latest_count: 3,
            ..ScanSummary::default()
        };
        assert_eq!(status_message(&cancelled), CANCELLED_MESSAGE);
    }
}
