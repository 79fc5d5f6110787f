// =============================================================================
// Scan Orchestrator
// =============================================================================
//
// For every requested timeframe (in order) and every symbol (in order):
//
//   1. Fetch the most recent `candle_limit` candles through the shared
//      request limiter, retrying retryable failures with backoff.
//   2. Skip the pair on provider failure or when history is too short.
//   3. Compute EMA10/EMA20 once and run the cradle detector on the latest
//      pair and on the last closed pair.
//
// Fetches within a timeframe run on a bounded worker pool (semaphore); the
// orchestrating task awaits the workers in request order, so match order and
// progress reporting are deterministic regardless of completion order.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::exchange::{CandleProvider, ProviderError, RequestLimiter};
use crate::indicators::EmaPair;
use crate::market_data::{CandleSeries, Timeframe};
use crate::pattern::cradle::{detect_in_series, MIN_INDEX};
use crate::runtime_config::RuntimeConfig;
use crate::scanner::progress::{
    format_duration, ProgressTracker, ScanEvent, ScanSummary, TimeframeReport,
};
use crate::scanner::request::ScanRequest;
use crate::types::{DetectedOn, DetectionMode, SetupMatch};

// =============================================================================
// Settings
// =============================================================================

/// The slice of [`RuntimeConfig`] the orchestrator needs, frozen per scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub candle_limit: u32,
    pub min_candles: usize,
    pub detection_mode: DetectionMode,
    pub max_concurrent_fetches: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl ScanSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            candle_limit: config.candle_limit,
            min_candles: config.min_candles,
            detection_mode: config.detection_mode,
            max_concurrent_fetches: config.max_concurrent_fetches,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Shared stop flag. Workers check it before fetching; the orchestrator
/// checks it between timeframes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Per-pair evaluation
// =============================================================================

/// Matches found on one (symbol, timeframe) series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairMatches {
    pub latest: Option<SetupMatch>,
    pub previous: Option<SetupMatch>,
}

/// What happened to one (symbol, timeframe) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Evaluated(PairMatches),
    InsufficientHistory(usize),
    Failed(String),
    Cancelled,
}

/// Run the detector over a fetched series. Pure; no I/O.
pub fn evaluate_series(
    symbol: &str,
    timeframe: Timeframe,
    series: &CandleSeries,
    settings: &ScanSettings,
) -> PairOutcome {
    let len = series.len();
    if len < settings.min_candles.max(MIN_INDEX + 1) {
        return PairOutcome::InsufficientHistory(len);
    }

    let emas = EmaPair::compute(&series.closes());

    let matched = |index: usize, detected_on: DetectedOn| {
        let setup = detect_in_series(series, &emas, index)?;
        let candle = series.get(index)?;
        Some(SetupMatch {
            symbol: symbol.to_string(),
            timeframe,
            setup,
            detected_on,
            candle_open_time: candle.open_time,
            close: candle.close,
        })
    };

    let latest = if settings.detection_mode.checks_latest() {
        matched(len - 1, DetectedOn::LatestCandle)
    } else {
        None
    };
    let previous = matched(len - 2, DetectedOn::PreviousCandle);

    PairOutcome::Evaluated(PairMatches { latest, previous })
}

/// Fetch one series, pacing every attempt through `limiter`.
async fn fetch_with_retry(
    provider: &dyn CandleProvider,
    limiter: &RequestLimiter,
    symbol: &str,
    timeframe: Timeframe,
    settings: &ScanSettings,
) -> Result<CandleSeries, ProviderError> {
    let mut attempt: u32 = 0;
    loop {
        limiter.acquire().await;
        let err = match provider
            .fetch_candles(symbol, timeframe, settings.candle_limit)
            .await
        {
            Ok(series) => return Ok(series),
            Err(e) => e,
        };

        if matches!(err, ProviderError::RateLimited) {
            limiter
                .penalize(settings.retry_backoff.max(limiter.interval()))
                .await;
        }

        if !err.is_retryable() || attempt >= settings.max_retries {
            return Err(err);
        }

        let delay = settings.retry_backoff.saturating_mul(1u32 << attempt.min(6));
        attempt += 1;
        debug!(
            symbol,
            timeframe = %timeframe,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying candle fetch"
        );
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Aggregated result of one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub latest: Vec<SetupMatch>,
    pub previous: Vec<SetupMatch>,
    pub pairs_total: usize,
    pub evaluated: usize,
    pub insufficient: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ScanOutcome {
    fn absorb(&mut self, report: &TimeframeReport) {
        self.latest.extend(report.latest.iter().cloned());
        self.previous.extend(report.previous.iter().cloned());
        self.evaluated += report.evaluated;
        self.insufficient += report.insufficient;
        self.failed += report.failed;
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            scan_id: self.scan_id.clone(),
            latest_count: self.latest.len(),
            previous_count: self.previous.len(),
            pairs_total: self.pairs_total,
            evaluated: self.evaluated,
            insufficient: self.insufficient,
            failed: self.failed,
            elapsed_ms: self.elapsed.as_millis() as u64,
            cancelled: self.cancelled,
        }
    }
}

fn emit(events: Option<&mpsc::UnboundedSender<ScanEvent>>, event: ScanEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is listening any more.
        let _ = tx.send(event);
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// Runs scans against an injected candle provider.
pub struct Scanner {
    provider: Arc<dyn CandleProvider>,
    limiter: Arc<RequestLimiter>,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(
        provider: Arc<dyn CandleProvider>,
        limiter: Arc<RequestLimiter>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            provider,
            limiter,
            settings,
        }
    }

    /// Run `request`, publishing [`ScanEvent`]s on `events` and honouring
    /// `cancel`. A cancelled scan returns the matches gathered so far.
    pub async fn run(
        &self,
        scan_id: &str,
        request: &ScanRequest,
        events: Option<&mpsc::UnboundedSender<ScanEvent>>,
        cancel: &CancelFlag,
    ) -> ScanOutcome {
        let started = Instant::now();
        let mut outcome = ScanOutcome {
            scan_id: scan_id.to_string(),
            pairs_total: request.pair_count(),
            ..ScanOutcome::default()
        };

        info!(
            scan_id,
            symbols = request.symbols().len(),
            timeframes = ?request.timeframes(),
            mode = %self.settings.detection_mode,
            workers = self.settings.max_concurrent_fetches,
            "scan started"
        );
        emit(
            events,
            ScanEvent::Started {
                scan_id: scan_id.to_string(),
                timeframes: request.timeframes().to_vec(),
                symbols: request.symbols().len(),
            },
        );

        for &timeframe in request.timeframes() {
            if cancel.is_cancelled() {
                break;
            }
            let report = self
                .scan_timeframe(timeframe, request.symbols(), events, cancel)
                .await;
            outcome.absorb(&report);
            emit(events, ScanEvent::TimeframeCompleted(report));
        }

        outcome.cancelled = cancel.is_cancelled();
        outcome.elapsed = started.elapsed();

        info!(
            scan_id,
            latest = outcome.latest.len(),
            previous = outcome.previous.len(),
            evaluated = outcome.evaluated,
            failed = outcome.failed,
            insufficient = outcome.insufficient,
            cancelled = outcome.cancelled,
            elapsed = %format_duration(outcome.elapsed),
            "scan finished"
        );
        emit(events, ScanEvent::Finished(outcome.summary()));

        outcome
    }

    async fn scan_timeframe(
        &self,
        timeframe: Timeframe,
        symbols: &[String],
        events: Option<&mpsc::UnboundedSender<ScanEvent>>,
        cancel: &CancelFlag,
    ) -> TimeframeReport {
        let mut tracker = ProgressTracker::new(timeframe, symbols.len());
        emit(
            events,
            ScanEvent::TimeframeStarted {
                timeframe,
                total: symbols.len(),
            },
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));

        let handles: Vec<_> = symbols
            .iter()
            .map(|symbol| {
                let semaphore = semaphore.clone();
                let provider = self.provider.clone();
                let limiter = self.limiter.clone();
                let settings = self.settings.clone();
                let cancel = cancel.clone();
                let symbol = symbol.clone();

                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return PairOutcome::Cancelled;
                    };
                    if cancel.is_cancelled() {
                        return PairOutcome::Cancelled;
                    }
                    match fetch_with_retry(provider.as_ref(), &limiter, &symbol, timeframe, &settings)
                        .await
                    {
                        Ok(series) => evaluate_series(&symbol, timeframe, &series, &settings),
                        Err(e) => {
                            debug!(symbol = %symbol, timeframe = %timeframe, error = %e, "pair skipped");
                            PairOutcome::Failed(e.to_string())
                        }
                    }
                })
            })
            .collect();

        let mut report = TimeframeReport::new(timeframe);

        for (symbol, handle) in symbols.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "scan worker failed");
                    PairOutcome::Failed(format!("worker task failed: {e}"))
                }
            };

            match outcome {
                PairOutcome::Evaluated(matches) => {
                    report.evaluated += 1;
                    report.latest.extend(matches.latest);
                    report.previous.extend(matches.previous);
                }
                PairOutcome::InsufficientHistory(len) => {
                    debug!(symbol = %symbol, timeframe = %timeframe, candles = len, "insufficient history");
                    report.insufficient += 1;
                }
                PairOutcome::Failed(_) => report.failed += 1,
                PairOutcome::Cancelled => {
                    report.cancelled += 1;
                    continue;
                }
            }

            emit(events, ScanEvent::Progress(tracker.record(symbol)));
        }

        report.elapsed_ms = tracker.elapsed().as_millis() as u64;

        info!(
            timeframe = %timeframe,
            matches = report.match_count(),
            evaluated = report.evaluated,
            failed = report.failed,
            insufficient = report.insufficient,
            elapsed = %format_duration(tracker.elapsed()),
            "timeframe scanned"
        );

        report
    }
}

// =============================================================================
// Tests
// =============================================================================
