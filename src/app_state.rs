// =============================================================================
// Central Application State — Cradle Screener
// =============================================================================
//
// Ties together the runtime config, the injected exchange adapters, the shared
// request limiter and the status of the current/last scan, and provides a
// unified snapshot for the REST API and WebSocket feed.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot locks for mutable shared state; never held across an await.
//   - Arc wrappers for the adapters, which are shared read-only.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::exchange::rate_limit::LimiterSnapshot;
use crate::exchange::{CandleProvider, MarketLister, RequestLimiter};
use crate::market_data::Timeframe;
use crate::runtime_config::RuntimeConfig;
use crate::scanner::{CancelFlag, ScanStatus};
use crate::scheduler::{seconds_until_next_close, shortest_timeframe};
use crate::types::DetectionMode;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// The scan currently in flight.
#[derive(Debug, Clone)]
pub struct ActiveScan {
    pub scan_id: String,
    pub cancel: CancelFlag,
}

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every meaningful state mutation. The WebSocket feed
    /// uses this to detect changes and push updates.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub config_path: PathBuf,

    // ── Exchange ────────────────────────────────────────────────────────
    pub candles: Arc<dyn CandleProvider>,
    pub markets: Arc<dyn MarketLister>,
    pub limiter: Arc<RequestLimiter>,

    // ── Scanning ────────────────────────────────────────────────────────
    pub scan: RwLock<ScanStatus>,
    pub active_scan: Mutex<Option<ActiveScan>>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Operational Status ──────────────────────────────────────────────
    pub ws_clients: AtomicU64,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        config_path: impl Into<PathBuf>,
        candles: Arc<dyn CandleProvider>,
        markets: Arc<dyn MarketLister>,
    ) -> Self {
        let limiter = Arc::new(RequestLimiter::new(config.request_interval()));

        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),

            runtime_config: Arc::new(RwLock::new(config)),
            config_path: config_path.into(),

            candles,
            markets,
            limiter,

            scan: RwLock::new(ScanStatus::default()),
            active_scan: Mutex::new(None),

            recent_errors: RwLock::new(Vec::new()),
            ws_clients: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message, evicting the oldest beyond
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Scan bookkeeping ────────────────────────────────────────────────

    pub fn running_scan_id(&self) -> Option<String> {
        self.active_scan.lock().as_ref().map(|a| a.scan_id.clone())
    }

    /// Claim the scan slot. Returns the id of the scan already holding it on
    /// conflict.
    pub fn try_claim_scan(&self, scan: ActiveScan) -> Result<(), String> {
        let mut active = self.active_scan.lock();
        if let Some(current) = active.as_ref() {
            return Err(current.scan_id.clone());
        }
        *active = Some(scan);
        Ok(())
    }

    /// Release the scan slot if `scan_id` still holds it.
    pub fn finish_scan(&self, scan_id: &str) {
        let mut active = self.active_scan.lock();
        if active.as_ref().map(|a| a.scan_id.as_str()) == Some(scan_id) {
            *active = None;
        }
        drop(active);
        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable snapshot of the service state, sent on
    /// `GET /api/v1/state` and over the WebSocket feed.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let config = self.runtime_config.read().clone();

        let auto_refresh = AutoRefreshSnapshot {
            enabled: config.auto_refresh,
            timeframe: shortest_timeframe(&config.timeframes),
            next_close_in_secs: if config.auto_refresh {
                shortest_timeframe(&config.timeframes)
                    .map(|tf| seconds_until_next_close(now, tf))
            } else {
                None
            },
            settle_secs: config.auto_refresh_settle_secs,
        };

        StateSnapshot {
            state_version: self.current_state_version(),
            ws_sequence_number: self.ws_sequence_number.load(Ordering::Relaxed),
            server_time: now.timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            ws_clients: self.ws_clients.load(Ordering::Relaxed),
            scan: self.scan.read().clone(),
            runtime_config: RuntimeConfigSummary::from(&config),
            auto_refresh,
            limiter: self.limiter.snapshot(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub ws_sequence_number: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub ws_clients: u64,
    pub scan: ScanStatus,
    pub runtime_config: RuntimeConfigSummary,
    pub auto_refresh: AutoRefreshSnapshot,
    pub limiter: LimiterSnapshot,
    pub recent_errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoRefreshSnapshot {
    pub enabled: bool,
    /// Shortest configured timeframe, which paces the refresh.
    pub timeframe: Option<Timeframe>,
    pub next_close_in_secs: Option<i64>,
    pub settle_secs: u64,
}

/// Summary of runtime config for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfigSummary {
    pub timeframes: Vec<Timeframe>,
    pub symbols: Vec<String>,
    pub settlement_marker: String,
    pub market_type: String,
    pub candle_limit: u32,
    pub min_candles: usize,
    pub detection_mode: DetectionMode,
    pub request_interval_ms: u64,
    pub max_concurrent_fetches: usize,
    pub auto_refresh: bool,
}

impl From<&RuntimeConfig> for RuntimeConfigSummary {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            timeframes: config.timeframes.clone(),
            symbols: config.symbols.clone(),
            settlement_marker: config.settlement_marker.clone(),
            market_type: config.market_type.clone(),
            candle_limit: config.candle_limit,
            min_candles: config.min_candles,
            detection_mode: config.detection_mode,
            request_interval_ms: config.request_interval_ms,
            max_concurrent_fetches: config.max_concurrent_fetches,
            auto_refresh: config.auto_refresh,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
