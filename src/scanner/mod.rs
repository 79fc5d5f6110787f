// =============================================================================
// Scanner Module
// =============================================================================
//
// Orchestrates a scan over (symbol, timeframe) pairs and publishes progress
// and results as events. `start_scan` / `cancel_scan` are the service-level
// entry points used by the API and the auto-refresh loop.

pub mod engine;
pub mod progress;
pub mod reporter;
pub mod request;
pub mod status;

pub use engine::{evaluate_series, CancelFlag, PairOutcome, ScanOutcome, ScanSettings, Scanner};
pub use progress::{ScanEvent, ScanSummary};
pub use request::{ScanError, ScanRequest};
pub use status::{ScanPhase, ScanStatus};

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app_state::{ActiveScan, AppState};
use crate::exchange::markets::filter_symbols;
use crate::exchange::MarketLister;
use crate::market_data::Timeframe;
use crate::runtime_config::RuntimeConfig;

/// Caller overrides for one scan. Missing fields fall back to the config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanParams {
    #[serde(default)]
    pub timeframes: Option<Vec<Timeframe>>,
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
}

/// Symbols to scan: the explicit list, else the configured list, else the
/// market listing filtered by settlement marker and market type.
pub async fn resolve_symbols(
    lister: &dyn MarketLister,
    config: &RuntimeConfig,
    explicit: Option<Vec<String>>,
) -> Result<Vec<String>, ScanError> {
    if let Some(symbols) = explicit.filter(|s| !s.is_empty()) {
        return Ok(symbols);
    }
    if !config.symbols.is_empty() {
        return Ok(config.symbols.clone());
    }

    let markets = lister.load_markets().await?;
    let symbols = filter_symbols(&markets, &config.settlement_marker, &config.market_type);
    info!(
        listed = markets.len(),
        selected = symbols.len(),
        marker = %config.settlement_marker,
        market_type = %config.market_type,
        "symbols resolved from market listing"
    );

    if symbols.is_empty() {
        return Err(ScanError::NoSymbols);
    }
    Ok(symbols)
}

/// Validate, resolve symbols and spawn a scan. Returns the new scan id.
///
/// Configuration errors are returned before any scanning starts; a scan
/// already in flight yields [`ScanError::AlreadyRunning`].
pub async fn start_scan(state: &Arc<AppState>, params: ScanParams) -> Result<String, ScanError> {
    if let Some(scan_id) = state.running_scan_id() {
        return Err(ScanError::AlreadyRunning(scan_id));
    }

    let config = state.runtime_config.read().clone();
    let timeframes = params
        .timeframes
        .unwrap_or_else(|| config.timeframes.clone());
    if timeframes.is_empty() {
        return Err(ScanError::NoTimeframes);
    }

    let symbols = resolve_symbols(state.markets.as_ref(), &config, params.symbols)
        .await
        .map_err(|e| {
            state.push_error(format!("scan not started: {e}"));
            e
        })?;
    let request = ScanRequest::new(symbols, timeframes)?;

    let scan_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancelFlag::new();
    state
        .try_claim_scan(ActiveScan {
            scan_id: scan_id.clone(),
            cancel: cancel.clone(),
        })
        .map_err(ScanError::AlreadyRunning)?;

    state
        .scan
        .write()
        .begin(&scan_id, request.timeframes(), request.symbols().len());
    state.increment_version();

    let scanner = Scanner::new(
        state.candles.clone(),
        state.limiter.clone(),
        ScanSettings::from_config(&config),
    );

    let task_state = state.clone();
    let task_id = scan_id.clone();
    tokio::spawn(async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = tokio::spawn(reporter::run_reporter(task_state.clone(), rx));

        scanner.run(&task_id, &request, Some(&tx), &cancel).await;
        drop(tx);

        if let Err(e) = reporter.await {
            warn!(scan_id = %task_id, error = %e, "scan reporter task failed");
        }
        task_state.finish_scan(&task_id);
    });

    Ok(scan_id)
}

/// Request cancellation of the running scan. Returns its id, or `None` when
/// nothing is running.
pub fn cancel_scan(state: &AppState) -> Option<String> {
    let active = state.active_scan.lock();
    let scan = active.as_ref()?;
    scan.cancel.cancel();
    info!(scan_id = %scan.scan_id, "scan cancellation requested");
    Some(scan.scan_id.clone())
}
