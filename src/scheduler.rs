// =============================================================================
// Auto-refresh — re-run the scan at every close of the shortest timeframe
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::market_data::Timeframe;
use crate::scanner::{start_scan, ScanError, ScanParams};

/// 1970-01-01 was a Thursday; weekly candles open on Monday 00:00 UTC.
const WEEK_ANCHOR_SECS: i64 = 4 * 86_400;

/// How often the loop re-reads the config while idle or waiting.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The timeframe with the shortest period.
pub fn shortest_timeframe(timeframes: &[Timeframe]) -> Option<Timeframe> {
    timeframes.iter().copied().min_by_key(|tf| tf.seconds())
}

/// Seconds from `now` to the close of the candle of `timeframe` that contains
/// `now`. Always in `1..=period`; exactly on a boundary the full next period
/// is returned.
pub fn seconds_until_next_close(now: DateTime<Utc>, timeframe: Timeframe) -> i64 {
    let period = timeframe.seconds();
    let anchor = if timeframe == Timeframe::W1 {
        WEEK_ANCHOR_SECS
    } else {
        0
    };
    let into_bucket = (now.timestamp() - anchor).rem_euclid(period);
    period - into_bucket
}

/// Instant at which the refresh for a close `until_close` seconds away fires,
/// or `None` if the delay cannot be represented.
fn refresh_deadline(now: Instant, until_close: i64, settle_secs: u64) -> Option<Instant> {
    let wait_secs = u64::try_from(until_close).ok()?.checked_add(settle_secs)?;
    now.checked_add(Duration::from_secs(wait_secs))
}

/// Timeframe the loop should currently track, if auto-refresh is on.
fn armed_timeframe(state: &AppState) -> Option<(Timeframe, u64)> {
    let config = state.runtime_config.read();
    if !config.auto_refresh {
        return None;
    }
    shortest_timeframe(&config.timeframes).map(|tf| (tf, config.auto_refresh_settle_secs))
}

/// Background loop. Waits for the next close of the shortest configured
/// timeframe plus the settle delay, then starts a scan unless one is
/// already running. Config changes are picked up within [`POLL_INTERVAL`].
pub async fn run_auto_refresh(state: Arc<AppState>) {
    loop {
        let Some((timeframe, settle_secs)) = armed_timeframe(&state) else {
            sleep(POLL_INTERVAL).await;
            continue;
        };

        let until_close = seconds_until_next_close(Utc::now(), timeframe);
        let Some(deadline) = refresh_deadline(Instant::now(), until_close, settle_secs) else {
            warn!(timeframe = %timeframe, settle_secs, "auto-refresh delay out of range, not armed");
            sleep(POLL_INTERVAL).await;
            continue;
        };
        info!(timeframe = %timeframe, until_close, settle_secs, "auto-refresh armed");

        let mut disarmed = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(remaining.min(POLL_INTERVAL)).await;
            if armed_timeframe(&state).map(|(tf, _)| tf) != Some(timeframe) {
                disarmed = true;
                break;
            }
        }
        if disarmed {
            debug!(timeframe = %timeframe, "auto-refresh settings changed, re-arming");
            continue;
        }

        match start_scan(&state, ScanParams::default()).await {
            Ok(scan_id) => info!(scan_id = %scan_id, timeframe = %timeframe, "auto-refresh scan started"),
            Err(ScanError::AlreadyRunning(scan_id)) => {
                info!(scan_id = %scan_id, "auto-refresh skipped, scan still running")
            }
            Err(e) => {
                warn!(error = %e, "auto-refresh scan failed to start");
                state.push_error(format!("auto-refresh: {e}"));
            }
        }
    }
}
