// =============================================================================
// Scan reporters
// =============================================================================
//
// Consumers of the scanner's event channel:
//   - the log reporter renders per-timeframe match tables and the final
//     status into the tracing log;
//   - the state reporter folds events into `AppState.scan` so the REST and
//     WebSocket surfaces can show progress and incremental results.
// =============================================================================

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::scanner::progress::{format_duration, ScanEvent, TimeframeReport};
use crate::scanner::status::{status_message, NO_SETUPS_MESSAGE};
use crate::types::{DetectedOn, SetupMatch};

const HEADERS: [&str; 4] = ["Symbol", "Timeframe", "Setup", "Detected On"];

/// Plain-text table of `matches` with a title line.
pub fn render_table(title: &str, matches: &[&SetupMatch]) -> String {
    let rows: Vec<[String; 4]> = matches
        .iter()
        .map(|m| {
            [
                m.symbol.clone(),
                m.timeframe.to_string(),
                m.setup.to_string(),
                m.detected_on.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(
        out,
        "{:<w0$} | {:<w1$} | {:<w2$} | {:<w3$}",
        HEADERS[0],
        HEADERS[1],
        HEADERS[2],
        HEADERS[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &rows {
        let _ = writeln!(
            out,
            "{:<w0$} | {:<w1$} | {:<w2$} | {:<w3$}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        );
    }
    out
}

/// "Latest Candle" and "Previous Candle" tables for one finished timeframe,
/// or `None` when the timeframe produced no match.
pub fn render_timeframe(report: &TimeframeReport) -> Option<String> {
    if report.match_count() == 0 {
        return None;
    }

    let label = report
        .timeframe
        .map(|tf| tf.to_string())
        .unwrap_or_default();

    let mut out = String::new();
    for (detected_on, matches) in [
        (DetectedOn::LatestCandle, &report.latest),
        (DetectedOn::PreviousCandle, &report.previous),
    ] {
        if !matches.is_empty() {
            let rows: Vec<&SetupMatch> = matches.iter().collect();
            out.push_str(&render_table(&format!("{detected_on} ({label})"), &rows));
        }
    }
    Some(out)
}

/// Write one event to the log.
pub fn log_event(event: &ScanEvent) {
    match event {
        ScanEvent::Started {
            scan_id,
            timeframes,
            symbols,
        } => {
            info!(scan_id = %scan_id, ?timeframes, symbols, "scanning");
        }
        ScanEvent::TimeframeStarted { timeframe, total } => {
            info!(timeframe = %timeframe, total, "scanning timeframe");
        }
        ScanEvent::Progress(update) => {
            debug!(
                timeframe = %update.timeframe,
                symbol = %update.symbol,
                processed = update.processed,
                total = update.total,
                pct = update.fraction * 100.0,
                eta = %format_duration(std::time::Duration::from_secs(update.eta_secs)),
                "progress"
            );
        }
        ScanEvent::TimeframeCompleted(report) => {
            let elapsed = format_duration(std::time::Duration::from_millis(report.elapsed_ms));
            match render_timeframe(report) {
                Some(tables) => info!(elapsed = %elapsed, "setups found\n{tables}"),
                None => debug!(
                    timeframe = ?report.timeframe,
                    elapsed = %elapsed,
                    "no setups on timeframe"
                ),
            }
        }
        ScanEvent::Finished(summary) => {
            let message = status_message(summary);
            if message == NO_SETUPS_MESSAGE {
                warn!(scan_id = %summary.scan_id, "{message}");
            } else {
                info!(
                    scan_id = %summary.scan_id,
                    latest = summary.latest_count,
                    previous = summary.previous_count,
                    elapsed = %format_duration(std::time::Duration::from_millis(summary.elapsed_ms)),
                    "{message}"
                );
            }
        }
    }
}

/// Drain the scanner's channel into the log and into `state.scan` until the
/// sender is dropped.
pub async fn run_reporter(state: Arc<AppState>, mut rx: mpsc::UnboundedReceiver<ScanEvent>) {
    while let Some(event) = rx.recv().await {
        log_event(&event);
        state.scan.write().apply(&event);
        state.increment_version();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Timeframe;
    use crate::types::Setup;

    fn m(symbol: &str, setup: Setup, detected_on: DetectedOn) -> SetupMatch {
        SetupMatch {
            symbol: symbol.to_string(),
            timeframe: Timeframe::H4,
            setup,
            detected_on,
            candle_open_time: 0,
            close: 1.0,
        }
    }

    #[test]
    fn table_has_header_rule_and_rows() {
        let a = m("BTC/USDT:USDT", Setup::Bullish, DetectedOn::LatestCandle);
        let table = render_table("Bullish setups (4h)", &[&a]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Bullish setups (4h)");
        assert!(lines[1].starts_with("Symbol"));
        assert!(lines[2].starts_with("---"));
        assert!(lines[3].contains("BTC/USDT:USDT"));
        assert!(lines[3].contains("Latest Candle"));
    }

    #[test]
    fn timeframe_tables_split_by_candle() {
        let mut report = TimeframeReport::new(Timeframe::H4);
        report.latest.push(m("BTC/USDT:USDT", Setup::Bullish, DetectedOn::LatestCandle));
        report.latest.push(m("SOL/USDT:USDT", Setup::Bearish, DetectedOn::LatestCandle));
        report.previous.push(m("ETH/USDT:USDT", Setup::Bearish, DetectedOn::PreviousCandle));

        let out = render_timeframe(&report).unwrap();
        let latest = out.find("Latest Candle (4h)").unwrap();
        let previous = out.find("Previous Candle (4h)").unwrap();
        assert!(latest < previous);

        let (latest_table, previous_table) = out.split_at(previous);
        assert!(latest_table[latest..].contains("BTC/USDT:USDT"));
        assert!(latest_table.contains("SOL/USDT:USDT"));
        assert!(!latest_table.contains("ETH/USDT:USDT"));
        assert!(previous_table.contains("ETH/USDT:USDT"));
        assert!(latest_table.contains("Bullish") && latest_table.contains("Bearish"));
    }

    #[test]
    fn only_previous_matches_render_one_table() {
        let mut report = TimeframeReport::new(Timeframe::D1);
        report.previous.push(m("ETH/USDT:USDT", Setup::Bullish, DetectedOn::PreviousCandle));

        let out = render_timeframe(&report).unwrap();
        assert!(!out.contains("Latest Candle (1d)"));
        assert!(out.starts_with("Previous Candle (1d)"));
    }

    #[test]
    fn empty_timeframe_renders_nothing() {
        assert!(render_timeframe(&TimeframeReport::new(Timeframe::H1)).is_none());
    }
}
