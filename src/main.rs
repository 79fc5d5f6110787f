// =============================================================================
// Cradle Screener — Main Entry Point
// =============================================================================
//
// Scans USDT-margined perpetual swaps for EMA10/EMA20 "cradle" reversals and
// serves progress and results over a REST + WebSocket API. Scans are started
// via the API, optionally on startup, and by the auto-refresh loop.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod exchange;
mod indicators;
mod market_data;
mod pattern;
mod runtime_config;
mod scanner;
mod scheduler;
mod types;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::exchange::BitgetClient;
use crate::market_data::Timeframe;
use crate::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};
use crate::scanner::{start_scan, ScanParams};

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Apply `CRADLE_SYMBOLS` / `CRADLE_TIMEFRAMES` on top of the file config.
fn apply_env_overrides(config: &mut RuntimeConfig) -> anyhow::Result<()> {
    if let Ok(syms) = std::env::var("CRADLE_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(tfs) = std::env::var("CRADLE_TIMEFRAMES") {
        config.timeframes =
            Timeframe::parse_list(&tfs).context("invalid CRADLE_TIMEFRAMES")?;
    }
    config.validate()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Cradle Screener starting up");

    let config_path = PathBuf::from(
        std::env::var("CRADLE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()),
    );

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut config)?;

    info!(
        timeframes = ?config.timeframes,
        symbols = config.symbols.len(),
        mode = %config.detection_mode,
        interval_ms = config.request_interval_ms,
        workers = config.max_concurrent_fetches,
        auto_refresh = config.auto_refresh,
        "Configuration ready"
    );

    // ── 2. Exchange client ───────────────────────────────────────────────
    let client = Arc::new(
        BitgetClient::new(config.exchange_base_url.clone(), config.request_timeout())
            .context("failed to build exchange client")?,
    );
    info!(base_url = %client.base_url(), "Exchange client ready");

    // ── 3. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        config,
        config_path.clone(),
        client.clone(),
        client,
    ));

    // ── 4. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("CRADLE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Auto-refresh loop ─────────────────────────────────────────────
    tokio::spawn(scheduler::run_auto_refresh(state.clone()));

    // ── 6. Optional scan on startup ──────────────────────────────────────
    if env_flag("CRADLE_SCAN_ON_START") {
        match start_scan(&state, ScanParams::default()).await {
            Ok(scan_id) => info!(scan_id = %scan_id, "Startup scan launched"),
            Err(e) => {
                warn!(error = %e, "Startup scan not started");
                state.push_error(format!("startup scan: {e}"));
            }
        }
    }

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");

    scanner::cancel_scan(&state);

    let config = state.runtime_config.read().clone();
    if let Err(e) = config.save(&config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Cradle Screener shut down complete.");
    Ok(())
}
