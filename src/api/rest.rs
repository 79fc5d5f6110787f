// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Health and the timeframe catalogue are
// public; everything else requires a valid Bearer token checked via the
// `AuthBearer` extractor.
//
// CORS is configured permissively; the dashboard is served from elsewhere.
// =============================================================================

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::exchange::client::granularity;
use crate::market_data::Timeframe;
use crate::scanner::{cancel_scan, start_scan, ScanError, ScanParams};
use crate::types::SetupMatch;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/timeframes", get(timeframes))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/scan", get(scan_status).post(scan_start))
        .route("/api/v1/scan/cancel", post(scan_cancel))
        .route("/api/v1/results", get(results))
        .route("/api/v1/auto-refresh", get(get_auto_refresh).post(set_auto_refresh))
        // ── WebSocket ───────────────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, Json(body)).into_response()
}

// =============================================================================
// Health & catalogue (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    scan_running: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        scan_running: state.running_scan_id().is_some(),
    })
}

#[derive(Serialize)]
struct TimeframeInfo {
    timeframe: Timeframe,
    minutes: u32,
    /// Whether the exchange serves candles for it.
    supported: bool,
}

async fn timeframes() -> impl IntoResponse {
    let list: Vec<TimeframeInfo> = Timeframe::all()
        .iter()
        .map(|&tf| TimeframeInfo {
            timeframe: tf,
            minutes: tf.minutes(),
            supported: granularity(tf).is_some(),
        })
        .collect();
    Json(list)
}

// =============================================================================
// State snapshot (authenticated)
// =============================================================================

async fn full_state(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Scan control (authenticated)
// =============================================================================

async fn scan_status(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.scan.read().clone())
}

#[derive(Serialize)]
struct ScanStarted {
    scan_id: String,
}

async fn scan_start(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    // An empty body scans the configured defaults; anything else must parse.
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        ScanParams::default()
    } else {
        match serde_json::from_slice::<ScanParams>(&body) {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "scan request body rejected");
                return error_response(StatusCode::BAD_REQUEST, format!("invalid scan parameters: {e}"));
            }
        }
    };

    match start_scan(&state, params).await {
        Ok(scan_id) => {
            info!(scan_id = %scan_id, "scan started via API");
            (StatusCode::ACCEPTED, Json(ScanStarted { scan_id })).into_response()
        }
        Err(e) => {
            let status = match &e {
                ScanError::NoTimeframes | ScanError::NoSymbols => StatusCode::BAD_REQUEST,
                ScanError::AlreadyRunning(_) => StatusCode::CONFLICT,
                ScanError::MarketListing(_) => StatusCode::BAD_GATEWAY,
            };
            warn!(error = %e, status = status.as_u16(), "scan request refused");
            error_response(status, e.to_string())
        }
    }
}

async fn scan_cancel(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> Response {
    match cancel_scan(&state) {
        Some(scan_id) => {
            state.increment_version();
            Json(serde_json::json!({ "cancelled": true, "scan_id": scan_id })).into_response()
        }
        None => error_response(StatusCode::CONFLICT, "no scan is running"),
    }
}

// =============================================================================
// Results (authenticated)
// =============================================================================

#[derive(Serialize)]
struct ResultsResponse {
    scan_id: Option<String>,
    phase: crate::scanner::ScanPhase,
    latest: Vec<SetupMatch>,
    previous: Vec<SetupMatch>,
    message: Option<String>,
}

async fn results(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let scan = state.scan.read();
    Json(ResultsResponse {
        scan_id: scan.scan_id.clone(),
        phase: scan.phase,
        latest: scan.latest.clone(),
        previous: scan.previous.clone(),
        message: scan.message.clone(),
    })
}

// =============================================================================
// Auto-refresh (authenticated)
// =============================================================================

async fn get_auto_refresh(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.build_snapshot().auto_refresh)
}

#[derive(Debug, Deserialize)]
struct AutoRefreshUpdate {
    enabled: bool,
    #[serde(default)]
    settle_secs: Option<u64>,
}

async fn set_auto_refresh(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(update): Json<AutoRefreshUpdate>,
) -> Response {
    let config_clone = {
        let mut config = state.runtime_config.write();
        let mut candidate = config.clone();
        candidate.auto_refresh = update.enabled;
        if let Some(secs) = update.settle_secs {
            candidate.auto_refresh_settle_secs = secs;
        }
        if let Err(e) = candidate.validate() {
            warn!(error = %e, "auto-refresh update rejected");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        *config = candidate.clone();
        candidate
    };

    info!(
        enabled = config_clone.auto_refresh,
        settle_secs = config_clone.auto_refresh_settle_secs,
        "auto-refresh updated"
    );

    // Best-effort persistence.
    if let Err(e) = config_clone.save(&state.config_path) {
        warn!(error = %e, "Failed to save auto-refresh setting to disk");
    }

    state.increment_version();
    Json(state.build_snapshot().auto_refresh).into_response()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use crate::api::auth::ADMIN_TOKEN_ENV;
    use crate::test_support::{test_state, wait_for_idle, StaticCandles, StaticMarkets, BULLISH_LATEST};

    const TOKEN: &str = "test-admin-token";

    fn setup() {
        std::env::set_var(ADMIN_TOKEN_ENV, TOKEN);
    }

    fn authed(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn btc_state() -> Arc<AppState> {
        test_state(
            StaticCandles::default().with("BTC/USDT:USDT", BULLISH_LATEST),
            StaticMarkets::listing(&[("BTC/USDT:USDT", "swap")]),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let state = btc_state();
        let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["scan_running"], false);
    }

    #[tokio::test]
    async fn timeframes_lists_catalogue() {
        let state = btc_state();
        let req = Request::builder().uri("/api/v1/timeframes").body(Body::empty()).unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 17);
        assert_eq!(list[0]["timeframe"], "1m");
        assert_eq!(list[3]["timeframe"], "10m");
        assert_eq!(list[3]["supported"], false);
    }

    #[tokio::test]
    async fn state_requires_token() {
        setup();
        let state = btc_state();

        let req = Request::builder().uri("/api/v1/state").body(Body::empty()).unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = Request::builder()
            .uri("/api/v1/state")
            .header(header::AUTHORIZATION, "Bearer wrong-token")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = send(&state, authed("GET", "/api/v1/state", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scan"]["phase"], "idle");
    }

    #[tokio::test]
    async fn scan_lifecycle_over_http() {
        setup();
        let state = btc_state();

        let (status, json) = send(&state, authed("POST", "/api/v1/scan", None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let scan_id = json["scan_id"].as_str().unwrap().to_string();

        wait_for_idle(&state).await;

        let (status, json) = send(&state, authed("GET", "/api/v1/results", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scan_id"], scan_id.as_str());
        assert_eq!(json["phase"], "completed");
        assert_eq!(json["latest"].as_array().unwrap().len(), 1);
        assert_eq!(json["latest"][0]["symbol"], "BTC/USDT:USDT");
        assert_eq!(json["latest"][0]["detected_on"], "LatestCandle");

        let (status, _) = send(&state, authed("POST", "/api/v1/scan/cancel", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn empty_timeframes_is_bad_request() {
        setup();
        let state = btc_state();
        let body = serde_json::json!({ "timeframes": [] });
        let (status, json) = send(&state, authed("POST", "/api/v1/scan", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "no timeframe selected");
    }

    #[tokio::test]
    async fn unknown_timeframe_is_rejected_before_scanning() {
        setup();
        let state = btc_state();
        let body = serde_json::json!({ "timeframes": ["2w"] });
        let (status, json) = send(&state, authed("POST", "/api/v1/scan", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("invalid scan parameters"));
        assert!(state.running_scan_id().is_none());
        assert!(state.scan.read().scan_id.is_none());
    }

    #[tokio::test]
    async fn malformed_scan_body_is_rejected() {
        setup();
        let state = btc_state();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/scan")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::from("{\"timeframes\": "))
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.running_scan_id().is_none());
    }

    #[tokio::test]
    async fn running_scan_conflicts() {
        setup();
        let state = test_state(
            StaticCandles::default()
                .with("BTC/USDT:USDT", BULLISH_LATEST)
                .delayed(std::time::Duration::from_millis(200)),
            StaticMarkets::listing(&[("BTC/USDT:USDT", "swap")]),
        );

        let (status, _) = send(&state, authed("POST", "/api/v1/scan", None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let (status, _) = send(&state, authed("POST", "/api/v1/scan", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = send(&state, authed("POST", "/api/v1/scan/cancel", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cancelled"], true);
        wait_for_idle(&state).await;
    }

    #[tokio::test]
    async fn listing_failure_is_bad_gateway() {
        setup();
        let state = test_state(StaticCandles::default(), StaticMarkets::failing());
        let (status, _) = send(&state, authed("POST", "/api/v1/scan", None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(state.recent_errors.read().len(), 1);
    }

    #[tokio::test]
    async fn auto_refresh_toggle() {
        setup();
        let state = btc_state();

        let (status, json) = send(&state, authed("GET", "/api/v1/auto-refresh", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["enabled"], false);

        let body = serde_json::json!({ "enabled": true, "settle_secs": 2 });
        let (status, json) = send(&state, authed("POST", "/api/v1/auto-refresh", Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["enabled"], true);
        assert_eq!(json["settle_secs"], 2);
        assert_eq!(json["timeframe"], "1h");
        assert!(state.runtime_config.read().auto_refresh);

        let _ = std::fs::remove_file(&state.config_path);
    }

    #[tokio::test]
    async fn oversized_settle_delay_is_rejected() {
        setup();
        let state = btc_state();
        let before = state.runtime_config.read().clone();

        let body = serde_json::json!({ "enabled": true, "settle_secs": u64::MAX });
        let (status, json) = send(&state, authed("POST", "/api/v1/auto-refresh", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("auto_refresh_settle_secs"));
        assert_eq!(*state.runtime_config.read(), before);
        assert!(!state.config_path.exists());
    }
}
