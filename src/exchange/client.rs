// =============================================================================
// Bitget REST Client — USDT-M perpetual contracts (public market data only)
// =============================================================================
//
// Only unauthenticated endpoints are used: the contract listing and the candle
// history. Every response is wrapped in Bitget's envelope
// `{ "code": "00000", "msg": "success", "data": ... }`; any other code is an
// API rejection.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::exchange::markets::{native_id, Market, SWAP_MARKET_TYPE};
use crate::exchange::provider::{CandleProvider, MarketLister, ProviderError};
use crate::market_data::{Candle, CandleSeries, Timeframe};

/// Default public REST host.
pub const DEFAULT_BASE_URL: &str = "https://api.bitget.com";

/// Product line of USDT-margined contracts.
const PRODUCT_TYPE: &str = "USDT-FUTURES";

/// Success code inside the response envelope.
const OK_CODE: &str = "00000";

/// Longest error body kept in a [`ProviderError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Bitget public REST client.
#[derive(Clone)]
pub struct BitgetClient {
    base_url: String,
    client: reqwest::Client,
}

impl BitgetClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client against `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BitgetClient initialised");

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn get_data(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self.client.get(&url).query(query).send().await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: truncate_body(&text, MAX_ERROR_BODY),
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("GET {path}: {e}")))?;

        unwrap_envelope(body)
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v2/mix/market/contracts: all USDT-M contracts.
    #[instrument(skip(self), name = "bitget::load_markets")]
    pub async fn get_contracts(&self) -> Result<Vec<Market>, ProviderError> {
        let data = self
            .get_data(
                "/api/v2/mix/market/contracts",
                &[("productType", PRODUCT_TYPE.to_string())],
            )
            .await?;

        let markets = parse_contracts(&data)?;
        debug!(count = markets.len(), "contracts loaded");
        Ok(markets)
    }

    /// GET /api/v2/mix/market/candles: recent candles, oldest first.
    #[instrument(skip(self), name = "bitget::get_candles")]
    pub async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries, ProviderError> {
        let granularity =
            granularity(timeframe).ok_or(ProviderError::UnsupportedTimeframe(timeframe))?;

        let data = self
            .get_data(
                "/api/v2/mix/market/candles",
                &[
                    ("symbol", native_id(symbol)),
                    ("productType", PRODUCT_TYPE.to_string()),
                    ("granularity", granularity.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let series = parse_candles(&data)?;
        debug!(symbol, timeframe = %timeframe, count = series.len(), "candles fetched");
        Ok(series)
    }
}

#[async_trait]
impl MarketLister for BitgetClient {
    async fn load_markets(&self) -> Result<Vec<Market>, ProviderError> {
        self.get_contracts().await
    }
}

#[async_trait]
impl CandleProvider for BitgetClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<CandleSeries, ProviderError> {
        self.get_candles(symbol, timeframe, limit).await
    }
}

impl std::fmt::Debug for BitgetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitgetClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// At most `max` bytes of `text`, cut back to the nearest char boundary.
fn truncate_body(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Native candle granularity for a timeframe. Timeframes Bitget does not
/// offer map to `None`.
pub fn granularity(timeframe: Timeframe) -> Option<&'static str> {
    match timeframe {
        Timeframe::M1 => Some("1m"),
        Timeframe::M3 => Some("3m"),
        Timeframe::M5 => Some("5m"),
        Timeframe::M15 => Some("15m"),
        Timeframe::M30 => Some("30m"),
        Timeframe::H1 => Some("1H"),
        Timeframe::H2 => Some("2H"),
        Timeframe::H4 => Some("4H"),
        Timeframe::H6 => Some("6H"),
        Timeframe::H12 => Some("12H"),
        Timeframe::D1 => Some("1D"),
        Timeframe::W1 => Some("1W"),
        Timeframe::M10 | Timeframe::M20 | Timeframe::H8 | Timeframe::H10 | Timeframe::H16 => None,
    }
}

/// Check the `code` of a response envelope and return its `data` payload.
fn unwrap_envelope(mut body: Value) -> Result<Value, ProviderError> {
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Malformed("response has no 'code' field".into()))?
        .to_string();

    if code != OK_CODE {
        if code == "429" {
            return Err(ProviderError::RateLimited);
        }
        let message = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ProviderError::Api { code, message });
    }

    Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
}

/// Parse the contract listing into unified markets.
pub fn parse_contracts(data: &Value) -> Result<Vec<Market>, ProviderError> {
    let raw = data
        .as_array()
        .ok_or_else(|| ProviderError::Malformed("contracts payload is not an array".into()))?;

    let mut markets = Vec::with_capacity(raw.len());
    for entry in raw {
        let field = |name: &str| entry.get(name).and_then(Value::as_str).unwrap_or_default();

        let id = field("symbol");
        let base = field("baseCoin");
        let quote = field("quoteCoin");
        if id.is_empty() || base.is_empty() || quote.is_empty() {
            warn!(entry = %entry, "skipping contract without symbol/baseCoin/quoteCoin");
            continue;
        }

        let market_type = match field("symbolType") {
            "perpetual" => SWAP_MARKET_TYPE,
            "delivery" => "future",
            other => {
                debug!(id, symbol_type = other, "unknown contract type");
                "future"
            }
        };

        let symbol = if market_type == SWAP_MARKET_TYPE {
            format!("{base}/{quote}:{quote}")
        } else {
            format!("{base}/{quote}:{quote}-{id}")
        };

        markets.push(Market {
            symbol,
            id: id.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            market_type: market_type.to_string(),
            active: field("symbolStatus") == "normal",
        });
    }

    Ok(markets)
}

/// Parse candle rows `[ts, open, high, low, close, baseVolume, quoteVolume]`.
///
/// Rows shorter than six columns are skipped; unparseable numbers fail the
/// whole payload.
pub fn parse_candles(data: &Value) -> Result<CandleSeries, ProviderError> {
    let raw = data
        .as_array()
        .ok_or_else(|| ProviderError::Malformed("candles payload is not an array".into()))?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let row = entry
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("candle row is not an array".into()))?;

        if row.len() < 6 {
            warn!("skipping malformed candle row with {} elements", row.len());
            continue;
        }

        let open_time = parse_number(&row[0], "ts")? as i64;
        let open = parse_number(&row[1], "open")?;
        let high = parse_number(&row[2], "high")?;
        let low = parse_number(&row[3], "low")?;
        let close = parse_number(&row[4], "close")?;
        let volume = parse_number(&row[5], "volume")?;

        candles.push(Candle::new(open_time, open, high, low, close, volume));
    }

    Ok(CandleSeries::from_unordered(candles))
}

/// Bitget sends numbers as JSON strings; accept plain numbers as well.
fn parse_number(val: &Value, name: &str) -> Result<f64, ProviderError> {
    let parsed = match val {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ProviderError::Malformed(format!("field {name} is not a number: {val}"))),
    }
}
