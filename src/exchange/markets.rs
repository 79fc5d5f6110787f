// =============================================================================
// Instrument listing and USDT-margined perpetual filter
// =============================================================================

use serde::{Deserialize, Serialize};

/// Marker present in the unified symbol of USDT-settled contracts,
/// e.g. `BTC/USDT:USDT`.
pub const USDT_SETTLEMENT_MARKER: &str = "/USDT:USDT";

/// Market type string of perpetual swap contracts.
pub const SWAP_MARKET_TYPE: &str = "swap";

/// One instrument as reported by the exchange listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Unified symbol, `BASE/QUOTE:SETTLE` for derivatives.
    pub symbol: String,
    /// Exchange-native id, e.g. `BTCUSDT`.
    pub id: String,
    pub base: String,
    pub quote: String,
    /// `swap`, `future` or `spot`.
    pub market_type: String,
    pub active: bool,
}

/// Unified symbols of the markets matching `settlement_marker` and
/// `market_type`, in listing order and without duplicates.
pub fn filter_symbols(markets: &[Market], settlement_marker: &str, market_type: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    markets
        .iter()
        .filter(|m| m.symbol.contains(settlement_marker) && m.market_type == market_type)
        .filter(|m| seen.insert(m.symbol.clone()))
        .map(|m| m.symbol.clone())
        .collect()
}

/// Exchange-native id for a unified symbol: `BTC/USDT:USDT` -> `BTCUSDT`.
/// Symbols already in native form pass through unchanged.
pub fn native_id(symbol: &str) -> String {
    let pair = symbol.split(':').next().unwrap_or(symbol);
    pair.replace('/', "")
}
