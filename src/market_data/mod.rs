pub mod candle;
pub mod timeframe;

// Re-exported for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, CandleSeries};
pub use timeframe::{Timeframe, UnknownTimeframe};
