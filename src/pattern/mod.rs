// =============================================================================
// Price-Action Pattern Module
// =============================================================================
//
// Stateless classifiers evaluated over a candle series and its indicators.

pub mod cradle;

pub use cradle::{detect_cradle, detect_in_series};
