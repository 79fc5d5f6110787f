// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math used by the pattern detector.

pub mod ema;

pub use ema::{compute_ema, EmaPair};
