// =============================================================================
// Exchange Module
// =============================================================================
//
// Thin adapters around the exchange's public REST API plus the traits the
// scanner depends on.

pub mod client;
pub mod markets;
pub mod provider;
pub mod rate_limit;

pub use client::BitgetClient;
pub use markets::Market;
pub use provider::{CandleProvider, MarketLister, ProviderError};
pub use rate_limit::RequestLimiter;
