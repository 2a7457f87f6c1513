//! # TTL Cache
//!
//! Local persistent record of which identifiers each provider has (or has
//! not) cached, so repeated lookups within the validity window never reach
//! the network.

mod store;
mod types;

pub use store::TtlCache;
pub use types::{CacheEntry, CacheResult, CacheStats, ProviderStats};
