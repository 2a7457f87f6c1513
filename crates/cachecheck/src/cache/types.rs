//! # Cache Types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Result of a TTL cache operation
pub type CacheResult<T> = std::result::Result<T, crate::error::CacheError>;

/// One (identifier, provider) verdict with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub identifier: String,
    pub provider: Provider,
    pub cached: bool,
    /// Unix timestamp in seconds
    pub expires_at: i64,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Raw row of the `debrid_data` table.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CacheRow {
    pub hash: String,
    pub debrid: String,
    pub cached: Option<String>,
    pub expires: Option<i64>,
}

impl CacheRow {
    /// Rows without an expiry count as expired, whatever their provider.
    pub fn is_expired_at(&self, now: i64) -> bool {
        !matches!(self.expires, Some(expires) if expires > now)
    }

    /// `None` when the row names a provider this build does not know.
    pub fn into_entry(self) -> Option<CacheEntry> {
        let provider = self.debrid.parse::<Provider>().ok()?;
        Some(CacheEntry {
            identifier: self.hash,
            provider,
            cached: self.cached.as_deref().is_some_and(parse_cached),
            expires_at: self.expires.unwrap_or(0),
        })
    }
}

/// Stored form of the cached flag.
pub(crate) fn cached_text(cached: bool) -> &'static str {
    if cached { "True" } else { "False" }
}

fn parse_cached(value: &str) -> bool {
    matches!(value, "True" | "true" | "1")
}

/// Row counts for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub live: u64,
    pub expired: u64,
}

/// Snapshot of the cache contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub live: u64,
    pub expired: u64,
    pub per_provider: BTreeMap<Provider, ProviderStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(debrid: &str, cached: Option<&str>, expires: Option<i64>) -> CacheRow {
        CacheRow {
            hash: "abc".to_string(),
            debrid: debrid.to_string(),
            cached: cached.map(str::to_string),
            expires,
        }
    }

    #[test]
    fn test_row_conversion() {
        let entry = row("rd", Some("True"), Some(100)).into_entry().unwrap();
        assert_eq!(entry.provider, Provider::RealDebrid);
        assert!(entry.cached);
        assert_eq!(entry.expires_at, 100);

        let entry = row("pm", Some("False"), None).into_entry().unwrap();
        assert!(!entry.cached);
        assert!(entry.is_expired_at(0));

        assert!(row("xx", Some("True"), Some(100)).into_entry().is_none());
    }

    #[test]
    fn test_raw_row_expiry_ignores_provider() {
        assert!(row("xx", Some("True"), Some(10)).is_expired_at(10));
        assert!(!row("xx", Some("True"), Some(11)).is_expired_at(10));
        assert!(row("rd", None, None).is_expired_at(0));
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = row("ad", Some("1"), Some(50)).into_entry().unwrap();
        assert!(entry.cached);
        assert!(!entry.is_expired_at(49));
        assert!(entry.is_expired_at(50));
    }
}
