//! # Providers
//!
//! Debrid services that can be asked whether they already host a given
//! identifier, and the adapter trait the checker talks to.
//!
//! Adapters own everything provider-specific (authentication and
//! response parsing). The checker only ever sees uniform
//! `(identifier, cached)` pairs.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Default number of identifiers sent to a provider in one request.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// A debrid service queried for cached content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Provider {
    #[serde(rename = "rd")]
    RealDebrid,
    #[serde(rename = "ad")]
    AllDebrid,
    #[serde(rename = "pm")]
    Premiumize,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Self::RealDebrid, Self::AllDebrid, Self::Premiumize];

    /// Short code used as the storage key.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RealDebrid => "rd",
            Self::AllDebrid => "ad",
            Self::Premiumize => "pm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RealDebrid => "Real-Debrid",
            Self::AllDebrid => "AllDebrid",
            Self::Premiumize => "Premiumize.me",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rd" | "realdebrid" | "real-debrid" => Ok(Self::RealDebrid),
            "ad" | "alldebrid" => Ok(Self::AllDebrid),
            "pm" | "premiumize" | "premiumize.me" => Ok(Self::Premiumize),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// How an adapter wants its identifiers batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Chunking {
    /// Use the checker's configured chunk size
    #[default]
    Default,
    /// At most this many identifiers per request
    Size(usize),
    /// Everything in a single request
    Whole,
}

impl Chunking {
    /// Effective chunk size, `None` meaning a single request.
    pub fn resolve(self, default: usize) -> Option<usize> {
        match self {
            Self::Default => Some(default.max(1)),
            Self::Size(size) => Some(size.max(1)),
            Self::Whole => None,
        }
    }
}

/// Remote "is this identifier cached" capability of one provider.
#[async_trait]
pub trait CacheCheckProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> Provider;

    fn chunking(&self) -> Chunking {
        Chunking::Default
    }

    /// Check a batch of identifiers.
    ///
    /// Identifiers absent from the returned list are treated as not cached.
    async fn check(&self, identifiers: &[String]) -> Result<Vec<(String, bool)>, ProviderError>;
}
