use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::ChunkError;
use crate::provider::Provider;

/// A provider request that produced no verdicts.
///
/// Its identifiers count as not cached for this run and nothing is written
/// to the local cache for them, so a later run asks again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub provider: Provider,
    pub identifiers: Vec<String>,
    pub error: ChunkError,
}

/// Outcome of one [`CacheChecker::run`](crate::CacheChecker::run).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    /// Cached identifiers per participating provider
    pub cached: BTreeMap<Provider, BTreeSet<String>>,
    /// Identifiers resolved remotely during this run, per provider
    pub remote_checked: BTreeMap<Provider, usize>,
    #[serde(skip)]
    pub failures: Vec<ChunkFailure>,
    /// The run stopped early on request
    pub canceled: bool,
}

impl CheckReport {
    pub fn cached_for(&self, provider: Provider) -> Option<&BTreeSet<String>> {
        self.cached.get(&provider)
    }

    pub fn is_cached(&self, provider: Provider, identifier: &str) -> bool {
        self.cached
            .get(&provider)
            .is_some_and(|ids| ids.contains(identifier))
    }

    /// Providers reporting `identifier` as cached.
    pub fn providers_for(&self, identifier: &str) -> Vec<Provider> {
        self.cached
            .iter()
            .filter(|(_, ids)| ids.contains(identifier))
            .map(|(provider, _)| *provider)
            .collect()
    }

    pub fn failures_for(&self, provider: Provider) -> impl Iterator<Item = &ChunkFailure> {
        self.failures.iter().filter(move |f| f.provider == provider)
    }

    pub fn total_remote_checked(&self) -> usize {
        self.remote_checked.values().sum()
    }
}
