use std::collections::BTreeMap;
use std::time::Duration;

use crate::provider::{DEFAULT_CHUNK_SIZE, Provider};

/// Configuration for a [`CacheChecker`](crate::CacheChecker) run.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Providers allowed to take part in a run
    pub enabled_providers: Vec<Provider>,

    /// Chunk size used when an adapter does not declare its own
    pub chunk_size: usize,

    /// How long a remote result stays valid in the local cache
    pub default_ttl: Duration,

    /// Per-provider TTL overrides
    pub provider_ttls: BTreeMap<Provider, Duration>,

    /// Time span the progress percentage is computed against
    pub progress_budget: Duration,

    /// Interval between progress updates
    pub poll_interval: Duration,

    /// Upper bound on progress updates per run
    pub max_progress_ticks: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            enabled_providers: Provider::ALL.to_vec(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            default_ttl: Duration::from_secs(3600), // 1 hour
            provider_ttls: BTreeMap::new(),
            progress_budget: Duration::from_secs(20),
            poll_interval: Duration::from_millis(200),
            max_progress_ticks: 200,
        }
    }
}

impl CheckerConfig {
    pub fn with_enabled_providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.enabled_providers = providers.into_iter().collect();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_provider_ttl(mut self, provider: Provider, ttl: Duration) -> Self {
        self.provider_ttls.insert(provider, ttl);
        self
    }

    pub fn with_progress_budget(mut self, budget: Duration) -> Self {
        self.progress_budget = budget;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.enabled_providers.contains(&provider)
    }

    /// TTL applied when persisting results for `provider`
    pub fn ttl_for(&self, provider: Provider) -> Duration {
        self.provider_ttls
            .get(&provider)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}
