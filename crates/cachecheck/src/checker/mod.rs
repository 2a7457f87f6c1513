//! # Cache-Check Orchestrator
//!
//! Resolves which identifiers each enabled provider already hosts.
//!
//! A run first consults the local [`TtlCache`]; only identifiers a provider
//! has no live verdict for are sent to that provider, split into chunks that
//! are checked concurrently. Every chunk runs in its own task and a failing
//! chunk only loses its own identifiers: they are reported as not cached and
//! left out of the local cache so the next run asks again.
//!
//! While provider tasks are in flight the run feeds a [`ProgressSink`].
//! Cancelling through the sink makes the run return right away with what the
//! local cache already knew. The provider tasks are not aborted; they finish
//! on their own and their results are dropped without being persisted.

mod report;

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

pub use report::{CheckReport, ChunkFailure};

use crate::cache::TtlCache;
use crate::config::CheckerConfig;
use crate::error::ChunkError;
use crate::progress::ProgressSink;
use crate::provider::{CacheCheckProvider, Provider};
use crate::utils::{chunk_identifiers, dedup_identifiers};

/// Everything one provider task learned.
#[derive(Debug)]
struct ProviderOutcome {
    provider: Provider,
    checked: Vec<(String, bool)>,
    failures: Vec<ChunkFailure>,
}

/// What the local cache already knows for one provider.
#[derive(Debug, Default)]
struct KnownState {
    cached: BTreeSet<String>,
    resolved: HashSet<String>,
}

/// Multi-provider cache checker.
pub struct CacheChecker {
    config: Arc<CheckerConfig>,
    cache: TtlCache,
    providers: BTreeMap<Provider, Arc<dyn CacheCheckProvider>>,
}

impl CacheChecker {
    pub fn new(config: CheckerConfig, cache: TtlCache) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            providers: BTreeMap::new(),
        }
    }

    /// Register an adapter. A later adapter for the same provider replaces
    /// the earlier one.
    pub fn with_provider(mut self, adapter: Arc<dyn CacheCheckProvider>) -> Self {
        self.register(adapter);
        self
    }

    pub fn register(&mut self, adapter: Arc<dyn CacheCheckProvider>) {
        let provider = adapter.provider();
        if self.providers.insert(provider, adapter).is_some() {
            debug!(provider = %provider, "Replaced provider adapter");
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Providers that are both enabled and backed by an adapter.
    pub fn active_providers(&self) -> Vec<Provider> {
        self.providers
            .keys()
            .copied()
            .filter(|p| self.config.is_enabled(*p))
            .collect()
    }

    /// Check `identifiers` against every active provider.
    ///
    /// Never fails: local cache errors degrade to cache misses and provider
    /// errors to "not cached", both recorded in the report or the log.
    pub async fn run<I, S>(&self, identifiers: I, progress: &dyn ProgressSink) -> CheckReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identifiers = dedup_identifiers(identifiers);
        let providers = self.active_providers();
        let mut report = CheckReport::default();
        if providers.is_empty() || identifiers.is_empty() {
            for provider in providers {
                report.cached.insert(provider, BTreeSet::new());
            }
            return report;
        }

        let mut known = self.query_local_cache(&identifiers, &providers).await;

        let mut tasks: Vec<(Provider, JoinHandle<ProviderOutcome>)> = Vec::new();
        for provider in &providers {
            let state = known.entry(*provider).or_default();
            report.cached.insert(*provider, state.cached.clone());

            let unknown: Vec<String> = identifiers
                .iter()
                .filter(|id| !state.resolved.contains(*id))
                .cloned()
                .collect();
            if unknown.is_empty() {
                debug!(provider = %provider, "All identifiers resolved from local cache");
                continue;
            }

            let adapter = Arc::clone(&self.providers[provider]);
            let chunk_size = adapter.chunking().resolve(self.config.chunk_size);
            let chunks = chunk_identifiers(&unknown, chunk_size);
            debug!(
                provider = %provider,
                unknown = unknown.len(),
                chunks = chunks.len(),
                "Starting remote cache check"
            );
            tasks.push((
                *provider,
                tokio::spawn(check_provider(*provider, adapter, chunks)),
            ));
        }

        if tasks.is_empty() {
            return report;
        }

        if self.watch_progress(&tasks, progress).await {
            info!(
                pending = tasks.iter().filter(|(_, h)| !h.is_finished()).count(),
                "Debrid check canceled, abandoning in-flight provider checks"
            );
            report.canceled = true;
            return report;
        }

        for (provider, handle) in tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Provider check task failed");
                    report.failures.push(ChunkFailure {
                        provider,
                        identifiers: Vec::new(),
                        error: ChunkError::TaskAborted(provider, e.to_string()),
                    });
                    continue;
                }
            };
            self.merge_outcome(outcome, &mut report).await;
        }

        report
    }

    async fn query_local_cache(
        &self,
        identifiers: &[String],
        providers: &[Provider],
    ) -> HashMap<Provider, KnownState> {
        let entries = match self.cache.get_all(identifiers).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Local debrid cache unavailable, treating as empty");
                Vec::new()
            }
        };

        let mut known: HashMap<Provider, KnownState> = HashMap::new();
        for entry in entries {
            if !providers.contains(&entry.provider) {
                continue;
            }
            let state = known.entry(entry.provider).or_default();
            if entry.cached {
                state.cached.insert(entry.identifier.clone());
            }
            state.resolved.insert(entry.identifier);
        }
        known
    }

    async fn merge_outcome(&self, outcome: ProviderOutcome, report: &mut CheckReport) {
        let ProviderOutcome {
            provider,
            checked,
            failures,
        } = outcome;

        report.remote_checked.insert(provider, checked.len());
        report.failures.extend(failures);

        if checked.is_empty() {
            return;
        }

        let cached = report.cached.entry(provider).or_default();
        cached.extend(
            checked
                .iter()
                .filter(|(_, is_cached)| *is_cached)
                .map(|(id, _)| id.clone()),
        );

        if let Err(e) = self
            .cache
            .set_many(&checked, provider, self.config.ttl_for(provider))
            .await
        {
            warn!(provider = %provider, error = %e, "Failed to store debrid results in local cache");
        }
    }

    /// Report progress until every task is done. Returns `true` if canceled.
    async fn watch_progress(
        &self,
        tasks: &[(Provider, JoinHandle<ProviderOutcome>)],
        progress: &dyn ProgressSink,
    ) -> bool {
        let start = Instant::now();
        for _ in 0..self.config.max_progress_ticks {
            let remaining: Vec<String> = tasks
                .iter()
                .filter(|(_, handle)| !handle.is_finished())
                .map(|(provider, _)| provider.display_name().to_uppercase())
                .collect();
            if remaining.is_empty() {
                report_progress(progress, 100, "Debrid checks complete");
                return false;
            }
            if progress_canceled(progress) {
                return true;
            }

            let percent = progress_percent(start.elapsed(), self.config.progress_budget);
            report_progress(
                progress,
                percent,
                &format!("Remaining Debrid Checks: {}", remaining.join(", ")),
            );
            tokio::time::sleep(self.config.poll_interval).await;
        }
        progress_canceled(progress)
    }
}

/// Forward an update, swallowing a panicking sink.
fn report_progress(progress: &dyn ProgressSink, percent: u8, message: &str) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| progress.update(percent, message)));
    if let Err(payload) = result {
        warn!(error = %panic_message(payload.as_ref()), "Progress sink panicked on update");
    }
}

/// A panicking sink counts as not canceled.
fn progress_canceled(progress: &dyn ProgressSink) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| progress.is_canceled())).unwrap_or_else(|payload| {
        warn!(error = %panic_message(payload.as_ref()), "Progress sink panicked on cancel check");
        false
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

async fn check_provider(
    provider: Provider,
    adapter: Arc<dyn CacheCheckProvider>,
    chunks: Vec<Vec<String>>,
) -> ProviderOutcome {
    let mut set = JoinSet::new();
    for chunk in chunks {
        let adapter = Arc::clone(&adapter);
        set.spawn(async move {
            let result = AssertUnwindSafe(adapter.check(&chunk))
                .catch_unwind()
                .await
                .map_err(|payload| {
                    ChunkError::TaskAborted(provider, panic_message(payload.as_ref()))
                })
                .and_then(|response| response.map_err(ChunkError::from));
            (chunk, result)
        });
    }

    let mut outcome = ProviderOutcome {
        provider,
        checked: Vec::new(),
        failures: Vec::new(),
    };
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((chunk, Ok(response))) => {
                outcome.checked.extend(normalize_response(&chunk, response));
            }
            Ok((chunk, Err(error))) => {
                warn!(
                    provider = %provider,
                    identifiers = chunk.len(),
                    error = %error,
                    "Debrid cache check failed for chunk"
                );
                outcome.failures.push(ChunkFailure {
                    provider,
                    identifiers: chunk,
                    error,
                });
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "Debrid chunk task did not complete");
                outcome.failures.push(ChunkFailure {
                    provider,
                    identifiers: Vec::new(),
                    error: ChunkError::TaskAborted(provider, e.to_string()),
                });
            }
        }
    }
    outcome
}

/// Verdicts for exactly the identifiers of `chunk`, in chunk order.
fn normalize_response(chunk: &[String], response: Vec<(String, bool)>) -> Vec<(String, bool)> {
    let mut reported: HashMap<String, bool> = HashMap::with_capacity(response.len());
    for (id, cached) in response {
        *reported.entry(id).or_default() |= cached;
    }

    let verdicts: Vec<(String, bool)> = chunk
        .iter()
        .map(|id| (id.clone(), reported.remove(id).unwrap_or(false)))
        .collect();
    if !reported.is_empty() {
        debug!(
            extra = reported.len(),
            "Ignoring verdicts for identifiers that were not requested"
        );
    }
    verdicts
}

fn progress_percent(elapsed: Duration, budget: Duration) -> u8 {
    if budget.is_zero() {
        return 100;
    }
    let ratio = elapsed.as_secs_f64() / budget.as_secs_f64();
    (ratio * 100.0).clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::progress::NoProgress;
    use crate::provider::Chunking;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[inline]
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    enum Behavior {
        Answer,
        Fail,
        FailChunkContaining(String),
        Panic,
    }

    struct FakeProvider {
        provider: Provider,
        cached: HashSet<String>,
        chunking: Chunking,
        behavior: Behavior,
        delay: Duration,
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new<I, S>(provider: Provider, cached: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                provider,
                cached: cached.into_iter().map(Into::into).collect(),
                chunking: Chunking::Default,
                behavior: Behavior::Answer,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn behaving(mut self, behavior: Behavior) -> Self {
            self.behavior = behavior;
            self
        }

        fn chunked(mut self, chunking: Chunking) -> Self {
            self.chunking = chunking;
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().clone()
        }
    }

    #[async_trait]
    impl CacheCheckProvider for FakeProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn chunking(&self) -> Chunking {
            self.chunking
        }

        async fn check(
            &self,
            identifiers: &[String],
        ) -> Result<Vec<(String, bool)>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().extend(identifiers.iter().cloned());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match &self.behavior {
                Behavior::Fail => Err(ProviderError::Status(503)),
                Behavior::FailChunkContaining(id) if identifiers.contains(id) => {
                    Err(ProviderError::malformed("unexpected payload"))
                }
                Behavior::Panic => panic!("adapter exploded"),
                _ => Ok(identifiers
                    .iter()
                    .map(|id| (id.clone(), self.cached.contains(id)))
                    .collect()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<(u8, String)>>,
        canceled: AtomicBool,
    }

    impl ProgressSink for RecordingSink {
        fn update(&self, percent: u8, message: &str) {
            self.updates.lock().push((percent, message.to_string()));
        }

        fn is_canceled(&self) -> bool {
            self.canceled.load(Ordering::SeqCst)
        }
    }

    async fn open_temp() -> (TempDir, TtlCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtlCache::open(dir.path().join("debridcache.db"))
            .await
            .unwrap();
        (dir, cache)
    }

    fn fast_config() -> CheckerConfig {
        CheckerConfig::default().with_poll_interval(Duration::from_millis(5))
    }

    fn set_of(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_provider_result_is_cached_for_next_run() {
        init_tracing();
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]));
        let checker = CacheChecker::new(
            fast_config().with_enabled_providers([Provider::RealDebrid]),
            cache,
        )
        .with_provider(rd.clone());

        let first = checker.run(["abc", "def", "ghi"], &NoProgress).await;
        assert_eq!(
            first.cached,
            BTreeMap::from([(Provider::RealDebrid, set_of(&["abc"]))])
        );
        assert_eq!(rd.calls(), 1);
        assert_eq!(first.total_remote_checked(), 3);
        assert!(first.failures.is_empty());

        let second = checker.run(["abc", "def", "ghi"], &NoProgress).await;
        assert_eq!(second.cached, first.cached);
        assert_eq!(rd.calls(), 1);
        assert_eq!(second.total_remote_checked(), 0);
    }

    #[tokio::test]
    async fn test_live_cache_entries_skip_remote_check() {
        let (_dir, cache) = open_temp().await;
        cache
            .set_many(
                &[("abc".to_string(), true), ("def".to_string(), false)],
                Provider::RealDebrid,
                Duration::from_secs(600),
            )
            .await
            .unwrap();

        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["def", "ghi"]));
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd.clone());

        let report = checker.run(["abc", "def", "ghi"], &NoProgress).await;
        assert_eq!(rd.requested(), strings(&["ghi"]));
        // "def" keeps its cached verdict of false even though the adapter would now say true
        assert_eq!(report.cached_for(Provider::RealDebrid), Some(&set_of(&["abc", "ghi"])));
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_and_rechecked_once() {
        let (_dir, cache) = open_temp().await;
        cache
            .set_many_until(
                &[("abc".to_string(), true)],
                Provider::AllDebrid,
                crate::utils::unix_now() - 5,
            )
            .await
            .unwrap();

        let ad = Arc::new(FakeProvider::new(Provider::AllDebrid, Vec::<String>::new()));
        let checker = CacheChecker::new(fast_config(), cache.clone()).with_provider(ad.clone());

        let report = checker.run(["abc"], &NoProgress).await;
        assert_eq!(ad.calls(), 1);
        assert_eq!(ad.requested(), strings(&["abc"]));
        assert!(!report.is_cached(Provider::AllDebrid, "abc"));

        let entries = cache.get_all(&strings(&["abc"])).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].cached);
        assert!(entries[0].expires_at > crate::utils::unix_now());
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_affect_others() {
        init_tracing();
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]));
        let ad = Arc::new(
            FakeProvider::new(Provider::AllDebrid, ["abc", "def"]).behaving(Behavior::Fail),
        );
        let checker = CacheChecker::new(fast_config(), cache.clone())
            .with_provider(rd.clone())
            .with_provider(ad.clone());

        let report = checker.run(["abc", "def"], &NoProgress).await;
        assert_eq!(report.cached_for(Provider::RealDebrid), Some(&set_of(&["abc"])));
        assert_eq!(report.cached_for(Provider::AllDebrid), Some(&BTreeSet::new()));

        let failures: Vec<_> = report.failures_for(Provider::AllDebrid).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].identifiers, strings(&["abc", "def"]));
        assert_eq!(
            failures[0].error,
            ChunkError::Provider(ProviderError::Status(503))
        );
        assert_eq!(report.failures_for(Provider::RealDebrid).count(), 0);

        let stats = cache.stats().await.unwrap();
        assert!(stats.per_provider.contains_key(&Provider::RealDebrid));
        assert!(!stats.per_provider.contains_key(&Provider::AllDebrid));

        // Nothing was stored for the failed provider, so the next run asks again
        checker.run(["abc", "def"], &NoProgress).await;
        assert_eq!(ad.calls(), 2);
        assert_eq!(rd.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_only_loses_its_own_identifiers() {
        let (_dir, cache) = open_temp().await;
        let ids: Vec<String> = (0..250).map(|i| format!("hash{i:03}")).collect();
        let even: Vec<String> = ids.iter().step_by(2).cloned().collect();

        let rd = Arc::new(
            FakeProvider::new(Provider::RealDebrid, even)
                .behaving(Behavior::FailChunkContaining("hash150".to_string())),
        );
        let checker = CacheChecker::new(fast_config(), cache.clone()).with_provider(rd.clone());

        let report = checker.run(ids.clone(), &NoProgress).await;
        assert_eq!(rd.calls(), 3);
        assert_eq!(report.remote_checked[&Provider::RealDebrid], 150);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].identifiers, ids[100..200].to_vec());

        let cached = report.cached_for(Provider::RealDebrid).unwrap();
        assert_eq!(cached.len(), 75);
        assert!(cached.contains("hash000"));
        assert!(!cached.contains("hash150"));
        assert!(cached.contains("hash248"));

        assert_eq!(cache.stats().await.unwrap().total, 150);
    }

    #[tokio::test]
    async fn test_chunking_follows_adapter_preference() {
        let (_dir, cache) = open_temp().await;
        let ids: Vec<String> = (0..250).map(|i| format!("id{i}")).collect();

        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, Vec::<String>::new()));
        let ad = Arc::new(
            FakeProvider::new(Provider::AllDebrid, Vec::<String>::new())
                .chunked(Chunking::Size(100)),
        );
        let pm = Arc::new(
            FakeProvider::new(Provider::Premiumize, Vec::<String>::new()).chunked(Chunking::Whole),
        );
        let checker = CacheChecker::new(fast_config().with_chunk_size(50), cache)
            .with_provider(rd.clone())
            .with_provider(ad.clone())
            .with_provider(pm.clone());

        checker.run(ids, &NoProgress).await;
        assert_eq!(rd.calls(), 5);
        assert_eq!(ad.calls(), 3);
        assert_eq!(pm.calls(), 1);
        assert_eq!(pm.requested().len(), 250);
    }

    #[tokio::test]
    async fn test_panicking_adapter_becomes_failure() {
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]).behaving(Behavior::Panic));
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd);

        let report = checker.run(["abc"], &NoProgress).await;
        assert_eq!(report.cached_for(Provider::RealDebrid), Some(&BTreeSet::new()));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].error,
            ChunkError::TaskAborted(Provider::RealDebrid, "adapter exploded".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancel_returns_known_results_without_waiting() {
        let (_dir, cache) = open_temp().await;
        cache
            .set_many(
                &[("abc".to_string(), true)],
                Provider::AllDebrid,
                Duration::from_secs(600),
            )
            .await
            .unwrap();

        let ad = Arc::new(
            FakeProvider::new(Provider::AllDebrid, ["def"]).delayed(Duration::from_secs(5)),
        );
        let checker = CacheChecker::new(fast_config(), cache.clone()).with_provider(ad);
        let sink = RecordingSink::default();
        sink.canceled.store(true, Ordering::SeqCst);

        let started = Instant::now();
        let report = checker.run(["abc", "def"], &sink).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(report.canceled);
        assert_eq!(report.cached_for(Provider::AllDebrid), Some(&set_of(&["abc"])));
        assert_eq!(report.total_remote_checked(), 0);
        assert!(cache.get_all(&strings(&["def"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_lists_remaining_providers() {
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(
            FakeProvider::new(Provider::RealDebrid, ["abc"]).delayed(Duration::from_millis(100)),
        );
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd);
        let sink = RecordingSink::default();

        let report = checker.run(["abc"], &sink).await;
        assert!(!report.canceled);
        assert!(report.is_cached(Provider::RealDebrid, "abc"));

        let updates = sink.updates.lock().clone();
        assert!(updates.len() >= 2);
        assert!(
            updates
                .iter()
                .any(|(_, msg)| msg == "Remaining Debrid Checks: REAL-DEBRID")
        );
        assert_eq!(
            updates.last().unwrap(),
            &(100, "Debrid checks complete".to_string())
        );
        assert!(updates.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn test_disabled_provider_is_not_queried() {
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]));
        let pm = Arc::new(FakeProvider::new(Provider::Premiumize, ["abc"]));
        let checker = CacheChecker::new(
            fast_config().with_enabled_providers([Provider::RealDebrid]),
            cache,
        )
        .with_provider(rd)
        .with_provider(pm.clone());

        assert_eq!(checker.active_providers(), vec![Provider::RealDebrid]);
        let report = checker.run(["abc"], &NoProgress).await;
        assert_eq!(pm.calls(), 0);
        assert_eq!(
            report.cached.keys().copied().collect::<Vec<_>>(),
            vec![Provider::RealDebrid]
        );
    }

    #[tokio::test]
    async fn test_unavailable_cache_degrades_to_remote_checks() {
        init_tracing();
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]));
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd.clone());
        checker.cache().close().await;

        let report = checker.run(["abc", "def"], &NoProgress).await;
        assert_eq!(rd.calls(), 1);
        assert_eq!(report.cached_for(Provider::RealDebrid), Some(&set_of(&["abc"])));
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_are_checked_once() {
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]));
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd.clone());

        checker.run(["abc", "abc", "def"], &NoProgress).await;
        assert_eq!(rd.requested(), strings(&["abc", "def"]));
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty_sets() {
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(FakeProvider::new(Provider::RealDebrid, ["abc"]));
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd.clone());

        let report = checker.run(Vec::<String>::new(), &NoProgress).await;
        assert_eq!(report.cached_for(Provider::RealDebrid), Some(&BTreeSet::new()));
        assert_eq!(rd.calls(), 0);
    }

    struct PanickingSink;

    impl ProgressSink for PanickingSink {
        fn update(&self, _percent: u8, _message: &str) {
            panic!("sink update failed");
        }

        fn is_canceled(&self) -> bool {
            panic!("sink cancel check failed");
        }
    }

    #[tokio::test]
    async fn test_panicking_progress_sink_does_not_abort_run() {
        let (_dir, cache) = open_temp().await;
        let rd = Arc::new(
            FakeProvider::new(Provider::RealDebrid, ["abc"]).delayed(Duration::from_millis(30)),
        );
        let checker = CacheChecker::new(fast_config(), cache).with_provider(rd.clone());

        let report = checker.run(["abc", "def"], &PanickingSink).await;
        assert!(!report.canceled);
        assert_eq!(rd.calls(), 1);
        assert_eq!(report.cached_for(Provider::RealDebrid), Some(&set_of(&["abc"])));
    }

    #[test]
    fn test_normalize_response() {
        let chunk = strings(&["a", "b", "c"]);
        let response = vec![
            ("a".to_string(), true),
            ("zzz".to_string(), true),
            ("b".to_string(), false),
            ("b".to_string(), true),
        ];
        assert_eq!(
            normalize_response(&chunk, response),
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("c".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_progress_percent() {
        let budget = Duration::from_secs(20);
        assert_eq!(progress_percent(Duration::ZERO, budget), 0);
        assert_eq!(progress_percent(Duration::from_secs(10), budget), 50);
        assert_eq!(progress_percent(Duration::from_secs(30), budget), 100);
        assert_eq!(progress_percent(Duration::from_secs(1), Duration::ZERO), 100);
    }
}
