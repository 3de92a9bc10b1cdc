// Freshness cache - stale-while-revalidate over upstream fetches
use crate::application::clock::Clock;
use crate::application::coalescer::{Flight, RequestCoalescer};
use crate::application::upstream::{ErrorKind, UpstreamError};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Timing policy for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Values younger than this are served without touching upstream.
    pub fresh_window: Duration,
    /// Values younger than this are served while a background refresh runs.
    pub stale_window: Duration,
    /// How long a key refuses synchronous fetches after a rate limit, or after a failure
    /// that left nothing to serve.
    pub rate_limit_cooldown: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_window: Duration::from_millis(1_500),
            stale_window: Duration::from_secs(5 * 60),
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}

impl CachePolicy {
    /// Once fetched, a value stays fresh for the life of the process.
    pub fn pinned() -> Self {
        Self {
            fresh_window: Duration::MAX,
            stale_window: Duration::MAX,
            ..Self::default()
        }
    }
}

/// What a lookup should do right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    Fresh(T),
    /// Serve the value and revalidate in the background.
    Stale(T),
    /// No usable value; fetch before answering.
    MustFetch,
    /// No usable value and the key is cooling down after a failed fetch.
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("rate limited; upstream requests are paused")]
    RateLimited,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

struct CacheEntry<T> {
    value: Option<T>,
    fetched_at: Option<Instant>,
    last_error: Option<ErrorKind>,
    /// Start of the window in which synchronous fetches are refused.
    cooldown_from: Option<Instant>,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            value: None,
            fetched_at: None,
            last_error: None,
            cooldown_from: None,
        }
    }
}

/// Per-key cache of the last good upstream value.
///
/// The cache is the only writer of its entries. Every upstream fetch goes through a
/// [`RequestCoalescer`], so at most one fetch per key is in flight and its outcome is
/// recorded exactly once.
pub struct FreshnessCache<K, T> {
    name: &'static str,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, CacheEntry<T>>>,
    coalescer: RequestCoalescer<K, T, UpstreamError>,
}

impl<K, T> FreshnessCache<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            policy,
            clock,
            entries: RwLock::new(HashMap::new()),
            coalescer: RequestCoalescer::new(),
        }
    }

    pub fn decide(&self, key: &K) -> Decision<T> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(key) else {
            return Decision::MustFetch;
        };

        if let (Some(value), Some(fetched_at)) = (&entry.value, entry.fetched_at) {
            let age = now.saturating_duration_since(fetched_at);
            if age < self.policy.fresh_window {
                return Decision::Fresh(value.clone());
            }
            if age < self.policy.stale_window {
                return Decision::Stale(value.clone());
            }
        }

        if self.cooling_down(entry, now) {
            Decision::RateLimited
        } else {
            Decision::MustFetch
        }
    }

    /// Serve `key` from cache, fetching with `fetch` when needed.
    pub async fn get_or_fetch<F, Fut>(self: &Arc<Self>, key: K, fetch: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        match self.decide(&key) {
            Decision::Fresh(value) => Ok(value),
            Decision::Stale(value) => {
                tracing::debug!(cache = self.name, key = ?key, "serving stale value, revalidating");
                // Outcome is recorded by the flight itself; the handle is not needed.
                drop(self.start_fetch(key, fetch));
                Ok(value)
            }
            Decision::RateLimited => {
                tracing::debug!(cache = self.name, key = ?key, "skipping fetch during rate limit cooldown");
                Err(FetchError::RateLimited)
            }
            Decision::MustFetch => self.refresh(key, fetch).await,
        }
    }

    /// Fetch synchronously regardless of freshness, unless the key is cooling down.
    ///
    /// On failure a value still inside the stale window is returned instead of the error.
    pub async fn refresh<F, Fut>(self: &Arc<Self>, key: K, fetch: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        if self.is_cooling_down(&key) {
            tracing::debug!(cache = self.name, key = ?key, "refresh skipped during rate limit cooldown");
            return self.stale_value(&key).ok_or(FetchError::RateLimited);
        }

        match self.start_fetch(key.clone(), fetch).await {
            Ok(value) => Ok(value),
            Err(err) => match self.stale_value(&key) {
                Some(value) => {
                    tracing::warn!(cache = self.name, key = ?key, error = %err, "fetch failed, serving stale value");
                    Ok(value)
                }
                None => Err(FetchError::Upstream(err)),
            },
        }
    }

    pub fn is_refreshing(&self, key: &K) -> bool {
        self.coalescer.is_in_flight(key)
    }

    pub fn last_error(&self, key: &K) -> Option<ErrorKind> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|entry| entry.last_error)
    }

    fn start_fetch<F, Fut>(self: &Arc<Self>, key: K, fetch: F) -> Flight<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        let cache = Arc::clone(self);
        let entry_key = key.clone();
        self.coalescer.join(key, move || {
            let started = cache.clock.now();
            let pending = fetch();
            async move {
                let outcome = pending.await;
                cache.record(entry_key, &outcome, started);
                outcome
            }
        })
    }

    fn record(&self, key: K, outcome: &Result<T, UpstreamError>, started: Instant) {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key.clone()).or_default();
        match outcome {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.fetched_at = Some(started);
                entry.last_error = None;
                entry.cooldown_from = None;
            }
            Err(err) => {
                tracing::warn!(cache = self.name, key = ?key, error = %err, "upstream fetch failed");
                entry.last_error = Some(err.kind());
                // Without a servable value the next caller would go straight back upstream.
                if err.kind() == ErrorKind::RateLimited || self.usable_value(entry, now).is_none() {
                    entry.cooldown_from = Some(now);
                }
            }
        }
    }

    fn is_cooling_down(&self, key: &K) -> bool {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).is_some_and(|entry| self.cooling_down(entry, now))
    }

    fn cooling_down(&self, entry: &CacheEntry<T>, now: Instant) -> bool {
        entry
            .cooldown_from
            .is_some_and(|at| now.saturating_duration_since(at) < self.policy.rate_limit_cooldown)
    }

    fn stale_value(&self, key: &K) -> Option<T> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        self.usable_value(entries.get(key)?, now).cloned()
    }

    fn usable_value<'a>(&self, entry: &'a CacheEntry<T>, now: Instant) -> Option<&'a T> {
        let fetched_at = entry.fetched_at?;
        if now.saturating_duration_since(fetched_at) < self.policy.stale_window {
            entry.value.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use futures::future::{Ready, ready};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestCache = FreshnessCache<&'static str, u32>;

    const KEY: &str = "monitors";

    fn setup(policy: CachePolicy) -> (Arc<TestCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(FreshnessCache::new("test", policy, clock.clone()));
        (cache, clock)
    }

    fn fetch(
        calls: Arc<AtomicUsize>,
        outcome: Result<u32, UpstreamError>,
    ) -> impl FnOnce() -> Ready<Result<u32, UpstreamError>> {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(outcome)
        }
    }

    fn server_error() -> UpstreamError {
        UpstreamError::Http {
            status: 500,
            body: "internal".to_string(),
        }
    }

    async fn wait_idle(cache: &TestCache) {
        for _ in 0..1_000 {
            if !cache.is_refreshing(&KEY) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("background refresh never finished");
    }

    #[tokio::test]
    async fn test_fresh_value_skips_upstream() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await, Ok(1));
        clock.advance(Duration::from_millis(1_000));
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(2))).await, Ok(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_value_served_with_one_background_refresh() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(2))).await, Ok(1));
        assert!(cache.is_refreshing(&KEY));

        wait_idle(&cache).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.decide(&KEY), Decision::Fresh(2));
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_share_one_refresh() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(10));
        for _ in 0..3 {
            assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(2))).await, Ok(1));
        }
        wait_idle(&cache).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_value_is_fetched_synchronously() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(301));
        assert_eq!(cache.decide(&KEY), Decision::MustFetch);
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(2))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_without_value_propagates() {
        let (cache, _clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache.get_or_fetch(KEY, fetch(calls.clone(), Err(server_error()))).await;
        assert_eq!(result, Err(FetchError::Upstream(server_error())));
        assert_eq!(cache.last_error(&KEY), Some(ErrorKind::Http));
    }

    #[tokio::test]
    async fn test_success_clears_last_error() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let _ = cache.get_or_fetch(KEY, fetch(calls.clone(), Err(server_error()))).await;
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(3))).await, Ok(3));
        assert_eq!(cache.last_error(&KEY), None);
    }

    #[tokio::test]
    async fn test_forced_refresh_falls_back_to_stale_value() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(120));
        assert_eq!(cache.refresh(KEY, fetch(calls.clone(), Err(server_error()))).await, Ok(1));
        assert_eq!(cache.last_error(&KEY), Some(ErrorKind::Http));
    }

    #[tokio::test]
    async fn test_failed_background_refresh_keeps_old_value() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Err(server_error()))).await, Ok(1));
        wait_idle(&cache).await;

        assert_eq!(cache.decide(&KEY), Decision::Stale(1));
    }

    #[tokio::test]
    async fn test_rate_limit_guard_blocks_synchronous_fetch_until_cooldown() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let too_many = UpstreamError::Http {
            status: 429,
            body: "slow down".to_string(),
        };

        let first = cache.get_or_fetch(KEY, fetch(calls.clone(), Err(too_many.clone()))).await;
        assert_eq!(first, Err(FetchError::Upstream(too_many)));

        clock.advance(Duration::from_secs(30));
        let second = cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await;
        assert_eq!(second, Err(FetchError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(31));
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_with_nothing_to_serve_cools_down() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get_or_fetch(KEY, fetch(calls.clone(), Err(server_error()))).await;
        assert_eq!(first, Err(FetchError::Upstream(server_error())));
        for _ in 0..4 {
            let again = cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await;
            assert_eq!(again, Err(FetchError::RateLimited));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.last_error(&KEY), Some(ErrorKind::Http));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.decide(&KEY), Decision::RateLimited);
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_with_stale_value_does_not_cool_down() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(120));
        assert_eq!(cache.refresh(KEY, fetch(calls.clone(), Err(server_error()))).await, Ok(1));
        assert_eq!(cache.refresh(KEY, fetch(calls.clone(), Ok(2))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_forced_refresh_respects_cooldown() {
        let (cache, clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();
        let too_many = UpstreamError::Http {
            status: 429,
            body: "slow down".to_string(),
        };

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.refresh(KEY, fetch(calls.clone(), Err(too_many.clone()))).await, Ok(1));
        assert_eq!(cache.refresh(KEY, fetch(calls.clone(), Ok(2))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        clock.advance(Duration::from_secs(300));
        assert_eq!(
            cache.refresh(KEY, fetch(calls.clone(), Err(too_many.clone()))).await,
            Err(FetchError::Upstream(too_many))
        );
        assert_eq!(
            cache.refresh(KEY, fetch(calls.clone(), Ok(3))).await,
            Err(FetchError::RateLimited)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.refresh(KEY, fetch(calls.clone(), Ok(3))).await, Ok(3));
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let (cache, _clock) = setup(CachePolicy::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..5).map(|_| cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(9))));
        let results = futures::future::join_all(callers).await;

        assert!(results.iter().all(|r| *r == Ok(9)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pinned_policy_never_expires() {
        let (cache, clock) = setup(CachePolicy::pinned());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch(KEY, fetch(calls.clone(), Ok(1))).await.unwrap();

        clock.advance(Duration::from_secs(30 * 24 * 3600));
        assert_eq!(cache.decide(&KEY), Decision::Fresh(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
