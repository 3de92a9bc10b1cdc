// Request coalescing - one in-flight producer per key
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinError;

/// Awaitable handle on an in-flight producer. Every clone resolves to the same outcome.
pub type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    id: u64,
    flight: Flight<T, E>,
}

type Registry<K, T, E> = Arc<Mutex<HashMap<K, InFlight<T, E>>>>;

/// Merges concurrent requests for the same key into a single producer execution.
///
/// Producers run on their own task, so a caller giving up does not cancel work other
/// waiters still need. The key is released as soon as the producer finishes; results
/// are not memoized here.
pub struct RequestCoalescer<K, T, E> {
    in_flight: Registry<K, T, E>,
    next_id: AtomicU64,
}

impl<K, T, E> RequestCoalescer<K, T, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `producer` for `key` unless a run is already in flight, then await the shared outcome.
    pub async fn coalesce<F, Fut>(&self, key: K, producer: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.join(key, producer).await
    }

    /// Like [`coalesce`](Self::coalesce) but returns the handle without awaiting it.
    ///
    /// `producer` is called while the registry is locked and must not touch this coalescer.
    pub fn join<F, Fut>(&self, key: K, producer: F) -> Flight<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = in_flight.get(&key) {
            return existing.flight.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let release = Release {
            registry: Arc::clone(&self.in_flight),
            key: key.clone(),
            id,
        };
        let pending = producer();
        let handle = tokio::spawn(async move {
            let _release = release;
            pending.await
        });

        let flight = async move { handle.await.unwrap_or_else(|err| Err(E::from(err))) }
            .boxed()
            .shared();
        in_flight.insert(
            key,
            InFlight {
                id,
                flight: flight.clone(),
            },
        );
        flight
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl<K, T, E> Default for RequestCoalescer<K, T, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Frees the key when the producer task ends, including on panic or runtime shutdown.
struct Release<K: Eq + Hash, T, E> {
    registry: Registry<K, T, E>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, T, E> Drop for Release<K, T, E> {
    fn drop(&mut self) {
        let mut in_flight = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(&self.key).is_some_and(|f| f.id == self.id) {
            in_flight.remove(&self.key);
        }
    }
}
