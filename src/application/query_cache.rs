use anyhow::Error;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    operation: &'static str,
    params: Vec<String>,
}

impl QueryKey {
    pub fn new<I, S>(operation: &'static str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// A failed fetch, shared between every caller that joined it.
#[derive(Debug, Clone, Error)]
#[error("{0:#}")]
pub struct QueryError(Arc<Error>);

impl From<Error> for QueryError {
    fn from(error: Error) -> Self {
        Self(Arc::new(error))
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, QueryError>>>;

enum Slot<V> {
    Ready { value: V, fetched_at: Instant },
    Pending(SharedFetch<V>),
}

/// Results keyed by operation name plus parameters. A result stays fresh for
/// `stale_after`, and callers asking for a key that is already being fetched
/// join that fetch. Failures reach every joined caller but are not stored.
pub struct QueryCache<V> {
    slots: Mutex<HashMap<QueryKey, Slot<V>>>,
    stale_after: Duration,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(stale_after: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stale_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value for `key` or runs `fetcher` to produce it.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<V, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        let pending = {
            let mut slots = self.lock();
            match slots.get(&key) {
                Some(Slot::Ready { value, fetched_at })
                    if fetched_at.elapsed() < self.stale_after =>
                {
                    tracing::debug!(operation = key.operation, "Query cache hit");
                    return Ok(value.clone());
                }
                Some(Slot::Pending(pending)) => {
                    tracing::debug!(operation = key.operation, "Joining in-flight query");
                    pending.clone()
                }
                _ => {
                    tracing::debug!(operation = key.operation, "Query cache miss");
                    self.start(&mut slots, &key, fetcher)
                }
            }
        };

        self.settle(key, pending).await
    }

    /// Runs `fetcher` even if the entry is fresh and replaces the entry with
    /// its result. A fetch already in flight for `key` loses its slot.
    pub async fn refetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<V, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        let pending = {
            let mut slots = self.lock();
            tracing::debug!(operation = key.operation, "Query refetch");
            self.start(&mut slots, &key, fetcher)
        };

        self.settle(key, pending).await
    }

    fn start<F, Fut>(
        &self,
        slots: &mut HashMap<QueryKey, Slot<V>>,
        key: &QueryKey,
        fetcher: F,
    ) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        slots.retain(|_, slot| match slot {
            Slot::Ready { fetched_at, .. } => fetched_at.elapsed() < self.stale_after,
            Slot::Pending(_) => true,
        });
        let pending = fetcher()
            .map(|result| result.map_err(QueryError::from))
            .boxed()
            .shared();
        slots.insert(key.clone(), Slot::Pending(pending.clone()));
        pending
    }

    async fn settle(&self, key: QueryKey, pending: SharedFetch<V>) -> Result<V, QueryError> {
        let result = pending.clone().await;

        // Only the fetch that still owns the slot may settle it; an invalidated
        // or already-settled slot is left alone.
        let mut slots = self.lock();
        if matches!(slots.get(&key), Some(Slot::Pending(current)) if current.ptr_eq(&pending)) {
            match &result {
                Ok(value) => {
                    slots.insert(
                        key,
                        Slot::Ready {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                        },
                    );
                }
                Err(_) => {
                    slots.remove(&key);
                }
            }
        }

        result
    }

    /// Drops the entry for `key`. An in-flight fetch still completes for its
    /// callers but does not repopulate the entry.
    pub fn invalidate(&self, key: &QueryKey) {
        self.lock().remove(key);
    }
}
