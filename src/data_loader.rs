use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::batch::{ClosedBatch, Requests, SharedRequests};
use crate::config::Batch;
use crate::error::Result;
use crate::loader::Loader;
use crate::thunk::{Thunk, ThunkMany};

/// Data loader.
///
/// Coalesces point lookups issued while a batch is open into a single
/// [Loader::load] call and caches every value that was successfully
/// resolved. Cached entries live as long as the loader and are never
/// evicted; failures are never cached.
///
/// Must be used from within a tokio runtime.
///
/// Fetch calls of one loader run one at a time unless
/// [DataLoader::max_concurrency] is raised. A [Loader] that loads from its
/// own `DataLoader` needs a permit for every level of nesting, otherwise the
/// inner batch waits forever for the permit held by the outer fetch.
///
/// Reference: <https://github.com/facebook/dataloader>
pub struct DataLoader<K, L>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
{
    inner: Arc<DataLoaderInner<K, L>>,
    delay: Duration,
    max_batch_size: usize,
    permits: Arc<Semaphore>,
    token: CancellationToken,
}

struct DataLoaderInner<K, L>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
{
    requests: Arc<SharedRequests<K, L::Value, L::Error>>,
    loader: L,
}

impl<K, L> DataLoader<K, L>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
{
    /// Use `Loader` to create a [DataLoader] with a `1ms` delay and a max
    /// batch size of `1000`.
    pub fn new(loader: L) -> Self {
        Self {
            inner: Arc::new(DataLoaderInner { requests: Arc::new(SharedRequests::new()), loader }),
            delay: Duration::from_millis(1),
            max_batch_size: 1000,
            permits: Arc::new(Semaphore::new(1)),
            token: CancellationToken::new(),
        }
    }

    /// Use `Loader` to create a [DataLoader] configured by `batch`.
    pub fn with_config(loader: L, batch: &Batch) -> Self {
        Self::new(loader)
            .delay(batch.wait())
            .max_batch_size(batch.max_size)
            .max_concurrency(batch.max_concurrency)
    }

    /// Specify how long a batch stays open after its first key, the default
    /// is `1ms`.
    #[must_use]
    pub fn delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    /// Specify the max batch size, the default is `1000`. `0` disables the
    /// limit.
    ///
    /// Once a batch holds this many distinct keys it is dispatched
    /// immediately.
    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        Self { max_batch_size, ..self }
    }

    /// Specify how many fetch calls may run at the same time, the default is
    /// `1`. `0` is treated as `1`.
    ///
    /// Set it above the nesting depth when the loader calls back into this
    /// `DataLoader`.
    #[must_use]
    pub fn max_concurrency(self, max_concurrency: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(max_concurrency.max(1))), ..self }
    }

    /// Specify the token passed to every fetch call.
    ///
    /// Cancelling it closes open batches without waiting for their delay.
    #[must_use]
    pub fn cancellation_token(self, token: CancellationToken) -> Self {
        Self { token, ..self }
    }

    /// Get the loader.
    #[inline]
    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Get the token passed to every fetch call.
    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Use this `DataLoader` to load a value.
    #[instrument(skip_all)]
    pub async fn load_one(&self, key: K) -> Result<L::Value, L::Error> {
        self.load_one_deferred(key).call().await
    }

    /// Registers `key` without waiting for it.
    pub fn load_one_deferred(&self, key: K) -> Thunk<K, L::Value, L::Error> {
        let mut requests = self.inner.requests.lock();
        self.join(&mut requests, key)
    }

    /// Use this `DataLoader` to load some values, in the order of `keys`.
    #[instrument(skip_all)]
    pub async fn load_many<I>(&self, keys: I) -> Result<Vec<L::Value>, L::Error>
    where
        I: IntoIterator<Item = K>,
    {
        self.load_many_deferred(keys).call().await
    }

    /// Registers all `keys` without waiting for them.
    ///
    /// The keys join under a single acquisition of the lock, so they only
    /// split across batches when the max batch size is reached.
    pub fn load_many_deferred<I>(&self, keys: I) -> ThunkMany<K, L::Value, L::Error>
    where
        I: IntoIterator<Item = K>,
    {
        // Caller code must not run under the lock.
        let keys = keys.into_iter().collect::<Vec<_>>();
        let mut requests = self.inner.requests.lock();
        let thunks = keys
            .into_iter()
            .map(|key| self.join(&mut requests, key))
            .collect();
        ThunkMany::new(thunks)
    }

    /// Feed some data into the cache.
    pub fn feed_many<I>(&self, values: I)
    where
        I: IntoIterator<Item = (K, L::Value)>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        let mut requests = self.inner.requests.lock();
        requests.cache.extend(values);
    }

    /// Feed a value into the cache.
    pub fn feed_one(&self, key: K, value: L::Value) {
        self.feed_many(std::iter::once((key, value)));
    }

    /// Gets all values in the cache.
    pub fn get_cached_values(&self) -> HashMap<K, L::Value> {
        self.inner.requests.lock().cache.clone()
    }

    fn join(
        &self,
        requests: &mut Requests<K, L::Value, L::Error>,
        key: K,
    ) -> Thunk<K, L::Value, L::Error> {
        if let Some(value) = requests.cache.get(&key) {
            return Thunk::ready(value.clone());
        }

        let (batch, opened) = requests.current_or_open();
        let id = batch.id();
        // The timer owns the batch from here on, even if the key panics below.
        if opened {
            tracing::trace!(batch = id, "opened batch");
            self.start_timer(id);
        }
        let (index, done) = batch.join(key.clone());

        if batch.is_full(self.max_batch_size) {
            if let Some(batch) = requests.take_if(id) {
                tracing::debug!(batch = id, keys = batch.len(), "batch is full");
                self.spawn_dispatch(batch.close());
            }
        }

        Thunk::pending(key, index, done, self.inner.requests.clone())
    }

    fn start_timer(&self, id: u64) {
        let inner = self.inner.clone();
        let permits = self.permits.clone();
        let token = self.token.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    tracing::debug!(batch = id, "closing batch early, loader was cancelled");
                }
            }

            let batch = inner.requests.lock().take_if(id);
            match batch {
                Some(batch) if !batch.is_empty() => {
                    tracing::debug!(batch = id, keys = batch.len(), "batch delay elapsed");
                    inner.dispatch(batch.close(), &permits, &token).await;
                }
                Some(_) => tracing::trace!(batch = id, "dropping empty batch"),
                // Already taken when the batch filled up before the delay elapsed.
                None => {}
            }
        });
    }

    fn spawn_dispatch(&self, batch: ClosedBatch<K, L::Value, L::Error>) {
        let inner = self.inner.clone();
        let permits = self.permits.clone();
        let token = self.token.clone();
        tokio::spawn(async move { inner.dispatch(batch, &permits, &token).await });
    }
}

impl<K, L> DataLoaderInner<K, L>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
{
    async fn dispatch(
        &self,
        batch: ClosedBatch<K, L::Value, L::Error>,
        permits: &Semaphore,
        token: &CancellationToken,
    ) {
        // The semaphore is never closed.
        let _permit = permits.acquire().await.ok();
        let id = batch.id();
        let expected = batch.keys().len();
        let start = Instant::now();

        tracing::debug!(batch = id, keys = expected, "dispatching batch");
        let outcome = self.loader.load(batch.keys(), token).await;
        let elapsed = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(values) if values.len() < expected => {
                tracing::debug!(
                    batch = id,
                    expected,
                    received = values.len(),
                    elapsed,
                    "loader returned fewer values than keys"
                );
            }
            Ok(_) => tracing::debug!(batch = id, elapsed, "batch resolved"),
            Err(_) => tracing::warn!(batch = id, keys = expected, elapsed, "batch failed"),
        }

        batch.complete(outcome);
    }
}
