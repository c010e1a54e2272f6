use std::future::IntoFuture;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::batch::{self, Done, SharedRequests};
use crate::error::Result;

/// Deferred result of a single key.
///
/// Obtaining a thunk never suspends; [Thunk::call] waits for the batch the
/// key joined. Thunks from many keys, or many loaders, can be collected
/// before any of them is awaited so that all of their batches fill up first.
pub struct Thunk<K, V, E> {
    state: State<K, V, E>,
}

enum State<K, V, E> {
    Ready(V),
    Pending {
        key: K,
        index: usize,
        done: Done<V, E>,
        requests: Arc<SharedRequests<K, V, E>>,
    },
}

impl<K, V, E> Thunk<K, V, E>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    V: Send + Sync + Clone + Default + 'static,
    E: Send + Sync + Clone + 'static,
{
    pub(crate) fn ready(value: V) -> Self {
        Self { state: State::Ready(value) }
    }

    pub(crate) fn pending(
        key: K,
        index: usize,
        done: Done<V, E>,
        requests: Arc<SharedRequests<K, V, E>>,
    ) -> Self {
        Self { state: State::Pending { key, index, done, requests } }
    }

    /// True when the value was served from the cache.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Waits for the key's batch and returns its value.
    ///
    /// A successful value is written into the loader's cache before it is
    /// returned. Calling this again yields the same outcome.
    pub async fn call(&self) -> Result<V, E> {
        match &self.state {
            State::Ready(value) => Ok(value.clone()),
            State::Pending { key, index, done, requests } => {
                let value = batch::wait(done, *index).await?;
                requests.lock().cache.insert(key.clone(), value.clone());
                Ok(value)
            }
        }
    }
}

impl<K, V, E> IntoFuture for Thunk<K, V, E>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    V: Send + Sync + Clone + Default + 'static,
    E: Send + Sync + Clone + 'static,
{
    type Output = Result<V, E>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.call().await })
    }
}

/// Deferred results of many keys, resolved in the order they were requested.
pub struct ThunkMany<K, V, E> {
    thunks: Vec<Thunk<K, V, E>>,
}

impl<K, V, E> ThunkMany<K, V, E>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    V: Send + Sync + Clone + Default + 'static,
    E: Send + Sync + Clone + 'static,
{
    pub(crate) fn new(thunks: Vec<Thunk<K, V, E>>) -> Self {
        Self { thunks }
    }

    pub fn len(&self) -> usize {
        self.thunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thunks.is_empty()
    }

    /// Drains the thunks in key order and stops at the first error.
    pub async fn call(&self) -> Result<Vec<V>, E> {
        let mut values = Vec::with_capacity(self.thunks.len());
        for thunk in &self.thunks {
            values.push(thunk.call().await?);
        }
        Ok(values)
    }
}

impl<K, V, E> IntoFuture for ThunkMany<K, V, E>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    V: Send + Sync + Clone + Default + 'static,
    E: Send + Sync + Clone + 'static,
{
    type Output = Result<Vec<V>, E>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.call().await })
    }
}
