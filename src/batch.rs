use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexSet;
use tokio::sync::watch;

use crate::error::Error;

pub(crate) type Outcome<V, E> = Arc<Result<Vec<V>, E>>;

/// Receiving end of a batch's completion signal.
pub(crate) type Done<V, E> = watch::Receiver<Option<Outcome<V, E>>>;

/// An open batch, owned by the loader's `current` slot.
///
/// A batch is closing once it has been taken out of that slot; only the
/// path that took it may dispatch it.
pub(crate) struct PendingBatch<K, V, E> {
    id: u64,
    keys: IndexSet<K>,
    done: watch::Sender<Option<Outcome<V, E>>>,
}

impl<K: Hash + Eq, V, E> PendingBatch<K, V, E> {
    pub fn new(id: u64) -> Self {
        let (done, _) = watch::channel(None);
        Self { id, keys: IndexSet::new(), done }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Adds `key` unless it is already part of the batch and returns its
    /// position in the fetch call.
    pub fn join(&mut self, key: K) -> (usize, Done<V, E>) {
        let (index, _) = self.keys.insert_full(key);
        (index, self.done.subscribe())
    }

    pub fn is_full(&self, max_size: usize) -> bool {
        max_size > 0 && self.keys.len() >= max_size
    }

    pub fn close(self) -> ClosedBatch<K, V, E> {
        ClosedBatch { id: self.id, keys: self.keys.into_iter().collect(), done: self.done }
    }
}

/// A batch that no longer accepts keys and is waiting to be fetched.
pub(crate) struct ClosedBatch<K, V, E> {
    id: u64,
    keys: Vec<K>,
    done: watch::Sender<Option<Outcome<V, E>>>,
}

impl<K, V, E> ClosedBatch<K, V, E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Stores the outcome and wakes every waiter.
    pub fn complete(self, outcome: Result<Vec<V>, E>) {
        self.done.send_replace(Some(Arc::new(outcome)));
    }
}

/// Waits for the batch behind `done` and reads the value at `index`.
pub(crate) async fn wait<V: Clone + Default, E: Clone>(
    done: &Done<V, E>,
    index: usize,
) -> Result<V, Error<E>> {
    let mut done = done.clone();
    let outcome = match done.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => None,
    };

    match outcome.as_deref() {
        Some(Ok(values)) => Ok(values.get(index).cloned().unwrap_or_default()),
        Some(Err(error)) => Err(Error::Fetch(error.clone())),
        None => Err(Error::Aborted),
    }
}

/// State guarded by the loader lock: the cache and the open batch are read
/// and updated together.
pub(crate) struct Requests<K, V, E> {
    pub cache: HashMap<K, V>,
    pub current: Option<PendingBatch<K, V, E>>,
    next_id: u64,
}

impl<K: Hash + Eq, V, E> Requests<K, V, E> {
    pub fn new() -> Self {
        Self { cache: HashMap::new(), current: None, next_id: 0 }
    }

    /// Returns the open batch, opening one if there is none. The flag tells
    /// whether the batch was just opened.
    pub fn current_or_open(&mut self) -> (&mut PendingBatch<K, V, E>, bool) {
        let opened = self.current.is_none();
        if opened {
            self.next_id += 1;
        }
        let id = self.next_id;
        (self.current.get_or_insert_with(|| PendingBatch::new(id)), opened)
    }

    /// Takes the open batch out of the slot if it is still batch `id`.
    pub fn take_if(&mut self, id: u64) -> Option<PendingBatch<K, V, E>> {
        match &self.current {
            Some(batch) if batch.id() == id => self.current.take(),
            _ => None,
        }
    }
}

pub(crate) struct SharedRequests<K, V, E>(Mutex<Requests<K, V, E>>);

impl<K: Hash + Eq, V, E> SharedRequests<K, V, E> {
    pub fn new() -> Self {
        Self(Mutex::new(Requests::new()))
    }

    // A panic under the lock leaves at most an open batch whose timer is
    // already running, so a poisoned lock is still safe to use.
    pub fn lock(&self) -> MutexGuard<'_, Requests<K, V, E>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
