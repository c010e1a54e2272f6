use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;

use tokio_util::sync::CancellationToken;

/// Trait for batch loading.
#[async_trait::async_trait]
pub trait Loader<K: Send + Sync + Hash + Eq + Clone + 'static>: Send + Sync + 'static {
    /// Type of value.
    ///
    /// Positions missing from a short result resolve to `Default::default()`.
    type Value: Send + Sync + Clone + Default + 'static;

    /// Type of error, shared by every key of a failed batch.
    type Error: Send + Sync + Clone + 'static;

    /// Load the values for `keys`, in the same order as `keys`.
    ///
    /// `keys` never contains duplicates. `token` is the owning loader's
    /// cancellation token.
    async fn load(
        &self,
        keys: &[K],
        token: &CancellationToken,
    ) -> Result<Vec<Self::Value>, Self::Error>;
}

/// [Loader] backed by an async closure.
pub struct LoaderFn<F, V, E> {
    fetch: F,
    _marker: PhantomData<fn() -> (V, E)>,
}

/// Wraps `fetch` into a [Loader].
///
/// ```
/// use tailcall_dataloader::{loader_fn, DataLoader};
///
/// let loader = loader_fn(|keys: Vec<String>, _token| async move {
///     Ok::<_, String>(keys.iter().map(|key| key.len()).collect::<Vec<_>>())
/// });
/// let data_loader = DataLoader::new(loader);
/// ```
pub fn loader_fn<K, V, E, F, Fut>(fetch: F) -> LoaderFn<F, V, E>
where
    F: Fn(Vec<K>, CancellationToken) -> Fut,
    Fut: Future<Output = Result<Vec<V>, E>>,
{
    LoaderFn { fetch, _marker: PhantomData }
}

#[async_trait::async_trait]
impl<K, V, E, F, Fut> Loader<K> for LoaderFn<F, V, E>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    V: Send + Sync + Clone + Default + 'static,
    E: Send + Sync + Clone + 'static,
    F: Fn(Vec<K>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<V>, E>> + Send,
{
    type Value = V;
    type Error = E;

    async fn load(&self, keys: &[K], token: &CancellationToken) -> Result<Vec<V>, E> {
        (self.fetch)(keys.to_vec(), token.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_loader_fn() {
        let loader: LoaderFn<_, u64, String> = loader_fn(|keys: Vec<u64>, _| async move {
            Ok(keys.into_iter().map(|key| key * 2).collect::<Vec<_>>())
        });
        let actual = Loader::<u64>::load(&loader, &[1, 2, 3], &CancellationToken::new()).await;
        assert_eq!(actual, Ok(vec![2, 4, 6]));
    }

    #[tokio::test]
    async fn test_loader_fn_sees_token() {
        let loader: LoaderFn<_, u64, String> = loader_fn(|_: Vec<u64>, token| async move {
            if token.is_cancelled() {
                Err("cancelled".to_string())
            } else {
                Ok(Vec::<u64>::new())
            }
        });
        let token = CancellationToken::new();
        token.cancel();
        let actual = Loader::<u64>::load(&loader, &[1], &token).await;
        assert_eq!(actual, Err("cancelled".to_string()));
    }
}
