use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::IntoFuture;
use std::hash::Hash;

use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use super::AsyncResult;

// ============================================================================
// AsyncCollection - zero or more deferred values, in order
// ============================================================================
//
// Multi-value counterpart of `AsyncResult`. Elements keep the order the
// source produced them in; the first error terminates the collection.
//
// ============================================================================

#[must_use = "an AsyncCollection does nothing until it is collected"]
pub struct AsyncCollection<T, E> {
    inner: BoxStream<'static, Result<T, E>>,
}

impl<T, E> AsyncCollection<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn from_values(values: Vec<T>) -> Self {
        Self {
            inner: stream::iter(values.into_iter().map(Ok::<T, E>)).boxed(),
        }
    }

    pub fn error(error: E) -> Self {
        Self {
            inner: stream::once(future::ready(Err(error))).boxed(),
        }
    }

    /// Flatten a single deferred batch (a page query, say) into a collection.
    pub fn from_batch(batch: AsyncResult<Vec<T>, E>) -> Self {
        let inner = stream::once(batch.into_future())
            .map_ok(|values| stream::iter(values.into_iter().map(Ok::<T, E>)))
            .try_flatten()
            .boxed();
        Self { inner }
    }

    /// Element-wise transform, preserving order and count.
    pub fn map<U, F>(self, f: F) -> AsyncCollection<U, E>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        AsyncCollection {
            inner: self.inner.map_ok(f).boxed(),
        }
    }

    pub fn map_err<E2, F>(self, f: F) -> AsyncCollection<T, E2>
    where
        E2: Send + 'static,
        F: FnMut(E) -> E2 + Send + 'static,
    {
        AsyncCollection {
            inner: self.inner.map_err(f).boxed(),
        }
    }

    /// Gather every element, or the first error.
    pub fn collect(self) -> AsyncResult<Vec<T>, E> {
        AsyncResult::new(self.inner.try_collect())
    }

    /// Attach a resolved value to every element that references a key.
    ///
    /// Distinct keys are extracted in first-seen order and each is resolved
    /// exactly once; the lookups run concurrently. The resolved values are
    /// then zipped back by key, so the output has the same length and order
    /// as the input regardless of which lookup finished first. A key that
    /// resolves to `None` leaves its elements without a value; a failed
    /// lookup fails the whole collection.
    pub fn zip_resolved<K, V, KF, RF>(self, key_of: KF, resolve: RF) -> AsyncCollection<(T, Option<V>), E>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
        KF: Fn(&T) -> Option<K> + Send + 'static,
        RF: Fn(K) -> AsyncResult<Option<V>, E> + Send + 'static,
    {
        let zipped = self.collect().flat_map(move |items| {
            let mut seen = HashSet::new();
            let lookups: Vec<_> = items
                .iter()
                .filter_map(&key_of)
                .filter(|key| seen.insert(key.clone()))
                .map(|key| resolve(key.clone()).map(move |value| (key, value)).into_future())
                .collect();

            AsyncResult::new(async move {
                let resolved: HashMap<K, V> = future::try_join_all(lookups)
                    .await?
                    .into_iter()
                    .filter_map(|(key, value)| value.map(|value| (key, value)))
                    .collect();

                Ok::<Vec<(T, Option<V>)>, E>(
                    items
                        .into_iter()
                        .map(|item| {
                            let value = key_of(&item).and_then(|key| resolved.get(&key).cloned());
                            (item, value)
                        })
                        .collect(),
                )
            })
        });

        AsyncCollection::from_batch(zipped)
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<T, E>> {
        self.inner
    }
}

impl<T, E> fmt::Debug for AsyncCollection<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCollection").finish_non_exhaustive()
    }
}
