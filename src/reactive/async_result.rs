use std::fmt;
use std::future::{Future, IntoFuture};

use futures_util::future::{self, BoxFuture, FutureExt, TryFutureExt};

// ============================================================================
// AsyncResult - one deferred value or one error
// ============================================================================
//
// A pipeline stage that eventually yields exactly one `T` or exactly one `E`.
// The wrapped future is owned, so every instance is resolved at most once:
// composing (`map`, `flat_map`, ...) consumes the source and awaiting consumes
// the result. Nothing runs until the outermost result is awaited.
//
// ============================================================================

#[must_use = "an AsyncResult does nothing until it is awaited"]
pub struct AsyncResult<T, E> {
    inner: BoxFuture<'static, Result<T, E>>,
}

impl<T, E> AsyncResult<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a future that resolves to a single success or failure.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// An already-succeeded result.
    pub fn succeeded(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    /// An already-failed result, used to short-circuit a pipeline when a
    /// precondition does not hold.
    pub fn error(error: E) -> Self {
        Self::new(future::ready(Err(error)))
    }

    pub fn from_result(result: Result<T, E>) -> Self {
        Self::new(future::ready(result))
    }

    /// Transform the success value. Errors pass through untouched.
    pub fn map<U, F>(self, f: F) -> AsyncResult<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        AsyncResult::new(self.inner.map_ok(f))
    }

    /// Sequence a dependent asynchronous step.
    ///
    /// `f` only runs if this result succeeds; a failure from either side is
    /// what the returned result resolves to.
    pub fn flat_map<U, F>(self, f: F) -> AsyncResult<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> AsyncResult<U, E> + Send + 'static,
    {
        AsyncResult::new(self.inner.and_then(move |value| f(value).inner))
    }

    /// Translate the error type, typically from a port error into the domain
    /// taxonomy.
    pub fn map_err<E2, F>(self, f: F) -> AsyncResult<T, E2>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> E2 + Send + 'static,
    {
        AsyncResult::new(self.inner.map_err(f))
    }

    /// Explicitly decide what a failure turns into. Returning `Err` keeps
    /// the pipeline failed.
    pub fn recover<F>(self, f: F) -> Self
    where
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        Self::new(self.inner.map(|result| result.or_else(f)))
    }

    /// Like [`AsyncResult::recover`] with an asynchronous fallback.
    pub fn recover_with<F>(self, f: F) -> Self
    where
        F: FnOnce(E) -> AsyncResult<T, E> + Send + 'static,
    {
        Self::new(self.inner.or_else(move |error| f(error).inner))
    }

    /// Observe the success value without changing it.
    pub fn inspect<F>(self, f: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        Self::new(self.inner.inspect_ok(f))
    }

    /// Observe the failure without changing it.
    pub fn inspect_err<F>(self, f: F) -> Self
    where
        F: FnOnce(&E) + Send + 'static,
    {
        Self::new(self.inner.inspect_err(f))
    }

    /// Run two independent results concurrently and pair their values.
    /// The first failure wins.
    pub fn zip<U>(self, other: AsyncResult<U, E>) -> AsyncResult<(T, U), E>
    where
        U: Send + 'static,
    {
        AsyncResult::new(future::try_join(self.inner, other.inner))
    }
}

impl<T, E> AsyncResult<Option<T>, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Turn a resolved-empty value into a failure.
    pub fn or_error<F>(self, on_empty: F) -> AsyncResult<T, E>
    where
        F: FnOnce() -> E + Send + 'static,
    {
        AsyncResult::new(
            self.inner
                .map(|result| result.and_then(|value| value.ok_or_else(on_empty))),
        )
    }
}

impl<T, E> IntoFuture for AsyncResult<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = BoxFuture<'static, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

impl<T, E> fmt::Debug for AsyncResult<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult").finish_non_exhaustive()
    }
}
