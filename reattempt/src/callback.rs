//! Capability contracts supplied by the caller.
//!
//! [`RetryCallback`] is the unit of work the executor drives;
//! [`RecoveryCallback`] produces a fallback result once retries are
//! exhausted. Both are implemented for closures taking the context by
//! reference, so ad-hoc call sites need no named types:
//!
//! ```rust,ignore
//! let result: RetryResult<Response, FetchError> = template
//!     .execute(|_ctx: &RetryContext<FetchError>| {
//!         let client = client.clone();
//!         async move { client.fetch().await.map_err(Into::into) }
//!     })
//!     .await;
//! ```

use crate::context::RetryContext;
use crate::errors::RetryResult;
use async_trait::async_trait;
use std::future::Future;

/// The unit of work to execute under retry.
///
/// A successful return short-circuits the loop immediately. An
/// [`Inner`](crate::RetryError::Inner) failure feeds the retry decision loop;
/// an error that is already an executor envelope (for example the
/// [`Exhausted`](crate::RetryError::Exhausted) result of a nested execution)
/// is terminal and propagates as-is, never wrapped a second time.
#[async_trait]
pub trait RetryCallback<T, E>: Send {
    /// Performs one attempt. The context exposes the current retry count and
    /// the last failure, should the work want to adapt.
    async fn do_with_retry(&mut self, context: &RetryContext<E>) -> RetryResult<T, E>;
}

#[async_trait]
impl<T, E, F, Fut> RetryCallback<T, E> for F
where
    F: FnMut(&RetryContext<E>) -> Fut + Send,
    Fut: Future<Output = RetryResult<T, E>> + Send,
    T: Send,
    E: Sync,
{
    async fn do_with_retry(&mut self, context: &RetryContext<E>) -> RetryResult<T, E> {
        (self)(context).await
    }
}

/// Fallback invoked when retries are exhausted.
///
/// Receives the exhausted context, whose last error is the failure that ended
/// the final attempt. Its own failure propagates to the caller unwrapped: no
/// exhaustion envelope is added around a failed recovery.
#[async_trait]
pub trait RecoveryCallback<T, E>: Send {
    /// Produces a substitute result for the failed execution.
    async fn recover(&mut self, context: &RetryContext<E>) -> RetryResult<T, E>;
}

#[async_trait]
impl<T, E, F, Fut> RecoveryCallback<T, E> for F
where
    F: FnMut(&RetryContext<E>) -> Fut + Send,
    Fut: Future<Output = RetryResult<T, E>> + Send,
    T: Send,
    E: Sync,
{
    async fn recover(&mut self, context: &RetryContext<E>) -> RetryResult<T, E> {
        (self)(context).await
    }
}
