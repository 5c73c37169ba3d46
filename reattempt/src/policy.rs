//! Retry policies: the decision authority of the execution loop.
//!
//! A [`RetryPolicy`] owns the context lifecycle (`open`/`close`), decides
//! whether another attempt is permitted (`can_retry`), and records failures
//! (`register_failure`). Policies hold configuration only; every piece of
//! per-execution mutable state lives in the [`RetryContext`], so one policy
//! instance can serve any number of concurrent executions.
//!
//! The built-in policies are independent types, not a hierarchy:
//! [`NeverRetryPolicy`], [`AlwaysRetryPolicy`] and [`SimpleRetryPolicy`].

use crate::config::MaxAttempts;
use crate::context::RetryContext;
use crate::errors::RegistrationError;
use std::sync::Arc;

/// Decision authority for one class of retry executions.
///
/// `can_retry` must be pure and idempotent: calling it any number of times
/// without an intervening `register_failure` returns the same answer and
/// changes nothing.
pub trait RetryPolicy<E>: Send + Sync {
    /// Creates a fresh context for one execution. Never fails.
    fn open(&self) -> RetryContext<E> {
        RetryContext::new()
    }

    /// Whether the executor may run another attempt given the context state.
    fn can_retry(&self, context: &RetryContext<E>) -> bool;

    /// Records a failed attempt into the context, plus any policy
    /// bookkeeping. An `Err` abandons the whole retry loop with
    /// [`RetryError::RegistrationFailed`](crate::RetryError::RegistrationFailed);
    /// it is not an ordinary retryable failure.
    fn register_failure(
        &self,
        context: &mut RetryContext<E>,
        error: E,
    ) -> Result<(), RegistrationError> {
        context.record_failure(error);
        Ok(())
    }

    /// Releases policy resources tied to the context. Called exactly once per
    /// opened context, on every exit path.
    fn close(&self, context: &mut RetryContext<E>) {
        let _ = context;
    }
}

/// Never permits a retry: the initial attempt runs, and its failure ends the
/// execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetryPolicy;

impl<E> RetryPolicy<E> for NeverRetryPolicy {
    fn can_retry(&self, context: &RetryContext<E>) -> bool {
        context.last_error().is_none()
    }
}

/// Permits retries unconditionally.
///
/// The caller must bound the failure rate externally, normally with a
/// sleeping backoff policy; combined with
/// [`NoBackOffPolicy`](crate::backoff::NoBackOffPolicy) a permanently failing
/// unit of work will retry as fast as the runtime allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetryPolicy;

impl<E> RetryPolicy<E> for AlwaysRetryPolicy {
    fn can_retry(&self, _context: &RetryContext<E>) -> bool {
        true
    }
}

/// Which failures a [`SimpleRetryPolicy`] treats as retryable.
enum Classifier<E> {
    /// Every failure kind is retryable.
    RetryAll,
    /// Only failures matching the predicate are retryable.
    Predicate(Arc<dyn Fn(&E) -> bool + Send + Sync>),
}

impl<E> Classifier<E> {
    fn is_retryable(&self, error: &E) -> bool {
        match self {
            Self::RetryAll => true,
            Self::Predicate(predicate) => predicate(error),
        }
    }
}

impl<E> Clone for Classifier<E> {
    fn clone(&self) -> Self {
        match self {
            Self::RetryAll => Self::RetryAll,
            Self::Predicate(predicate) => Self::Predicate(Arc::clone(predicate)),
        }
    }
}

/// Retries up to a fixed number of attempts, optionally restricted to a set
/// of retryable failure kinds.
///
/// `can_retry` holds while the retry count is below `max_attempts` and the
/// last failure (if any) is classified retryable. A non-retryable failure
/// ends the loop immediately even with attempt budget remaining.
pub struct SimpleRetryPolicy<E> {
    max_attempts: MaxAttempts,
    classifier: Classifier<E>,
}

impl<E> SimpleRetryPolicy<E> {
    /// A policy retrying any failure kind up to `max_attempts` attempts.
    pub const fn new(max_attempts: MaxAttempts) -> Self {
        Self {
            max_attempts,
            classifier: Classifier::RetryAll,
        }
    }

    /// A policy retrying only failures matching `predicate`, up to
    /// `max_attempts` attempts.
    pub fn retry_on<F>(max_attempts: MaxAttempts, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            max_attempts,
            classifier: Classifier::Predicate(Arc::new(predicate)),
        }
    }

    /// The attempt bound of this policy.
    pub const fn max_attempts(&self) -> MaxAttempts {
        self.max_attempts
    }
}

impl<E> Default for SimpleRetryPolicy<E> {
    /// Three attempts, any failure kind.
    fn default() -> Self {
        Self::new(MaxAttempts::default())
    }
}

impl<E> Clone for SimpleRetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            classifier: self.classifier.clone(),
        }
    }
}

impl<E> std::fmt::Debug for SimpleRetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleRetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field(
                "classifier",
                match &self.classifier {
                    Classifier::RetryAll => &"retry-all",
                    Classifier::Predicate(_) => &"<predicate>",
                },
            )
            .finish()
    }
}

impl<E> RetryPolicy<E> for SimpleRetryPolicy<E> {
    fn can_retry(&self, context: &RetryContext<E>) -> bool {
        if context.retry_count() >= u32::from(self.max_attempts) {
            return false;
        }
        context
            .last_error()
            .map_or(true, |error| self.classifier.is_retryable(error))
    }
}
