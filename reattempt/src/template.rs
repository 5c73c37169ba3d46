//! The retry executor.
//!
//! [`RetryTemplate`] ties a retry policy, a backoff policy and the caller's
//! callbacks into one execution:
//!
//! 1. Open a context via the retry policy.
//! 2. Start the backoff policy (fresh per-execution timing state).
//! 3. While the policy permits: invoke the callback; on success return; on an
//!    ordinary failure register it and, if another attempt is permitted, back
//!    off. Registration failures and backoff interruptions abort the loop as
//!    terminal errors.
//! 4. On exhaustion, invoke the recovery callback if one was supplied, else
//!    wrap the last failure in the exhaustion envelope.
//! 5. Close the context exactly once, on every path.
//!
//! # Example
//!
//! ```rust,ignore
//! use reattempt::{MaxAttempts, RetryTemplate, SimpleRetryPolicy, FixedBackOffPolicy};
//!
//! let template = RetryTemplate::new(
//!     SimpleRetryPolicy::retry_on(MaxAttempts::try_new(5)?, FetchError::is_transient),
//!     FixedBackOffPolicy::new(BackOffDelayMs::try_new(200)?),
//! );
//!
//! let response = template
//!     .execute(|_ctx: &RetryContext<FetchError>| {
//!         let client = client.clone();
//!         async move { client.fetch().await.map_err(Into::into) }
//!     })
//!     .await?;
//! ```

use crate::backoff::{BackOffPolicy, NoBackOffPolicy};
use crate::callback::{RecoveryCallback, RetryCallback};
use crate::context::RetryContext;
use crate::errors::{RetryError, RetryResult};
use crate::policy::{RetryPolicy, SimpleRetryPolicy};
use tracing::{debug, debug_span, warn, Instrument};

/// Retry executor pairing a retry policy with a backoff policy.
///
/// The template holds no per-execution state, so one instance can drive any
/// number of concurrent executions; each gets its own freshly opened context
/// and backoff state.
///
/// If the callback panics, the context is dropped rather than closed; the
/// close guarantee covers every non-panicking path.
#[derive(Debug, Clone)]
pub struct RetryTemplate<P, B> {
    retry_policy: P,
    backoff_policy: B,
}

impl<P, B> RetryTemplate<P, B> {
    /// Creates a template from the given policies.
    pub const fn new(retry_policy: P, backoff_policy: B) -> Self {
        Self {
            retry_policy,
            backoff_policy,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy<P2>(self, retry_policy: P2) -> RetryTemplate<P2, B> {
        RetryTemplate {
            retry_policy,
            backoff_policy: self.backoff_policy,
        }
    }

    /// Replaces the backoff policy.
    #[must_use]
    pub fn with_backoff_policy<B2>(self, backoff_policy: B2) -> RetryTemplate<P, B2> {
        RetryTemplate {
            retry_policy: self.retry_policy,
            backoff_policy,
        }
    }
}

impl<E> Default for RetryTemplate<SimpleRetryPolicy<E>, NoBackOffPolicy> {
    /// Up to three attempts on any failure kind, with no backoff delay.
    fn default() -> Self {
        Self::new(SimpleRetryPolicy::default(), NoBackOffPolicy)
    }
}

impl<P, B> RetryTemplate<P, B> {
    /// Runs `callback` under this template's policies.
    ///
    /// Returns the callback's first successful result, or a [`RetryError`]
    /// describing why retrying failed.
    pub async fn execute<T, E, C>(&self, mut callback: C) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        B: BackOffPolicy,
        C: RetryCallback<T, E>,
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.do_execute(&mut callback, None).await
    }

    /// Runs `callback` under this template's policies, falling back to
    /// `recovery` once retries are exhausted.
    ///
    /// The recovery callback receives the exhausted context with the last
    /// failure still recorded; its result (or its own failure, unwrapped)
    /// becomes the result of the execution.
    pub async fn execute_with_recovery<T, E, C, R>(
        &self,
        mut callback: C,
        mut recovery: R,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        B: BackOffPolicy,
        C: RetryCallback<T, E>,
        R: RecoveryCallback<T, E>,
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.do_execute(&mut callback, Some(&mut recovery)).await
    }

    async fn do_execute<T, E, C>(
        &self,
        callback: &mut C,
        recovery: Option<&mut dyn RecoveryCallback<T, E>>,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        B: BackOffPolicy,
        C: RetryCallback<T, E>,
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut context = self.retry_policy.open();
        let span = debug_span!("retry_execution", execution_id = %context.execution_id());
        let result = self
            .attempt_loop(callback, recovery, &mut context)
            .instrument(span)
            .await;
        // Success, exhaustion, recovery and terminal errors all pass through
        // here, so the context is closed exactly once on every path.
        self.retry_policy.close(&mut context);
        result
    }

    async fn attempt_loop<T, E, C>(
        &self,
        callback: &mut C,
        recovery: Option<&mut dyn RecoveryCallback<T, E>>,
        context: &mut RetryContext<E>,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        B: BackOffPolicy,
        C: RetryCallback<T, E>,
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut backoff_state = self.backoff_policy.start();

        while self.retry_policy.can_retry(context) {
            match callback.do_with_retry(context).await {
                Ok(value) => {
                    if context.retry_count() > 0 {
                        debug!(
                            failed_attempts = context.retry_count(),
                            "attempt succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(RetryError::Inner(error)) => {
                    debug!(attempt = context.retry_count() + 1, %error, "attempt failed");
                    if let Err(source) = self.retry_policy.register_failure(context, error) {
                        warn!(%source, "retry policy rejected the failure; abandoning retries");
                        return Err(RetryError::RegistrationFailed { source });
                    }
                    if self.retry_policy.can_retry(context) {
                        if let Err(source) = self.backoff_policy.back_off(&mut backoff_state).await
                        {
                            warn!(%source, "backoff interrupted; abandoning retries");
                            return Err(RetryError::Interrupted { source });
                        }
                    }
                }
                Err(terminal) => {
                    debug!(%terminal, "callback raised a terminal failure");
                    return Err(terminal);
                }
            }
        }

        Self::handle_exhausted(context, recovery).await
    }

    async fn handle_exhausted<T, E>(
        context: &mut RetryContext<E>,
        recovery: Option<&mut dyn RecoveryCallback<T, E>>,
    ) -> RetryResult<T, E>
    where
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        if context.last_error().is_none() {
            warn!("retry loop ended with no recorded failure");
            return Err(RetryError::ExhaustedWithoutFailure);
        }

        if let Some(recovery) = recovery {
            debug!(
                failed_attempts = context.retry_count(),
                "retries exhausted; invoking recovery"
            );
            return recovery.recover(context).await;
        }

        let attempts = context.retry_count();
        match context.take_last_error() {
            Some(source) => {
                warn!(attempts, %source, "retries exhausted");
                Err(RetryError::Exhausted { attempts, source })
            }
            None => Err(RetryError::ExhaustedWithoutFailure),
        }
    }
}
