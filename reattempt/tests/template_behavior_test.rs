//! Behavioral tests for the retry executor: invocation counts, the context
//! lifecycle, and the exhaustion, recovery and terminal-error paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reattempt::{
    BackOffError, BackOffPolicy, MaxAttempts, RegistrationError, RetryContext, RetryError,
    RetryPolicy, RetryResult, RetryTemplate, SimpleRetryPolicy,
};
use tokio_test::assert_ok;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum TestError {
    #[error("transient failure")]
    Transient,
    #[error("fatal failure")]
    Fatal,
}

/// Numbered failure so tests can tell which attempt produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attempt {0} failed")]
struct IndexedError(usize);

fn attempts(n: u32) -> MaxAttempts {
    MaxAttempts::try_new(n).unwrap()
}

/// Delegates to a `SimpleRetryPolicy` while counting context lifecycle calls.
struct CountingPolicy<E> {
    inner: SimpleRetryPolicy<E>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl<E> CountingPolicy<E> {
    fn new(inner: SimpleRetryPolicy<E>) -> Self {
        Self {
            inner,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<E: Send + Sync> RetryPolicy<E> for CountingPolicy<E> {
    fn open(&self) -> RetryContext<E> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.open()
    }

    fn can_retry(&self, context: &RetryContext<E>) -> bool {
        self.inner.can_retry(context)
    }

    fn register_failure(
        &self,
        context: &mut RetryContext<E>,
        error: E,
    ) -> Result<(), RegistrationError> {
        self.inner.register_failure(context, error)
    }

    fn close(&self, context: &mut RetryContext<E>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close(context);
    }
}

/// Backoff policy that waits nothing and counts its invocations.
struct CountingBackOff {
    waits: Arc<AtomicUsize>,
}

impl CountingBackOff {
    fn new() -> Self {
        Self {
            waits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl BackOffPolicy for CountingBackOff {
    type State = ();

    fn start(&self) -> Self::State {}

    async fn back_off(&self, _state: &mut Self::State) -> Result<(), BackOffError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Policy that rejects every registration; exercises the terminal path.
struct RejectingPolicy;

impl RetryPolicy<TestError> for RejectingPolicy {
    fn can_retry(&self, _context: &RetryContext<TestError>) -> bool {
        true
    }

    fn register_failure(
        &self,
        _context: &mut RetryContext<TestError>,
        _error: TestError,
    ) -> Result<(), RegistrationError> {
        Err(RegistrationError::new("bookkeeping rejected the failure"))
    }
}

/// Policy that never permits even the first attempt; exercises the
/// defensive illegal-state path.
struct ZeroAttemptPolicy;

impl RetryPolicy<TestError> for ZeroAttemptPolicy {
    fn can_retry(&self, _context: &RetryContext<TestError>) -> bool {
        false
    }
}

fn counting_callback(
    calls: &Arc<AtomicUsize>,
    failures_before_success: usize,
) -> impl FnMut(
    &RetryContext<TestError>,
) -> std::future::Ready<RetryResult<&'static str, TestError>> {
    let calls = Arc::clone(calls);
    move |_: &RetryContext<TestError>| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures_before_success {
            std::future::ready(Err(TestError::Transient.into()))
        } else {
            std::future::ready(Ok("done"))
        }
    }
}

#[tokio::test]
async fn first_attempt_success_uses_one_lifecycle_and_no_backoff() {
    let policy = CountingPolicy::new(SimpleRetryPolicy::new(attempts(3)));
    let opened = Arc::clone(&policy.opened);
    let closed = Arc::clone(&policy.closed);
    let backoff = CountingBackOff::new();
    let waits = Arc::clone(&backoff.waits);
    let template = RetryTemplate::new(policy, backoff);

    let calls = Arc::new(AtomicUsize::new(0));
    let result = template.execute(counting_callback(&calls, 0)).await;

    assert_eq!(assert_ok!(result), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(waits.load(Ordering::SeqCst), 0);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhaustion_runs_three_attempts_and_two_backoffs() {
    let policy = CountingPolicy::new(SimpleRetryPolicy::new(attempts(3)));
    let closed = Arc::clone(&policy.closed);
    let backoff = CountingBackOff::new();
    let waits = Arc::clone(&backoff.waits);
    let template = RetryTemplate::new(policy, backoff);

    let calls = Arc::new(AtomicUsize::new(0));
    let result = template.execute(counting_callback(&calls, usize::MAX)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(waits.load(Ordering::SeqCst), 2);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    match result.unwrap_err() {
        RetryError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert_eq!(source, TestError::Transient);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn recovery_receives_the_exhausted_context() {
    let policy = CountingPolicy::new(SimpleRetryPolicy::new(attempts(3)));
    let closed = Arc::clone(&policy.closed);
    let template = RetryTemplate::new(policy, reattempt::NoBackOffPolicy);

    let calls = Arc::new(AtomicUsize::new(0));
    let callback = {
        let calls = Arc::clone(&calls);
        move |_: &RetryContext<IndexedError>| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(RetryResult::<&str, _>::Err(IndexedError(n).into()))
        }
    };
    let recovery = |context: &RetryContext<IndexedError>| {
        let failed_attempts = context.retry_count();
        let last = context.last_error().cloned();
        async move {
            assert_eq!(failed_attempts, 3);
            assert_eq!(last, Some(IndexedError(3)));
            Ok("fallback")
        }
    };

    let result = template.execute_with_recovery(callback, recovery).await;
    assert_eq!(assert_ok!(result), "fallback");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn recovery_failure_propagates_unwrapped() {
    let template =
        RetryTemplate::new(SimpleRetryPolicy::new(attempts(2)), reattempt::NoBackOffPolicy);

    let callback = |_: &RetryContext<TestError>| {
        std::future::ready(RetryResult::<u32, _>::Err(TestError::Transient.into()))
    };
    let recovery = |_: &RetryContext<TestError>| {
        std::future::ready(RetryResult::<u32, _>::Err(RetryError::Inner(
            TestError::Fatal,
        )))
    };

    let result = template.execute_with_recovery(callback, recovery).await;
    match result.unwrap_err() {
        RetryError::Inner(error) => assert_eq!(error, TestError::Fatal),
        other => panic!("expected the recovery failure unwrapped, got {other:?}"),
    }
}

#[tokio::test]
async fn non_retryable_failure_stops_with_budget_remaining() {
    let policy = SimpleRetryPolicy::retry_on(attempts(5), |error: &TestError| {
        matches!(error, TestError::Transient)
    });
    let template = RetryTemplate::new(policy, reattempt::NoBackOffPolicy);

    let calls = Arc::new(AtomicUsize::new(0));
    let callback = {
        let calls = Arc::clone(&calls);
        move |_: &RetryContext<TestError>| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(RetryResult::<u32, _>::Err(TestError::Fatal.into()))
        }
    };

    let result = template.execute(callback).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match result.unwrap_err() {
        RetryError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 1);
            assert_eq!(source, TestError::Fatal);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn registration_failure_is_terminal_and_still_closes_the_context() {
    struct ClosingRejectingPolicy {
        closed: Arc<AtomicUsize>,
    }
    impl RetryPolicy<TestError> for ClosingRejectingPolicy {
        fn can_retry(&self, _context: &RetryContext<TestError>) -> bool {
            true
        }
        fn register_failure(
            &self,
            _context: &mut RetryContext<TestError>,
            _error: TestError,
        ) -> Result<(), RegistrationError> {
            Err(RegistrationError::new("bookkeeping rejected the failure"))
        }
        fn close(&self, _context: &mut RetryContext<TestError>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    let closed = Arc::new(AtomicUsize::new(0));
    let template = RetryTemplate::new(
        ClosingRejectingPolicy {
            closed: Arc::clone(&closed),
        },
        reattempt::NoBackOffPolicy,
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let callback = {
        let calls = Arc::clone(&calls);
        move |_: &RetryContext<TestError>| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(RetryResult::<u32, _>::Err(TestError::Transient.into()))
        }
    };

    let result = template.execute(callback).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    match result.unwrap_err() {
        RetryError::RegistrationFailed { source } => {
            assert_eq!(source.reason, "bookkeeping rejected the failure");
        }
        other => panic!("expected a registration failure, got {other:?}"),
    }
}

#[tokio::test]
async fn registration_rejection_beats_remaining_budget() {
    let template = RetryTemplate::new(RejectingPolicy, reattempt::NoBackOffPolicy);

    let result: RetryResult<u32, TestError> = template
        .execute(|_: &RetryContext<TestError>| {
            std::future::ready(Err(TestError::Transient.into()))
        })
        .await;

    assert!(matches!(
        result.unwrap_err(),
        RetryError::RegistrationFailed { .. }
    ));
}

#[tokio::test]
async fn callback_envelope_errors_pass_through_without_rewrapping() {
    let template =
        RetryTemplate::new(SimpleRetryPolicy::new(attempts(5)), reattempt::NoBackOffPolicy);

    let calls = Arc::new(AtomicUsize::new(0));
    let callback = {
        let calls = Arc::clone(&calls);
        move |_: &RetryContext<TestError>| {
            calls.fetch_add(1, Ordering::SeqCst);
            // Already an exhaustion envelope, e.g. from a nested execution.
            std::future::ready(RetryResult::<u32, _>::Err(RetryError::Exhausted {
                attempts: 7,
                source: TestError::Transient,
            }))
        }
    };

    let result = template.execute(callback).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match result.unwrap_err() {
        RetryError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 7, "the inner envelope must survive untouched");
            assert_eq!(source, TestError::Transient);
        }
        other => panic!("expected the inner envelope, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_attempt_policy_surfaces_the_defensive_illegal_state() {
    let template = RetryTemplate::new(ZeroAttemptPolicy, reattempt::NoBackOffPolicy);

    let calls = Arc::new(AtomicUsize::new(0));
    let callback = {
        let calls = Arc::clone(&calls);
        move |_: &RetryContext<TestError>| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(RetryResult::<u32, _>::Ok(1))
        }
    };

    let result = template.execute(callback).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(
        result.unwrap_err(),
        RetryError::ExhaustedWithoutFailure
    ));
}

#[tokio::test]
async fn shared_template_drives_concurrent_executions_independently() {
    let template = Arc::new(RetryTemplate::new(
        SimpleRetryPolicy::new(attempts(3)),
        reattempt::NoBackOffPolicy,
    ));

    let flaky_calls = Arc::new(AtomicUsize::new(0));
    let flaky = {
        let template = Arc::clone(&template);
        let calls = Arc::clone(&flaky_calls);
        tokio::spawn(async move {
            template
                .execute(move |_: &RetryContext<TestError>| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(if n < 2 {
                        Err(TestError::Transient.into())
                    } else {
                        Ok("recovered")
                    })
                })
                .await
        })
    };

    let doomed_calls = Arc::new(AtomicUsize::new(0));
    let doomed = {
        let template = Arc::clone(&template);
        let calls = Arc::clone(&doomed_calls);
        tokio::spawn(async move {
            template
                .execute(move |_: &RetryContext<TestError>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(RetryResult::<&str, _>::Err(TestError::Transient.into()))
                })
                .await
        })
    };

    let flaky_result = flaky.await.unwrap();
    let doomed_result = doomed.await.unwrap();

    assert_eq!(assert_ok!(flaky_result), "recovered");
    assert_eq!(flaky_calls.load(Ordering::SeqCst), 3);

    assert_eq!(doomed_calls.load(Ordering::SeqCst), 3);
    assert!(doomed_result.unwrap_err().is_exhausted());
}
