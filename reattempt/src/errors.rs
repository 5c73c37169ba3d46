//! Error types for the retry engine.
//!
//! The error design follows these principles:
//!
//! - **Tagged outcomes**: every way a retry execution can fail is a distinct
//!   variant the caller can pattern-match on, rather than a string or a
//!   catch-all.
//! - **Terminal vs retryable**: failure kinds that abort the loop
//!   unconditionally ([`RetryError::Interrupted`],
//!   [`RetryError::RegistrationFailed`]) are separate variants from the
//!   ordinary failures that drive the retry decision.
//! - **Single wrap**: the exhaustion envelope wraps the last recorded failure
//!   exactly once; an error that is already an envelope passes through as-is.
//!
//! # Error Categories
//!
//! - [`RetryError`]: everything a [`RetryTemplate`](crate::RetryTemplate)
//!   execution can surface to its caller
//! - [`BackOffError`]: failures raised by a backoff policy while waiting
//! - [`RegistrationError`]: a retry policy's refusal to record a failure

use thiserror::Error;

/// Errors surfaced by a retry execution.
///
/// `E` is the error type of the unit of work being retried. Ordinary
/// failures enter the envelope as [`RetryError::Inner`] (via `From`, so `?`
/// lifts them); every other variant is produced by the executor itself.
///
/// # Example
///
/// ```rust,ignore
/// match template.execute(callback).await {
///     Ok(value) => process(value),
///     Err(RetryError::Exhausted { attempts, source }) => {
///         // Gave up after retrying; `source` is the last failure
///         report_failure(attempts, &source);
///     }
///     Err(RetryError::Interrupted { .. }) => {
///         // Shutting down; stop cleanly
///     }
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// An ordinary failure raised by the unit of work.
    #[error(transparent)]
    Inner(E),

    /// Retries were exhausted; wraps the last recorded failure.
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted {
        /// How many attempts had failed when the executor gave up.
        attempts: u32,
        /// The last failure recorded before giving up.
        source: E,
    },

    /// The backoff wait was interrupted. Terminal: the loop is abandoned
    /// without further attempts or recovery.
    #[error("retry aborted: backoff interrupted")]
    Interrupted {
        /// The interruption raised by the backoff policy.
        source: BackOffError,
    },

    /// The retry policy could not register a failure. Terminal, and distinct
    /// from ordinary exhaustion: it signals a policy problem, not a failing
    /// unit of work.
    #[error("retry aborted: failure could not be registered")]
    RegistrationFailed {
        /// The rejection raised by the retry policy.
        source: RegistrationError,
    },

    /// The retry loop ended with no failure ever recorded. Defensive only: a
    /// correct policy implementation never permits this.
    #[error("retries exhausted with no recorded failure; the retry policy is misbehaving")]
    ExhaustedWithoutFailure,
}

impl<E> RetryError<E> {
    /// Returns true if this is the exhaustion envelope.
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns true if the execution was aborted by a backoff interruption.
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// The number of failed attempts, if this is the exhaustion envelope.
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Extracts the underlying unit-of-work failure, if one is carried.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(error) | Self::Exhausted { source: error, .. } => Some(error),
            _ => None,
        }
    }
}

impl<E> From<E> for RetryError<E> {
    fn from(error: E) -> Self {
        Self::Inner(error)
    }
}

/// Errors raised by a backoff policy while waiting between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackOffError {
    /// The wait was cut short by a cancellation signal.
    #[error("backoff wait interrupted by cancellation")]
    Interrupted,
}

/// A retry policy's refusal to record a failure into its context.
///
/// Raising this from [`RetryPolicy::register_failure`] abandons the whole
/// retry loop with [`RetryError::RegistrationFailed`].
///
/// [`RetryPolicy::register_failure`]: crate::policy::RetryPolicy::register_failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("retry policy rejected the failure: {reason}")]
pub struct RegistrationError {
    /// Why the policy rejected the failure.
    pub reason: String,
}

impl RegistrationError {
    /// Creates a registration error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Type alias for retry execution results.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;
