//! `Reattempt` - declarative retry execution for fallible operations
//!
//! This library runs a unit of work and, upon failure, decides whether to
//! retry, how long to wait between attempts, and what to do once retries are
//! exhausted. Retry decisions ([`RetryPolicy`]), inter-attempt delays
//! ([`BackOffPolicy`]) and the work itself ([`RetryCallback`], optionally
//! [`RecoveryCallback`]) are pluggable; the [`RetryTemplate`] executor ties
//! them into one execution with a guaranteed context lifecycle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod callback;
pub mod config;
pub mod context;
pub mod errors;
pub mod policy;
pub mod template;

pub use backoff::{
    BackOffPolicy, ExponentialBackOffPolicy, ExponentialBackOffState, FixedBackOffPolicy,
    NoBackOffPolicy,
};
pub use callback::{RecoveryCallback, RetryCallback};
pub use config::{BackOffDelayMs, BackOffMultiplier, MaxAttempts, MaxBackOffDelayMs};
pub use context::RetryContext;
pub use errors::{BackOffError, RegistrationError, RetryError, RetryResult};
pub use policy::{AlwaysRetryPolicy, NeverRetryPolicy, RetryPolicy, SimpleRetryPolicy};
pub use template::RetryTemplate;

// Re-exported so callers can interrupt backoff waits without depending on
// tokio-util themselves.
pub use tokio_util::sync::CancellationToken;
