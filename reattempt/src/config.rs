//! Validated configuration types for retry and backoff policies.
//!
//! All knobs are `nutype` newtypes validated at construction time, so an
//! invalid configuration is unrepresentable: a retry bound of zero or a
//! backoff multiplier below one is rejected before any execution starts
//! instead of misbehaving inside the loop.

use nutype::nutype;
use std::time::Duration;

/// Maximum number of attempts a bounded retry policy permits.
///
/// Validated to be between 1 and 100: zero attempts would make the executor
/// give up before ever invoking the unit of work.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 100),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxAttempts(u32);

impl Default for MaxAttempts {
    fn default() -> Self {
        Self::try_new(3).unwrap()
    }
}

/// Base delay a sleeping backoff policy waits between attempts.
///
/// Validated to be between 1ms and 5 minutes.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 300_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct BackOffDelayMs(u64);

impl BackOffDelayMs {
    /// Convert to a [`Duration`] for use with `tokio::time::sleep`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Ceiling on the delay an exponential backoff policy may grow to.
///
/// Validated to be between 1ms and 10 minutes.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxBackOffDelayMs(u64);

impl MaxBackOffDelayMs {
    /// Convert to a [`Duration`] for delay capping.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

impl Default for MaxBackOffDelayMs {
    fn default() -> Self {
        Self::try_new(30_000).unwrap()
    }
}

/// Growth factor applied to the delay after each backoff wait.
///
/// Validated to be between 1.0 (constant delay) and 10.0.
#[nutype(
    validate(greater_or_equal = 1.0, less_or_equal = 10.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Into, Serialize, Deserialize)
)]
pub struct BackOffMultiplier(f64);

impl Default for BackOffMultiplier {
    fn default() -> Self {
        Self::try_new(2.0).unwrap()
    }
}
