//! Backoff policies: how long to wait between attempts.
//!
//! A [`BackOffPolicy`] is consulted by the executor between a failed attempt
//! and the next permitted one, never after the final attempt. Policies hold
//! configuration only; per-execution timing state is created by
//! [`BackOffPolicy::start`] and threaded back through every
//! [`BackOffPolicy::back_off`] call, so one policy instance can serve
//! concurrent executions.
//!
//! Sleeping policies are interruptible: give them a [`CancellationToken`] and
//! a cancellation during a wait surfaces [`BackOffError::Interrupted`], which
//! the executor treats as terminal.

use crate::config::{BackOffDelayMs, BackOffMultiplier, MaxBackOffDelayMs};
use crate::errors::BackOffError;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Inter-attempt delay strategy.
#[async_trait]
pub trait BackOffPolicy: Send + Sync {
    /// Per-execution timing state, created fresh by [`start`](Self::start).
    type State: Send;

    /// Begins a new backoff sequence for one execution.
    fn start(&self) -> Self::State;

    /// Waits before the next attempt. Invoked only between a failed attempt
    /// and a permitted next one.
    async fn back_off(&self, state: &mut Self::State) -> Result<(), BackOffError>;
}

/// No delay between attempts; the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackOffPolicy;

#[async_trait]
impl BackOffPolicy for NoBackOffPolicy {
    type State = ();

    fn start(&self) -> Self::State {}

    async fn back_off(&self, _state: &mut Self::State) -> Result<(), BackOffError> {
        // Yield so zero-delay retry loops cannot starve the runtime.
        tokio::task::yield_now().await;
        Ok(())
    }
}

/// Waits a constant delay between attempts.
#[derive(Debug, Clone)]
pub struct FixedBackOffPolicy {
    delay: BackOffDelayMs,
    cancellation: Option<CancellationToken>,
}

impl FixedBackOffPolicy {
    /// A policy waiting `delay` between attempts.
    pub const fn new(delay: BackOffDelayMs) -> Self {
        Self {
            delay,
            cancellation: None,
        }
    }

    /// Makes waits interruptible through `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

#[async_trait]
impl BackOffPolicy for FixedBackOffPolicy {
    type State = ();

    fn start(&self) -> Self::State {}

    async fn back_off(&self, _state: &mut Self::State) -> Result<(), BackOffError> {
        let delay = self.delay.as_duration();
        debug!(?delay, "backing off before next attempt");
        sleep_interruptible(delay, self.cancellation.as_ref()).await
    }
}

/// Waits an exponentially growing delay between attempts.
///
/// The delay starts at `initial_delay`, is multiplied by `multiplier` after
/// each wait, and never exceeds `max_delay`. Optional jitter spreads each
/// wait by up to ±25% to avoid thundering-herd retries from concurrent
/// executions.
#[derive(Debug, Clone)]
pub struct ExponentialBackOffPolicy {
    initial_delay: BackOffDelayMs,
    max_delay: MaxBackOffDelayMs,
    multiplier: BackOffMultiplier,
    jitter: bool,
    cancellation: Option<CancellationToken>,
}

/// Timing state of one execution under [`ExponentialBackOffPolicy`].
#[derive(Debug)]
pub struct ExponentialBackOffState {
    next_delay: Duration,
}

impl ExponentialBackOffState {
    /// The delay the next wait will use (before jitter and capping).
    pub const fn next_delay(&self) -> Duration {
        self.next_delay
    }
}

impl ExponentialBackOffPolicy {
    /// A policy starting at `initial_delay` with the default growth factor
    /// and ceiling.
    pub fn new(initial_delay: BackOffDelayMs) -> Self {
        Self {
            initial_delay,
            max_delay: MaxBackOffDelayMs::default(),
            multiplier: BackOffMultiplier::default(),
            jitter: false,
            cancellation: None,
        }
    }

    /// Sets the delay ceiling.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: MaxBackOffDelayMs) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the growth factor applied after each wait.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: BackOffMultiplier) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Spreads each wait by up to ±25%.
    #[must_use]
    pub const fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Makes waits interruptible through `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn grown(&self, delay: Duration) -> Duration {
        let grown = delay.as_secs_f64() * f64::from(self.multiplier);
        Duration::from_secs_f64(grown.min(self.max_delay.as_duration().as_secs_f64()))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn jittered(delay: Duration) -> Duration {
        use rand::Rng;

        let base_ms = delay.as_millis() as f64;
        // ±25% of the nominal delay
        let jitter = base_ms * 0.25 * (rand::rng().random::<f64>() - 0.5) * 2.0;
        Duration::from_millis((base_ms + jitter).max(0.0) as u64)
    }
}

impl Default for ExponentialBackOffPolicy {
    /// 100ms initial delay, doubling per wait, capped at 30s.
    fn default() -> Self {
        Self::new(BackOffDelayMs::try_new(100).unwrap())
    }
}

#[async_trait]
impl BackOffPolicy for ExponentialBackOffPolicy {
    type State = ExponentialBackOffState;

    fn start(&self) -> Self::State {
        ExponentialBackOffState {
            next_delay: self.initial_delay.as_duration(),
        }
    }

    async fn back_off(&self, state: &mut Self::State) -> Result<(), BackOffError> {
        let nominal = state.next_delay.min(self.max_delay.as_duration());
        state.next_delay = self.grown(nominal);

        let delay = if self.jitter {
            Self::jittered(nominal)
        } else {
            nominal
        };
        debug!(?delay, "backing off before next attempt");
        sleep_interruptible(delay, self.cancellation.as_ref()).await
    }
}

/// Sleeps for `delay`, racing the cancellation token when one is attached.
async fn sleep_interruptible(
    delay: Duration,
    cancellation: Option<&CancellationToken>,
) -> Result<(), BackOffError> {
    match cancellation {
        Some(token) => tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            () = token.cancelled() => {
                debug!("backoff wait cancelled");
                Err(BackOffError::Interrupted)
            }
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
