//! Per-execution retry state.
//!
//! A [`RetryContext`] tracks one logical attempt sequence: how many attempts
//! have failed, the most recent failure, and caller metadata. It is created
//! by [`RetryPolicy::open`](crate::policy::RetryPolicy::open), threaded by
//! reference through every policy and callback operation, and closed exactly
//! once when the execution ends.

use std::collections::HashMap;

/// Mutable state of one retry execution.
///
/// All per-execution mutable state lives here; policy objects stay free of
/// it, which is what makes a single policy instance safe to share across
/// concurrent executions.
#[derive(Debug)]
pub struct RetryContext<E> {
    /// Correlation id for tracing.
    execution_id: uuid::Uuid,
    /// Number of failed attempts so far. Monotonic within one execution.
    retry_count: u32,
    /// Most recent failure; `Some` iff at least one attempt has failed.
    last_error: Option<E>,
    /// Caller and policy metadata scoped to this execution.
    attributes: HashMap<String, String>,
}

impl<E> RetryContext<E> {
    /// Creates a fresh context with a zero retry count and a new execution id.
    pub fn new() -> Self {
        Self {
            execution_id: uuid::Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)),
            retry_count: 0,
            last_error: None,
            attributes: HashMap::new(),
        }
    }

    /// The correlation id of this execution.
    pub const fn execution_id(&self) -> uuid::Uuid {
        self.execution_id
    }

    /// Records a failed attempt: increments the retry count and stores the
    /// failure as the last error.
    pub fn record_failure(&mut self, error: E) {
        self.retry_count += 1;
        self.last_error = Some(error);
    }

    /// Number of failed attempts so far.
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The most recent failure, if any attempt has failed.
    pub const fn last_error(&self) -> Option<&E> {
        self.last_error.as_ref()
    }

    /// Takes ownership of the last failure for the exhaustion envelope.
    pub(crate) fn take_last_error(&mut self) -> Option<E> {
        self.last_error.take()
    }

    /// Attaches a metadata attribute to this execution.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Looks up a metadata attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl<E> Default for RetryContext<E> {
    fn default() -> Self {
        Self::new()
    }
}
