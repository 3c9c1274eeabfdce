//! The scheduler abstraction: *when* work runs.
//!
//! Operators never create threads and never block waiting for time to pass.
//! Anything that must happen later is handed to a [`Scheduler`] as an
//! [`Action`]. Whether the action then runs inline, on a worker thread, or on
//! the next manual drain of a virtual clock is the scheduler's business.
//!
//! Implementations in this crate:
//!
//! - [`ImmediateScheduler`]: runs every action inline, right away.
//! - [`VirtualTimeScheduler`](crate::lab::VirtualTimeScheduler): a manually
//!   advanced clock for deterministic tests.

mod immediate;

pub use immediate::ImmediateScheduler;

use crate::types::Time;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A unit of deferred work.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Something that can be cancelled.
pub trait Cancellable: Send + Sync {
    /// Cancels the underlying work. Idempotent.
    fn cancel(&self);
}

/// Handle returned by [`Scheduler::schedule_after`].
///
/// Cancelling prevents the action from firing if it has not fired yet.
/// Dropping the token does **not** cancel.
#[derive(Clone)]
pub struct CancelToken {
    inner: Option<Arc<dyn Cancellable>>,
}

impl CancelToken {
    /// Wraps a cancellable handle.
    #[must_use]
    pub fn new(inner: Arc<dyn Cancellable>) -> Self {
        Self { inner: Some(inner) }
    }

    /// A token with nothing behind it, for actions that already ran.
    #[must_use]
    pub const fn noop() -> Self {
        Self { inner: None }
    }

    /// Cancels the scheduled action if it is still pending.
    pub fn cancel(&self) {
        if let Some(inner) = &self.inner {
            inner.cancel();
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("noop", &self.inner.is_none())
            .finish()
    }
}

/// Decides when actions run.
///
/// Every method may be called from any thread. Implementations pick their own
/// execution context: inline, a worker, or a cooperative drain.
pub trait Scheduler: Send + Sync + 'static {
    /// Scheduler-specific knobs passed through by operators untouched.
    type Options: Clone + Send + Sync + 'static;

    /// Current instant on this scheduler's clock.
    fn now(&self) -> Time;

    /// Smallest tolerance this scheduler can honour.
    fn minimum_tolerance(&self) -> Duration;

    /// Runs `action` as soon as the execution model permits.
    fn schedule(&self, options: Option<&Self::Options>, action: Action);

    /// Runs `action` no earlier than `at`, allowing `tolerance` of slack.
    fn schedule_after(
        &self,
        at: Time,
        tolerance: Duration,
        options: Option<&Self::Options>,
        action: Action,
    ) -> CancelToken;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl Cancellable for Counter {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn token_forwards_cancel() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let token = CancelToken::new(counter.clone());
        token.clone().cancel();
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn noop_token_does_nothing() {
        let token = CancelToken::noop();
        token.cancel();
        assert!(format!("{token:?}").contains("noop: true"));
    }
}
