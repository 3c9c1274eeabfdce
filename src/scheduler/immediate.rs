//! A scheduler that runs everything inline.

use super::{Action, CancelToken, Scheduler};
use crate::types::Time;
use crate::types::time::duration_to_nanos_saturating;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Runs every action synchronously on the calling thread.
///
/// Requested fire times are ignored: "later" means "now". This is the
/// execution model in which reentrancy bugs surface, because a stage's
/// downstream delivery happens inside the upstream call that triggered it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    /// Returns the scheduler.
    #[must_use]
    pub const fn shared() -> Self {
        Self
    }
}

impl Scheduler for ImmediateScheduler {
    type Options = ();

    fn now(&self) -> Time {
        let epoch = EPOCH.get_or_init(Instant::now);
        Time::from_nanos(duration_to_nanos_saturating(epoch.elapsed()))
    }

    fn minimum_tolerance(&self) -> Duration {
        Duration::ZERO
    }

    fn schedule(&self, _options: Option<&()>, action: Action) {
        action();
    }

    fn schedule_after(
        &self,
        _at: Time,
        _tolerance: Duration,
        _options: Option<&()>,
        action: Action,
    ) -> CancelToken {
        action();
        CancelToken::noop()
    }
}
