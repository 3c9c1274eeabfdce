//! Deterministic virtual-time scheduler.
//!
//! Time never moves on its own. Actions queue up with a fire time; a test
//! advances the clock by draining them with
//! [`execute_scheduled_actions`](VirtualTimeScheduler::execute_scheduled_actions)
//! or [`execute_scheduled_actions_until`](VirtualTimeScheduler::execute_scheduled_actions_until).
//!
//! # Ordering
//!
//! Actions run in `(fire time, insertion sequence)` order. Two actions due at
//! the same instant run in the order they were scheduled (stable FIFO).
//!
//! # Call history
//!
//! Every call through the [`Scheduler`] trait is appended to a history log so
//! tests can assert exactly how an operator used the scheduler.
//!
//! ```
//! use backflow::lab::{SchedulerCall, VirtualTimeScheduler};
//! use backflow::scheduler::Scheduler;
//! use backflow::types::Time;
//! use std::time::Duration;
//!
//! let scheduler = VirtualTimeScheduler::default();
//! let at = scheduler.now() + Duration::from_nanos(200);
//! scheduler.schedule_after(at, Duration::from_nanos(5), None, Box::new(|| {}));
//! scheduler.execute_scheduled_actions();
//!
//! assert_eq!(scheduler.current_time(), Time::from_nanos(200));
//! assert_eq!(
//!     scheduler.history(),
//!     vec![
//!         SchedulerCall::Now,
//!         SchedulerCall::ScheduleAfter { at, tolerance: Duration::from_nanos(5) },
//!     ]
//! );
//! ```

use super::config::VirtualTimeConfig;
use crate::error::ConfigResult;
use crate::scheduler::{Action, CancelToken, Cancellable, Scheduler};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::Time;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// One recorded call into the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerCall {
    /// `now()`.
    Now,
    /// `minimum_tolerance()`.
    MinimumTolerance,
    /// `schedule(..)`.
    Schedule,
    /// `schedule_after(at, tolerance, ..)`.
    ScheduleAfter {
        /// Requested fire time.
        at: Time,
        /// Requested tolerance.
        tolerance: Duration,
    },
}

/// Options accepted by the virtual scheduler. Carries nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualSchedulerOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ActionKey {
    fire_at: Time,
    seq: u64,
}

struct VirtualState {
    now: Time,
    next_seq: u64,
    queue: BTreeMap<ActionKey, Action>,
    history: Vec<SchedulerCall>,
}

impl VirtualState {
    fn enqueue(&mut self, fire_at: Time, action: Action) -> ActionKey {
        let key = ActionKey {
            fire_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.insert(key, action);
        key
    }
}

struct Shared {
    state: Mutex<VirtualState>,
    config: VirtualTimeConfig,
}

/// A manually advanced scheduler.
///
/// Cloning yields another handle to the same clock and queue.
///
/// # Pending actions and reference cycles
///
/// Queued actions are owned by the scheduler. An action that captures a
/// handle to this scheduler, directly or through an operator holding one,
/// keeps the queue alive for as long as it is pending, so dropping every
/// outside handle does not free it. Drain the queue or call
/// [`discard_pending`](Self::discard_pending) before letting go.
#[derive(Clone)]
pub struct VirtualTimeScheduler {
    shared: Arc<Shared>,
}

impl VirtualTimeScheduler {
    /// Creates a scheduler whose clock starts at `config.epoch`.
    ///
    /// Fails if `config` does not pass [`VirtualTimeConfig::validate`].
    pub fn new(config: VirtualTimeConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: VirtualTimeConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(VirtualState {
                    now: config.epoch,
                    next_seq: 0,
                    queue: BTreeMap::new(),
                    history: Vec::new(),
                }),
                config,
            }),
        }
    }

    /// Returns the configuration this scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &VirtualTimeConfig {
        &self.shared.config
    }

    /// Reads the clock without recording a call.
    #[must_use]
    pub fn current_time(&self) -> Time {
        self.shared.state.lock().now
    }

    /// Returns a copy of the call history.
    #[must_use]
    pub fn history(&self) -> Vec<SchedulerCall> {
        self.shared.state.lock().history.clone()
    }

    /// Forgets all recorded calls.
    pub fn clear_history(&self) {
        self.shared.state.lock().history.clear();
    }

    /// Fire times of pending actions, in execution order.
    #[must_use]
    pub fn scheduled_dates(&self) -> Vec<Time> {
        self.shared
            .state
            .lock()
            .queue
            .keys()
            .map(|key| key.fire_at)
            .collect()
    }

    /// Number of pending actions.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Drops every pending action without running it and returns how many
    /// were dropped. The clock does not move.
    ///
    /// Actions are dropped after the queue lock is released, so captured
    /// state may touch the scheduler from its destructor.
    pub fn discard_pending(&self) -> usize {
        let discarded = std::mem::take(&mut self.shared.state.lock().queue);
        let count = discarded.len();
        drop(discarded);
        debug!(count, "virtual scheduler: pending actions discarded");
        count
    }

    /// Runs queued actions in order, advancing the clock to each one's fire
    /// time, until the queue is empty or the per-drain cap is reached.
    ///
    /// Actions scheduled by running actions are picked up by the same drain.
    /// Returns the number of actions run.
    pub fn execute_scheduled_actions(&self) -> usize {
        self.drain(None)
    }

    /// Runs actions due at or before `deadline`, then moves the clock to
    /// `deadline` if everything due by then has run.
    ///
    /// The clock never moves backwards.
    pub fn execute_scheduled_actions_until(&self, deadline: Time) -> usize {
        let executed = self.drain(Some(deadline));
        let mut state = self.shared.state.lock();
        let due_left = state
            .queue
            .keys()
            .next()
            .is_some_and(|key| key.fire_at <= deadline);
        if !due_left && state.now < deadline {
            state.now = deadline;
        }
        executed
    }

    /// Advances the clock by `duration`, running everything that comes due.
    pub fn advance_by(&self, duration: Duration) -> usize {
        let deadline = self.current_time() + duration;
        self.execute_scheduled_actions_until(deadline)
    }

    fn drain(&self, deadline: Option<Time>) -> usize {
        let cap = self.shared.config.max_actions_per_drain;
        let mut executed = 0_usize;
        loop {
            if cap.is_some_and(|cap| executed >= cap) {
                warn!(
                    executed,
                    pending = self.pending_count(),
                    "virtual scheduler: action cap reached, leaving remaining actions queued"
                );
                break;
            }
            let action = {
                let mut state = self.shared.state.lock();
                let Some(entry) = state.queue.first_entry() else {
                    break;
                };
                if deadline.is_some_and(|deadline| entry.key().fire_at > deadline) {
                    break;
                }
                let (key, action) = entry.remove_entry();
                if key.fire_at > state.now {
                    state.now = key.fire_at;
                }
                trace!(fire_at = %key.fire_at, seq = key.seq, "virtual scheduler: running action");
                action
            };
            action();
            executed += 1;
        }
        debug!(executed, now = %self.current_time(), "virtual scheduler: drain finished");
        executed
    }

    fn record(&self, call: SchedulerCall) {
        self.shared.state.lock().history.push(call);
    }
}

impl Default for VirtualTimeScheduler {
    fn default() -> Self {
        Self::with_valid_config(VirtualTimeConfig::default())
    }
}

impl fmt::Debug for VirtualTimeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("VirtualTimeScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .field("recorded_calls", &state.history.len())
            .finish()
    }
}

struct PendingAction {
    shared: Weak<Shared>,
    key: ActionKey,
}

impl Cancellable for PendingAction {
    fn cancel(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let removed = shared.state.lock().queue.remove(&self.key);
        if removed.is_some() {
            trace!(fire_at = %self.key.fire_at, seq = self.key.seq, "virtual scheduler: action cancelled");
        }
        drop(removed);
    }
}

impl Scheduler for VirtualTimeScheduler {
    type Options = VirtualSchedulerOptions;

    fn now(&self) -> Time {
        let mut state = self.shared.state.lock();
        state.history.push(SchedulerCall::Now);
        state.now
    }

    fn minimum_tolerance(&self) -> Duration {
        self.record(SchedulerCall::MinimumTolerance);
        self.shared.config.minimum_tolerance
    }

    fn schedule(&self, _options: Option<&VirtualSchedulerOptions>, action: Action) {
        let mut state = self.shared.state.lock();
        state.history.push(SchedulerCall::Schedule);
        let now = state.now;
        state.enqueue(now, action);
    }

    fn schedule_after(
        &self,
        at: Time,
        tolerance: Duration,
        _options: Option<&VirtualSchedulerOptions>,
        action: Action,
    ) -> CancelToken {
        let key = {
            let mut state = self.shared.state.lock();
            state
                .history
                .push(SchedulerCall::ScheduleAfter { at, tolerance });
            state.enqueue(at, action)
        };
        CancelToken::new(Arc::new(PendingAction {
            shared: Arc::downgrade(&self.shared),
            key,
        }))
    }
}
