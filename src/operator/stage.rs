//! The reusable operator stage.
//!
//! Every transforming operator sits between an upstream publisher and a
//! downstream subscriber. Toward upstream it is a subscriber; toward
//! downstream it is the subscription. [`Stage`] holds the state that shape
//! needs regardless of what the operator does with values:
//!
//! - the lifecycle [`StageStatus`]
//! - the upstream subscription, released on cancel or upstream completion
//! - a weak handle to the downstream subscriber
//! - a [`DeliveryGuard`] that rejects same-thread re-entry
//!
//! The state mutex is never held while calling upstream, downstream, or a
//! scheduler. Operators read what they need, release the lock, then act.

use crate::error::ProtocolViolation;
use crate::subscription::Subscription;
use crate::tracing_compat::{debug, error, trace};
use crate::types::Demand;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};

/// Lifecycle of a stage.
///
/// ```text
/// AwaitingSubscription ──subscription──▶ Active ──completion──▶ Completing ──delivered──▶ Terminated
///          │                               │                        │
///          └───────────cancel──────────────┴─────────cancel─────────┴────────────────────▶ Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageStatus {
    /// Waiting for the upstream subscription.
    AwaitingSubscription,
    /// Linked upstream; values flow.
    Active,
    /// Upstream has completed; the terminal event is on its way downstream.
    Completing,
    /// Cancelled, or the terminal event was delivered.
    Terminated,
}

impl StageStatus {
    /// Returns true once nothing more will reach downstream.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingSubscription => "awaiting subscription",
            Self::Active => "active",
            Self::Completing => "completing",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Detects re-entrant delivery on one thread and serialises delivery across
/// threads.
///
/// The inner flag is set for the duration of a delivery. A second
/// [`enter`](Self::enter) on the thread that already holds the lock sees the
/// flag and panics; other threads block until the delivery finishes.
pub struct DeliveryGuard {
    delivering: ReentrantMutex<Cell<bool>>,
}

impl DeliveryGuard {
    /// Creates an idle guard.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delivering: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Marks the start of a delivery for `stage`.
    ///
    /// # Panics
    ///
    /// Panics with [`ProtocolViolation::ReentrantDelivery`] if this thread is
    /// already delivering through the same guard.
    pub fn enter(&self, stage: &'static str) -> DeliveryScope<'_> {
        let held = self.delivering.lock();
        if held.replace(true) {
            drop(held);
            let violation = ProtocolViolation::ReentrantDelivery { stage };
            error!(stage, "{violation}");
            panic!("{violation}");
        }
        DeliveryScope { held }
    }

    /// Returns true while some thread is inside a delivery.
    #[must_use]
    pub fn is_delivering(&self) -> bool {
        self.delivering
            .try_lock()
            .map_or(true, |held| held.get())
    }
}

impl Default for DeliveryGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeliveryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryGuard")
            .field("delivering", &self.is_delivering())
            .finish()
    }
}

/// An active delivery. Dropping it lets the next delivery in.
pub struct DeliveryScope<'a> {
    held: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for DeliveryScope<'_> {
    fn drop(&mut self) {
        self.held.set(false);
    }
}

impl fmt::Debug for DeliveryScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryScope").finish_non_exhaustive()
    }
}

struct StageState<S> {
    status: StageStatus,
    upstream: Option<Arc<dyn Subscription>>,
    downstream: Weak<S>,
}

/// Shared state of one operator stage, generic over the downstream
/// subscriber type `S`.
pub struct Stage<S> {
    name: &'static str,
    state: Mutex<StageState<S>>,
    guard: DeliveryGuard,
}

impl<S> Stage<S> {
    /// Creates a stage named `name` that will deliver to `downstream`.
    ///
    /// Only a weak handle is kept: the caller of `subscribe` owns the
    /// subscriber.
    #[must_use]
    pub fn new(name: &'static str, downstream: &Arc<S>) -> Self {
        Self {
            name,
            state: Mutex::new(StageState {
                status: StageStatus::AwaitingSubscription,
                upstream: None,
                downstream: Arc::downgrade(downstream),
            }),
            guard: DeliveryGuard::new(),
        }
    }

    /// Operator name used in logs and protocol violations.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        self.state.lock().status
    }

    /// Returns true while upstream values should be accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status() == StageStatus::Active
    }

    /// Upgrades the downstream handle. `None` after cancel, after the
    /// terminal event, or once the subscriber's owner dropped it.
    #[must_use]
    pub fn downstream(&self) -> Option<Arc<S>> {
        self.state.lock().downstream.upgrade()
    }

    /// Stores the upstream subscription and moves to [`StageStatus::Active`].
    ///
    /// Returns false if the stage is already terminated; the subscription
    /// is cancelled and dropped.
    ///
    /// # Panics
    ///
    /// Panics with [`ProtocolViolation::DuplicateSubscription`] if the stage
    /// is active or completing. The extra subscription is cancelled first.
    pub fn attach_upstream(&self, subscription: Arc<dyn Subscription>) -> bool {
        let mut state = self.state.lock();
        let status = state.status;
        if status == StageStatus::AwaitingSubscription {
            state.status = StageStatus::Active;
            state.upstream = Some(subscription);
            drop(state);
            trace!(stage = self.name, "stage: upstream attached");
            return true;
        }
        drop(state);
        subscription.cancel();

        if status == StageStatus::Terminated {
            debug!(stage = self.name, "stage: subscription after termination, cancelled");
            return false;
        }
        let violation = ProtocolViolation::DuplicateSubscription {
            stage: self.name,
            status,
        };
        error!(stage = self.name, %status, "{violation}");
        panic!("{violation}");
    }

    /// Moves from [`StageStatus::Active`] to [`StageStatus::Completing`] and
    /// releases the upstream subscription.
    ///
    /// Returns false, changing nothing, in any other status.
    pub fn begin_completion(&self) -> bool {
        let released = {
            let mut state = self.state.lock();
            if state.status != StageStatus::Active {
                return false;
            }
            state.status = StageStatus::Completing;
            state.upstream.take()
        };
        drop(released);
        trace!(stage = self.name, "stage: upstream completed");
        true
    }

    /// Moves from [`StageStatus::Completing`] to [`StageStatus::Terminated`]
    /// and hands back the downstream subscriber for the terminal event.
    ///
    /// Returns `None` if the stage is not completing (it was cancelled) or
    /// the subscriber is gone.
    pub fn finish(&self) -> Option<Arc<S>> {
        let mut state = self.state.lock();
        if state.status != StageStatus::Completing {
            return None;
        }
        state.status = StageStatus::Terminated;
        let downstream = std::mem::take(&mut state.downstream);
        drop(state);
        trace!(stage = self.name, "stage: terminated after completion");
        downstream.upgrade()
    }

    /// Forwards `demand` to the upstream subscription, if one is held.
    pub fn request_upstream(&self, demand: Demand) {
        let upstream = self.state.lock().upstream.clone();
        if let Some(upstream) = upstream {
            trace!(stage = self.name, %demand, "stage: forwarding demand");
            upstream.request(demand);
        }
    }

    /// Cancels the stage: cancels and releases upstream, forgets downstream.
    ///
    /// Idempotent. Upstream is cancelled at most once.
    pub fn cancel(&self) {
        let upstream = {
            let mut state = self.state.lock();
            if state.status == StageStatus::Terminated {
                return;
            }
            state.status = StageStatus::Terminated;
            state.downstream = Weak::new();
            state.upstream.take()
        };
        debug!(stage = self.name, "stage: cancelled");
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }

    /// Runs `deliver` inside the stage's delivery guard.
    ///
    /// # Panics
    ///
    /// Panics with [`ProtocolViolation::ReentrantDelivery`] if called from
    /// within another delivery of the same stage on this thread.
    pub fn deliver<R>(&self, deliver: impl FnOnce() -> R) -> R {
        let _scope = self.guard.enter(self.name);
        deliver()
    }

    /// Hands a value-carrying event to downstream inside the delivery guard.
    ///
    /// Liveness is checked after the guard is taken, so a delivery that was
    /// waiting on another thread's delivery sees a cancel or terminal event
    /// that happened meanwhile. Returns `None`, without calling `deliver`,
    /// once the stage is terminated or the subscriber is gone.
    ///
    /// # Panics
    ///
    /// Panics with [`ProtocolViolation::ReentrantDelivery`] on same-thread
    /// re-entry.
    pub fn deliver_to<R>(&self, deliver: impl FnOnce(Arc<S>) -> R) -> Option<R> {
        let _scope = self.guard.enter(self.name);
        let downstream = {
            let state = self.state.lock();
            if state.status.is_terminal() {
                return None;
            }
            state.downstream.upgrade()
        }?;
        Some(deliver(downstream))
    }

    /// Terminates the stage and hands the terminal event to downstream,
    /// both inside the delivery guard.
    ///
    /// Returns `None`, without calling `deliver`, if the stage is not
    /// completing or the subscriber is gone. See [`finish`](Self::finish).
    ///
    /// # Panics
    ///
    /// Panics with [`ProtocolViolation::ReentrantDelivery`] on same-thread
    /// re-entry.
    pub fn finish_to<R>(&self, deliver: impl FnOnce(Arc<S>) -> R) -> Option<R> {
        let _scope = self.guard.enter(self.name);
        let downstream = self.finish()?;
        Some(deliver(downstream))
    }
}

impl<S> fmt::Debug for Stage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("status", &state.status)
            .field("has_upstream", &state.upstream.is_some())
            .field("has_downstream", &(state.downstream.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{SubscriptionEvent, TrackingSubscriber, TrackingSubscription};
    use crate::test_utils::init_test_logging;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    type Downstream = TrackingSubscriber<i32, ()>;

    fn stage_with_downstream() -> (Stage<Downstream>, Arc<Downstream>) {
        let downstream = Arc::new(Downstream::new());
        (Stage::new("test", &downstream), downstream)
    }

    #[test]
    fn lifecycle_to_termination() {
        init_test("lifecycle_to_termination");
        let (stage, downstream) = stage_with_downstream();
        let upstream = Arc::new(TrackingSubscription::new());
        assert_eq!(stage.status(), StageStatus::AwaitingSubscription);

        assert!(stage.attach_upstream(upstream.clone()));
        crate::assert_with_log!(
            stage.is_active(),
            "active after subscription",
            StageStatus::Active,
            stage.status()
        );

        stage.request_upstream(Demand::max(3));
        assert!(stage.begin_completion());
        assert!(!stage.begin_completion());
        assert_eq!(stage.status(), StageStatus::Completing);

        // Upstream is released once completion arrives.
        stage.request_upstream(Demand::max(1));
        assert_eq!(upstream.history(), vec![SubscriptionEvent::Requested(Demand::max(3))]);

        let target = stage.finish().expect("downstream alive");
        assert!(Arc::ptr_eq(&target, &downstream));
        assert_eq!(stage.status(), StageStatus::Terminated);
        assert!(stage.finish().is_none());
        assert!(stage.downstream().is_none());
        crate::test_complete!("lifecycle_to_termination");
    }

    #[test]
    fn cancel_is_idempotent() {
        init_test("cancel_is_idempotent");
        let (stage, _downstream) = stage_with_downstream();
        let upstream = Arc::new(TrackingSubscription::new());
        stage.attach_upstream(upstream.clone());

        stage.cancel();
        stage.cancel();
        stage.request_upstream(Demand::Unlimited);

        assert_eq!(upstream.history(), vec![SubscriptionEvent::Cancelled]);
        assert_eq!(stage.status(), StageStatus::Terminated);
        assert!(stage.downstream().is_none());
        crate::test_complete!("cancel_is_idempotent");
    }

    #[test]
    fn cancel_while_completing_suppresses_terminal_event() {
        let (stage, _downstream) = stage_with_downstream();
        let upstream = Arc::new(TrackingSubscription::new());
        stage.attach_upstream(upstream.clone());
        stage.begin_completion();
        stage.cancel();

        assert!(stage.finish().is_none());
        // Upstream was already released by the completion.
        assert!(upstream.history().is_empty());
    }

    #[test]
    fn subscription_after_cancel_is_cancelled_quietly() {
        let (stage, _downstream) = stage_with_downstream();
        stage.cancel();

        let late = Arc::new(TrackingSubscription::new());
        assert!(!stage.attach_upstream(late.clone()));
        assert_eq!(late.history(), vec![SubscriptionEvent::Cancelled]);
        assert_eq!(stage.status(), StageStatus::Terminated);
    }

    #[test]
    #[should_panic(expected = "second upstream subscription while active")]
    fn second_subscription_panics() {
        let (stage, _downstream) = stage_with_downstream();
        stage.attach_upstream(Arc::new(TrackingSubscription::new()));
        stage.attach_upstream(Arc::new(TrackingSubscription::new()));
    }

    #[test]
    fn second_subscription_is_cancelled_before_panicking() {
        let (stage, _downstream) = stage_with_downstream();
        let first = Arc::new(TrackingSubscription::new());
        let extra = Arc::new(TrackingSubscription::new());
        stage.attach_upstream(first.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            stage.attach_upstream(extra.clone());
        }));
        assert!(result.is_err());
        assert_eq!(extra.history(), vec![SubscriptionEvent::Cancelled]);
        assert!(first.history().is_empty());
        assert!(stage.is_active());
    }

    #[test]
    fn downstream_is_weak() {
        let (stage, downstream) = stage_with_downstream();
        assert!(stage.downstream().is_some());
        drop(downstream);
        assert!(stage.downstream().is_none());
    }

    #[test]
    fn sequential_deliveries_are_allowed() {
        let (stage, _downstream) = stage_with_downstream();
        assert_eq!(stage.deliver(|| 1), 1);
        assert_eq!(stage.deliver(|| 2), 2);
        assert!(!stage.guard.is_delivering());
    }

    #[test]
    fn deliver_to_skips_terminated_stage() {
        init_test("deliver_to_skips_terminated_stage");
        let (stage, downstream) = stage_with_downstream();
        stage.attach_upstream(Arc::new(TrackingSubscription::new()));

        let target = stage.deliver_to(|target| target);
        assert!(target.is_some_and(|target| Arc::ptr_eq(&target, &downstream)));

        stage.cancel();
        let mut called = false;
        assert!(stage.deliver_to(|_| called = true).is_none());
        assert!(!called);
        crate::test_complete!("deliver_to_skips_terminated_stage");
    }

    #[test]
    fn delivery_waiting_on_guard_observes_cancel() {
        init_test("delivery_waiting_on_guard_observes_cancel");
        let (stage, _downstream) = stage_with_downstream();
        let stage = Arc::new(stage);
        stage.attach_upstream(Arc::new(TrackingSubscription::new()));

        let scope = stage.guard.enter("test");
        let waiting = Arc::clone(&stage);
        let handle = std::thread::spawn(move || waiting.deliver_to(|_| ()).is_some());
        std::thread::sleep(std::time::Duration::from_millis(10));
        stage.cancel();
        drop(scope);

        let delivered = handle.join().expect("waiting thread completes");
        crate::assert_with_log!(!delivered, "no delivery after cancel", false, delivered);
        crate::test_complete!("delivery_waiting_on_guard_observes_cancel");
    }

    #[test]
    fn finish_to_delivers_terminal_event_once() {
        let (stage, downstream) = stage_with_downstream();
        stage.attach_upstream(Arc::new(TrackingSubscription::new()));
        assert!(stage.finish_to(|_| ()).is_none());

        stage.begin_completion();
        let target = stage.finish_to(|target| target);
        assert!(target.is_some_and(|target| Arc::ptr_eq(&target, &downstream)));
        assert!(stage.finish_to(|_| ()).is_none());
        assert!(stage.deliver_to(|_| ()).is_none());
    }

    #[test]
    #[should_panic(expected = "reentrant delivery into non-reentrant stage `test`")]
    fn nested_delivery_panics() {
        let (stage, _downstream) = stage_with_downstream();
        stage.deliver(|| stage.deliver(|| ()));
    }

    #[test]
    fn guard_resets_after_panicking_delivery() {
        let guard = DeliveryGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = guard.enter("test");
            panic!("downstream failed");
        }));
        assert!(result.is_err());
        assert!(!guard.is_delivering());
        drop(guard.enter("test"));
    }

    #[test]
    fn other_threads_wait_for_delivery() {
        let guard = Arc::new(DeliveryGuard::new());
        let scope = guard.enter("test");
        let remote = Arc::clone(&guard);
        let handle = std::thread::spawn(move || {
            drop(remote.enter("test"));
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(!handle.is_finished());
        drop(scope);
        handle.join().expect("waiting thread completes");
    }

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(StageStatus::Active.to_string(), "active");
        assert_eq!(
            StageStatus::AwaitingSubscription.to_string(),
            "awaiting subscription"
        );
        assert!(StageStatus::Terminated.is_terminal());
        assert!(!StageStatus::Completing.is_terminal());
    }
}
