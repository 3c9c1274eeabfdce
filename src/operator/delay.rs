//! Time-shifting operator: every event arrives `interval` later.
//!
//! Each upstream value is handed to the scheduler on its own, so there is no
//! buffer and no demand accounting here. Demand from downstream goes upstream
//! unchanged; the delay moves values in time, never in number.
//!
//! ```text
//! upstream ──value──▶ DelayInner ──schedule_after(now + interval)──▶ scheduler
//!                                                                       │
//! downstream ◀──────────────────────── deliver ◀────────────────────────┘
//! ```

use super::stage::{Stage, StageStatus};
use crate::scheduler::Scheduler;
use crate::subscription::{Publisher, Subscriber, Subscription};
use crate::tracing_compat::trace;
use crate::types::{Completion, Demand};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

const STAGE_NAME: &str = "delay";

/// Publisher returned by [`PublisherExt::delay`](super::PublisherExt::delay).
pub struct Delay<P, Sch: Scheduler> {
    upstream: P,
    interval: Duration,
    tolerance: Duration,
    scheduler: Sch,
    options: Option<Sch::Options>,
}

impl<P, Sch: Scheduler> Delay<P, Sch> {
    /// Wraps `upstream`.
    ///
    /// With no explicit `tolerance`, asks the scheduler for its minimum
    /// tolerance once, here.
    pub fn new(
        upstream: P,
        interval: Duration,
        tolerance: Option<Duration>,
        scheduler: Sch,
        options: Option<Sch::Options>,
    ) -> Self {
        let tolerance = tolerance.unwrap_or_else(|| scheduler.minimum_tolerance());
        Self {
            upstream,
            interval,
            tolerance,
            scheduler,
            options,
        }
    }

    /// How far each event is shifted.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Slack passed to every `schedule_after` call.
    #[must_use]
    pub const fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// The wrapped publisher.
    #[must_use]
    pub const fn upstream(&self) -> &P {
        &self.upstream
    }
}

impl<P, Sch: Scheduler> fmt::Debug for Delay<P, Sch> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delay")
            .field("interval", &self.interval)
            .field("tolerance", &self.tolerance)
            .field("has_options", &self.options.is_some())
            .finish_non_exhaustive()
    }
}

impl<P, Sch> Publisher for Delay<P, Sch>
where
    P: Publisher,
    P::Output: Send + 'static,
    P::Failure: Send + 'static,
    Sch: Scheduler + Clone,
{
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = Self::Output, Failure = Self::Failure> + 'static,
    {
        let inner = DelayInner::new(
            &subscriber,
            self.interval,
            self.tolerance,
            self.scheduler.clone(),
            self.options.clone(),
        );
        self.upstream.subscribe(inner);
    }
}

/// One subscription's worth of delay state.
///
/// Upstream holds it as its subscriber; downstream holds it as its
/// subscription. Scheduled closures hold it strongly, so pending work
/// outlives upstream letting go, while downstream is only reached through
/// the stage's weak handle.
struct DelayInner<S, Sch: Scheduler> {
    this: Weak<Self>,
    stage: Stage<S>,
    interval: Duration,
    tolerance: Duration,
    scheduler: Sch,
    options: Option<Sch::Options>,
}

impl<S, Sch> DelayInner<S, Sch>
where
    S: Subscriber + 'static,
    S::Input: Send + 'static,
    S::Failure: Send + 'static,
    Sch: Scheduler,
{
    fn new(
        downstream: &Arc<S>,
        interval: Duration,
        tolerance: Duration,
        scheduler: Sch,
        options: Option<Sch::Options>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            stage: Stage::new(STAGE_NAME, downstream),
            interval,
            tolerance,
            scheduler,
            options,
        })
    }

    fn announce(self: Arc<Self>) {
        if self.stage.status() != StageStatus::Active {
            trace!("delay: stage no longer active, subscription not announced");
            return;
        }
        let Some(downstream) = self.stage.downstream() else {
            trace!("delay: downstream gone, subscription not announced");
            return;
        };
        downstream.receive_subscription(self);
    }

    fn deliver_value(&self, value: S::Input) {
        let Some(demand) = self
            .stage
            .deliver_to(|downstream| downstream.receive(value))
        else {
            trace!("delay: stage terminated or downstream gone, value dropped");
            return;
        };
        if demand > Demand::NONE {
            self.stage.request_upstream(demand);
        }
    }

    fn deliver_completion(&self, completion: Completion<S::Failure>) {
        if self
            .stage
            .finish_to(|downstream| downstream.receive_completion(completion))
            .is_none()
        {
            trace!("delay: stage cancelled or downstream gone, completion dropped");
        }
    }

    fn schedule_delayed(&self, action: impl FnOnce(Arc<Self>) + Send + 'static) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let at = self.scheduler.now() + self.interval;
        trace!(fire_at = %at, "delay: event scheduled");
        self.scheduler.schedule_after(
            at,
            self.tolerance,
            self.options.as_ref(),
            Box::new(move || action(this)),
        );
    }
}

impl<S, Sch> Subscriber for DelayInner<S, Sch>
where
    S: Subscriber + 'static,
    S::Input: Send + 'static,
    S::Failure: Send + 'static,
    Sch: Scheduler,
{
    type Input = S::Input;
    type Failure = S::Failure;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        if !self.stage.attach_upstream(subscription) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        self.scheduler
            .schedule(self.options.as_ref(), Box::new(move || this.announce()));
    }

    fn receive(&self, input: S::Input) -> Demand {
        if self.stage.is_active() {
            self.schedule_delayed(move |this| this.deliver_value(input));
        } else {
            trace!(status = %self.stage.status(), "delay: value outside active status dropped");
        }
        Demand::NONE
    }

    fn receive_completion(&self, completion: Completion<S::Failure>) {
        if !self.stage.begin_completion() {
            trace!(status = %self.stage.status(), "delay: extra completion dropped");
            return;
        }
        self.schedule_delayed(move |this| this.deliver_completion(completion));
    }
}

impl<S, Sch> Subscription for DelayInner<S, Sch>
where
    S: Subscriber + 'static,
    Sch: Scheduler,
{
    fn request(&self, demand: Demand) {
        self.stage.request_upstream(demand);
    }

    fn cancel(&self) {
        self.stage.cancel();
    }
}
