//! Recording test doubles for both ends of a subscription link.
//!
//! - [`TrackingSubscriber`]: records every event it receives, grants a
//!   configurable demand, and exposes hooks that run outside its locks.
//! - [`TrackingSubscription`]: records every `request`/`cancel`.
//! - [`ManualPublisher`]: a publisher driven by hand from the test body.

use crate::subscription::{Publisher, Subscriber, Subscription};
use crate::types::{Completion, Demand};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One event observed by a [`TrackingSubscriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingEvent<T, E> {
    /// A subscription arrived.
    Subscription,
    /// A value arrived.
    Value(T),
    /// The terminal event arrived.
    Completion(Completion<E>),
}

type ValueHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
type FinishHook<E> = Arc<dyn Fn(&Completion<E>) + Send + Sync>;

/// A subscriber that records what it sees.
pub struct TrackingSubscriber<T, E> {
    history: Mutex<Vec<TrackingEvent<T, E>>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    initial_demand: Option<Demand>,
    value_demand: Demand,
    on_value: Mutex<Option<ValueHook<T>>>,
    on_finish: Mutex<Option<FinishHook<E>>>,
    drop_flag: Option<Arc<AtomicBool>>,
}

impl<T, E> TrackingSubscriber<T, E> {
    /// Creates a subscriber that requests nothing on subscription and
    /// returns no extra demand per value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
            initial_demand: None,
            value_demand: Demand::NONE,
            on_value: Mutex::new(None),
            on_finish: Mutex::new(None),
            drop_flag: None,
        }
    }

    /// Requests `demand` as soon as the subscription arrives.
    #[must_use]
    pub fn with_initial_demand(mut self, demand: Demand) -> Self {
        self.initial_demand = Some(demand);
        self
    }

    /// Returns `demand` from every `receive`.
    #[must_use]
    pub fn with_value_demand(mut self, demand: Demand) -> Self {
        self.value_demand = demand;
        self
    }

    /// Sets `flag` to true when this subscriber is dropped.
    #[must_use]
    pub fn with_drop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.drop_flag = Some(flag);
        self
    }

    /// Installs a hook run after each value is recorded.
    pub fn set_on_value(&self, hook: impl Fn(&T) + Send + Sync + 'static) {
        *self.on_value.lock() = Some(Arc::new(hook));
    }

    /// Installs a hook run after the completion is recorded.
    pub fn set_on_finish(&self, hook: impl Fn(&Completion<E>) + Send + Sync + 'static) {
        *self.on_finish.lock() = Some(Arc::new(hook));
    }

    /// The subscription received, if any and not yet released.
    #[must_use]
    pub fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.subscription.lock().clone()
    }

    /// Requests `demand` through the held subscription.
    pub fn request(&self, demand: Demand) {
        let subscription = self.subscription();
        if let Some(subscription) = subscription {
            subscription.request(demand);
        }
    }

    /// Cancels and releases the held subscription.
    pub fn cancel(&self) {
        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<T: Clone, E: Clone> TrackingSubscriber<T, E> {
    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn history(&self) -> Vec<TrackingEvent<T, E>> {
        self.history.lock().clone()
    }
}

impl<T, E> Default for TrackingSubscriber<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Subscriber for TrackingSubscriber<T, E>
where
    T: Send,
    E: Send,
{
    type Input = T;
    type Failure = E;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        self.history.lock().push(TrackingEvent::Subscription);
        *self.subscription.lock() = Some(Arc::clone(&subscription));
        if let Some(demand) = self.initial_demand {
            subscription.request(demand);
        }
    }

    fn receive(&self, input: T) -> Demand {
        let hook = self.on_value.lock().clone();
        if let Some(hook) = hook {
            hook(&input);
        }
        self.history.lock().push(TrackingEvent::Value(input));
        self.value_demand
    }

    fn receive_completion(&self, completion: Completion<E>) {
        let hook = self.on_finish.lock().clone();
        if let Some(hook) = hook {
            hook(&completion);
        }
        self.history.lock().push(TrackingEvent::Completion(completion));
    }
}

impl<T, E> Drop for TrackingSubscriber<T, E> {
    fn drop(&mut self) {
        if let Some(flag) = &self.drop_flag {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl<T, E> fmt::Debug for TrackingSubscriber<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingSubscriber")
            .field("events", &self.history.lock().len())
            .field("subscribed", &self.subscription.lock().is_some())
            .field("initial_demand", &self.initial_demand)
            .field("value_demand", &self.value_demand)
            .finish_non_exhaustive()
    }
}

/// One call observed by a [`TrackingSubscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// `request(demand)`.
    Requested(Demand),
    /// `cancel()`.
    Cancelled,
}

/// A subscription that records calls and does nothing else.
#[derive(Debug, Default)]
pub struct TrackingSubscription {
    history: Mutex<Vec<SubscriptionEvent>>,
}

impl TrackingSubscription {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded call, including repeats.
    #[must_use]
    pub fn history(&self) -> Vec<SubscriptionEvent> {
        self.history.lock().clone()
    }
}

impl Subscription for TrackingSubscription {
    fn request(&self, demand: Demand) {
        self.history.lock().push(SubscriptionEvent::Requested(demand));
    }

    fn cancel(&self) {
        self.history.lock().push(SubscriptionEvent::Cancelled);
    }
}

type DynSubscriber<T, E> = Arc<dyn Subscriber<Input = T, Failure = E>>;

/// A publisher whose emissions are driven by the test.
///
/// Subscribing hands the subscriber a shared [`TrackingSubscription`] so the
/// test can see what the subscriber asked for. A [`deferred`](Self::deferred)
/// publisher holds the subscription back until
/// [`send_subscription`](Self::send_subscription), which lets tests exercise a
/// subscriber before it is linked.
pub struct ManualPublisher<T, E> {
    subscription: Arc<TrackingSubscription>,
    subscriber: Mutex<Option<DynSubscriber<T, E>>>,
    auto_subscribe: bool,
}

impl<T, E> ManualPublisher<T, E> {
    /// Creates a publisher with no subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscription: Arc::new(TrackingSubscription::new()),
            subscriber: Mutex::new(None),
            auto_subscribe: true,
        }
    }

    /// Creates a publisher that does not send the subscription on
    /// `subscribe`.
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            auto_subscribe: false,
            ..Self::new()
        }
    }

    /// The subscription handed to subscribers.
    #[must_use]
    pub fn subscription(&self) -> Arc<TrackingSubscription> {
        Arc::clone(&self.subscription)
    }

    /// Returns true while a subscriber is attached.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.subscriber.lock().is_some()
    }

    fn current(&self) -> Option<DynSubscriber<T, E>> {
        self.subscriber.lock().clone()
    }

    /// Sends one value; returns the subscriber's extra demand.
    pub fn send(&self, value: T) -> Demand {
        self.current()
            .map_or(Demand::NONE, |subscriber| subscriber.receive(value))
    }

    /// Sends the terminal event. The subscriber stays attached so tests can
    /// check what happens on a second one.
    pub fn send_completion(&self, completion: Completion<E>) {
        if let Some(subscriber) = self.current() {
            subscriber.receive_completion(completion);
        }
    }

    /// Hands the subscriber this publisher's subscription.
    pub fn send_subscription(&self) {
        if let Some(subscriber) = self.current() {
            subscriber.receive_subscription(self.subscription());
        }
    }

    /// Hands the subscriber another subscription.
    pub fn send_extra_subscription(&self, subscription: Arc<dyn Subscription>) {
        if let Some(subscriber) = self.current() {
            subscriber.receive_subscription(subscription);
        }
    }

    /// Drops the attached subscriber.
    pub fn cancel(&self) {
        self.subscriber.lock().take();
    }
}

impl<T, E> Default for ManualPublisher<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Publisher for ManualPublisher<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = T, Failure = E> + 'static,
    {
        let subscriber: DynSubscriber<T, E> = subscriber;
        *self.subscriber.lock() = Some(Arc::clone(&subscriber));
        if self.auto_subscribe {
            subscriber.receive_subscription(self.subscription());
        }
    }
}

impl<T, E> fmt::Debug for ManualPublisher<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualPublisher")
            .field("has_subscriber", &self.has_subscriber())
            .field("subscription", &self.subscription)
            .finish()
    }
}
