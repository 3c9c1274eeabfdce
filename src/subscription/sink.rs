//! Closure-driven terminal subscriber.

use super::{Subscriber, Subscription};
use crate::types::{Completion, Demand};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A subscriber that requests unlimited demand and hands everything to
/// closures.
///
/// Keep the returned `Arc` alive for as long as values should flow; stages
/// only hold it weakly. [`Sink::cancel`] ends the link early.
///
/// ```
/// use backflow::subscription::Sink;
/// use backflow::types::Completion;
///
/// let sink = Sink::<i32, ()>::new(|v| println!("value {v}"), |c| {
///     assert!(matches!(c, Completion::Finished));
/// });
/// sink.cancel();
/// ```
pub struct Sink<T, E> {
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    on_value: Box<dyn Fn(T) + Send + Sync>,
    on_completion: Mutex<Option<Box<dyn FnOnce(Completion<E>) + Send>>>,
    _marker: PhantomData<fn(T, E)>,
}

impl<T, E> Sink<T, E> {
    /// Creates a sink from value and completion callbacks.
    pub fn new<V, C>(on_value: V, on_completion: C) -> Arc<Self>
    where
        V: Fn(T) + Send + Sync + 'static,
        C: FnOnce(Completion<E>) + Send + 'static,
    {
        Arc::new(Self {
            subscription: Mutex::new(None),
            on_value: Box::new(on_value),
            on_completion: Mutex::new(Some(Box::new(on_completion))),
            _marker: PhantomData,
        })
    }

    /// Cancels the held subscription, if any, and releases it.
    pub fn cancel(&self) {
        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    /// Returns true while a subscription is held.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

impl<T, E> Subscriber for Sink<T, E> {
    type Input = T;
    type Failure = E;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        {
            let mut slot = self.subscription.lock();
            if slot.is_some() {
                drop(slot);
                subscription.cancel();
                return;
            }
            *slot = Some(Arc::clone(&subscription));
        }
        subscription.request(Demand::Unlimited);
    }

    fn receive(&self, input: T) -> Demand {
        (self.on_value)(input);
        Demand::NONE
    }

    fn receive_completion(&self, completion: Completion<E>) {
        self.subscription.lock().take();
        let callback = self.on_completion.lock().take();
        if let Some(callback) = callback {
            callback(completion);
        }
    }
}

impl<T, E> fmt::Debug for Sink<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}
