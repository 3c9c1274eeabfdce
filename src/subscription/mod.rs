//! The publisher/subscriber/subscription protocol.
//!
//! A [`Publisher`] hands each [`Subscriber`] exactly one [`Subscription`].
//! Through that subscription the subscriber grants [`Demand`]; the publisher
//! may then deliver at most that many values, followed by at most one
//! [`Completion`].
//!
//! # Ownership
//!
//! The caller of [`Publisher::subscribe`] owns the subscriber `Arc`. Operator
//! stages hold their downstream subscriber weakly, so a subscriber nobody
//! keeps alive silently stops receiving. Subscribers own the subscription they
//! received and drop it when they cancel.
//!
//! # Contract
//!
//! - `receive_subscription` is called once, before any value.
//! - `receive` is never called with more values than outstanding demand.
//! - `receive_completion` is called at most once; nothing follows it.
//! - `request` is additive; `cancel` is idempotent. Both are inert after the
//!   link ends.

mod sink;

pub use sink::Sink;

use crate::types::{Completion, Demand};
use std::sync::Arc;

/// The live link a subscriber uses to grant demand or cancel.
pub trait Subscription: Send + Sync {
    /// Grants `demand` more values. Additive with earlier requests.
    fn request(&self, demand: Demand);

    /// Ends the link. Calling it again is a no-op.
    fn cancel(&self);
}

/// Consumer side of the protocol.
///
/// Methods take `&self`; implementations use interior mutability because the
/// subscriber is shared between its owner and the stage feeding it.
pub trait Subscriber: Send + Sync {
    /// Values accepted by this subscriber.
    type Input;
    /// Failure type carried by the terminal event.
    type Failure;

    /// Receives the subscription for this link.
    fn receive_subscription(&self, subscription: Arc<dyn Subscription>);

    /// Receives one value; returns additional demand to grant.
    fn receive(&self, input: Self::Input) -> Demand;

    /// Receives the terminal event.
    fn receive_completion(&self, completion: Completion<Self::Failure>);
}

/// Producer side of the protocol.
pub trait Publisher {
    /// Values produced.
    type Output;
    /// Failure type of the terminal event.
    type Failure;

    /// Attaches `subscriber` to this publisher.
    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = Self::Output, Failure = Self::Failure> + 'static;
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = Self::Output, Failure = Self::Failure> + 'static,
    {
        (**self).subscribe(subscriber);
    }
}
