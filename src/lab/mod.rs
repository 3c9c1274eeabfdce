//! Deterministic test harness.
//!
//! The lab provides:
//!
//! - Virtual time with no wall-clock dependency ([`VirtualTimeScheduler`])
//! - A full log of scheduler calls for exact assertions ([`SchedulerCall`])
//! - Recording doubles for both ends of a link ([`TrackingSubscriber`],
//!   [`TrackingSubscription`], [`ManualPublisher`])
//!
//! # Quick Start
//!
//! ```
//! use backflow::lab::{ManualPublisher, TrackingEvent, TrackingSubscriber, VirtualTimeScheduler};
//! use backflow::operator::PublisherExt;
//! use backflow::subscription::Publisher;
//! use backflow::types::{Completion, Demand};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = VirtualTimeScheduler::default();
//! let source = Arc::new(ManualPublisher::<i32, ()>::new());
//! let delayed = Arc::clone(&source).delay(Duration::from_nanos(10), None, scheduler.clone(), None);
//!
//! let sink = Arc::new(TrackingSubscriber::new().with_initial_demand(Demand::Unlimited));
//! delayed.subscribe(Arc::clone(&sink));
//! scheduler.execute_scheduled_actions();
//!
//! source.send(1);
//! source.send_completion(Completion::Finished);
//! scheduler.execute_scheduled_actions();
//!
//! assert_eq!(
//!     sink.history(),
//!     vec![
//!         TrackingEvent::Subscription,
//!         TrackingEvent::Value(1),
//!         TrackingEvent::Completion(Completion::Finished),
//!     ]
//! );
//! ```

pub mod config;
pub mod tracking;
pub mod virtual_scheduler;

pub use config::{DEFAULT_MAX_ACTIONS_PER_DRAIN, VirtualTimeConfig};
pub use tracking::{
    ManualPublisher, SubscriptionEvent, TrackingEvent, TrackingSubscriber, TrackingSubscription,
};
pub use virtual_scheduler::{SchedulerCall, VirtualSchedulerOptions, VirtualTimeScheduler};
