//! Operators and the stage machinery they share.
//!
//! - [`stage`]: lifecycle, upstream/downstream links, delivery guard
//! - [`delay`]: shifts every event forward in scheduler time
//!
//! Operators are attached through [`PublisherExt`]:
//!
//! ```
//! use backflow::lab::{ManualPublisher, VirtualTimeScheduler};
//! use backflow::operator::PublisherExt;
//! use std::time::Duration;
//!
//! let scheduler = VirtualTimeScheduler::default();
//! let delayed = ManualPublisher::<u8, ()>::new().delay(
//!     Duration::from_millis(5),
//!     Some(Duration::ZERO),
//!     scheduler,
//!     None,
//! );
//! assert_eq!(delayed.interval(), Duration::from_millis(5));
//! ```

pub mod delay;
pub mod stage;

pub use delay::Delay;
pub use stage::{DeliveryGuard, DeliveryScope, Stage, StageStatus};

use crate::scheduler::Scheduler;
use crate::subscription::Publisher;
use std::time::Duration;

/// Operator combinators available on every [`Publisher`].
pub trait PublisherExt: Publisher + Sized {
    /// Delivers every value and the completion `interval` later on
    /// `scheduler`.
    ///
    /// `tolerance` defaults to the scheduler's minimum tolerance, queried
    /// once here. `options` is passed through to every scheduling call.
    fn delay<Sch: Scheduler>(
        self,
        interval: Duration,
        tolerance: Option<Duration>,
        scheduler: Sch,
        options: Option<Sch::Options>,
    ) -> Delay<Self, Sch> {
        Delay::new(self, interval, tolerance, scheduler, options)
    }
}

impl<P: Publisher> PublisherExt for P {}
