//! Backflow: demand-driven reactive streams with deterministic virtual time.
//!
//! # Overview
//!
//! A stream is a chain of stages between a publisher and a subscriber. Values
//! only move when the consumer has asked for them (backpressure), and anything
//! that must happen "later" is handed to a [`Scheduler`] rather than to a
//! thread or a timer owned by the operator.
//!
//! # Core Guarantees
//!
//! - **Demand conservation**: a stage never delivers more values than were
//!   requested through it
//! - **Single terminal event**: at most one completion reaches a subscriber,
//!   and nothing follows it
//! - **Idempotent cancellation**: cancel releases upstream once; later calls
//!   do nothing
//! - **Silenced pending work**: actions queued before a cancel find nothing
//!   to deliver to
//! - **Reentrancy is fatal**: re-entering a stage's delivery on one thread
//!   panics instead of corrupting state
//! - **Deterministic testing**: a virtual clock with stable FIFO ordering and
//!   a full log of scheduler calls
//!
//! # Module Structure
//!
//! - [`types`]: Demand, scheduler time, completion
//! - [`subscription`]: Publisher / Subscriber / Subscription traits and [`Sink`]
//! - [`scheduler`]: The scheduler abstraction and the inline scheduler
//! - [`operator`]: The shared stage machinery and the `delay` operator
//! - [`lab`]: Virtual-time scheduler and recording test doubles
//! - [`error`](mod@error): Protocol violations and configuration errors
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use backflow::lab::{ManualPublisher, VirtualTimeScheduler};
//! use backflow::operator::PublisherExt;
//! use backflow::subscription::{Publisher, Sink};
//! use backflow::types::Time;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = VirtualTimeScheduler::default();
//! let source = Arc::new(ManualPublisher::<&str, ()>::new());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let log = Arc::clone(&seen);
//! let sink = Sink::new(move |v| log.lock().push(v), |_| {});
//! Arc::clone(&source)
//!     .delay(Duration::from_secs(1), None, scheduler.clone(), None)
//!     .subscribe(Arc::clone(&sink));
//! scheduler.execute_scheduled_actions();
//!
//! source.send("tick");
//! assert!(seen.lock().is_empty());
//!
//! scheduler.execute_scheduled_actions();
//! assert_eq!(*seen.lock(), vec!["tick"]);
//! assert_eq!(scheduler.current_time(), Time::from_secs(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod lab;
pub mod operator;
pub mod scheduler;
pub mod subscription;
pub mod tracing_compat;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use error::{ConfigError, ConfigResult, ProtocolViolation};
pub use lab::{VirtualTimeConfig, VirtualTimeScheduler};
pub use operator::{Delay, PublisherExt};
pub use scheduler::{Action, CancelToken, ImmediateScheduler, Scheduler};
pub use subscription::{Publisher, Sink, Subscriber, Subscription};
pub use types::{Completion, Demand, Time};
