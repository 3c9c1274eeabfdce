//! Core value types shared by every stage and scheduler.
//!
//! - [`demand`]: Backpressure demand with saturating arithmetic
//! - [`time`]: Scheduler instants (`Time`); strides are `std::time::Duration`
//! - [`completion`]: Terminal events (`Completion`)

pub mod completion;
pub mod demand;
pub mod time;

pub use completion::Completion;
pub use demand::Demand;
pub use time::Time;
