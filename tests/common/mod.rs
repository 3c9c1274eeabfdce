#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use backflow::lab::{
    ManualPublisher, SchedulerCall, TrackingSubscriber, VirtualSchedulerOptions,
    VirtualTimeScheduler,
};
use backflow::operator::PublisherExt;
use backflow::subscription::Publisher;
use backflow::types::{Demand, Time};
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::Arc;
use std::time::Duration;

pub use backflow::test_utils::{init_test_logging, init_test_logging_with_level};

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "BACKFLOW_PROPTEST_SEED";

/// Failure type used by the operator tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestError {
    Oops,
}

pub type Source = ManualPublisher<i32, TestError>;
pub type Tracking = TrackingSubscriber<i32, TestError>;

/// A delay stage wired between a manual source and a tracking subscriber.
pub struct DelayHarness {
    pub scheduler: VirtualTimeScheduler,
    pub source: Arc<Source>,
    pub tracking: Arc<Tracking>,
}

impl DelayHarness {
    /// Subscribes `tracking` through `source.delay(interval, tolerance)`.
    pub fn new(interval_ns: u64, tolerance_ns: u64, tracking: Tracking) -> Self {
        let scheduler = VirtualTimeScheduler::default();
        let source = Arc::new(Source::new());
        let tracking = Arc::new(tracking);
        Arc::clone(&source)
            .delay(
                Duration::from_nanos(interval_ns),
                Some(Duration::from_nanos(tolerance_ns)),
                scheduler.clone(),
                Some(VirtualSchedulerOptions),
            )
            .subscribe(Arc::clone(&tracking));
        Self {
            scheduler,
            source,
            tracking,
        }
    }

    /// Downstream-facing subscription as received by the tracking subscriber.
    pub fn downstream(&self) -> Arc<dyn backflow::subscription::Subscription> {
        self.tracking
            .subscription()
            .expect("subscription announced downstream")
    }
}

/// Builds a tracking subscriber with the given demands.
pub fn tracking(initial: Option<Demand>, per_value: Demand) -> Tracking {
    let tracking = Tracking::new().with_value_demand(per_value);
    match initial {
        Some(demand) => tracking.with_initial_demand(demand),
        None => tracking,
    }
}

/// `ScheduleAfter` entry with nanosecond arguments.
pub fn after(at_ns: u64, tolerance_ns: u64) -> SchedulerCall {
    SchedulerCall::ScheduleAfter {
        at: Time::from_nanos(at_ns),
        tolerance: Duration::from_nanos(tolerance_ns),
    }
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}
