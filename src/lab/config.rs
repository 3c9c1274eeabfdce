//! Configuration for the virtual-time scheduler.
//!
//! - Epoch the clock starts from
//! - Minimum tolerance reported to operators
//! - Action cap per drain, which bounds runaway self-rescheduling actions

use crate::error::{ConfigError, ConfigResult};
use crate::types::Time;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-drain action cap.
pub const DEFAULT_MAX_ACTIONS_PER_DRAIN: usize = 100_000;

/// Configuration for [`VirtualTimeScheduler`](super::VirtualTimeScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualTimeConfig {
    /// Instant the clock starts at.
    pub epoch: Time,
    /// Value returned by `minimum_tolerance()`.
    #[serde(rename = "minimum_tolerance_ns", with = "duration_nanos")]
    pub minimum_tolerance: Duration,
    /// Maximum actions run by one drain call. `None` disables the cap.
    pub max_actions_per_drain: Option<usize>,
}

impl VirtualTimeConfig {
    /// Creates the default configuration: epoch zero, zero tolerance, capped drains.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            epoch: Time::ZERO,
            minimum_tolerance: Duration::ZERO,
            max_actions_per_drain: Some(DEFAULT_MAX_ACTIONS_PER_DRAIN),
        }
    }

    /// Sets the starting instant.
    #[must_use]
    pub const fn epoch(mut self, epoch: Time) -> Self {
        self.epoch = epoch;
        self
    }

    /// Sets the minimum tolerance.
    #[must_use]
    pub const fn minimum_tolerance(mut self, tolerance: Duration) -> Self {
        self.minimum_tolerance = tolerance;
        self
    }

    /// Sets the per-drain action cap.
    #[must_use]
    pub const fn max_actions_per_drain(mut self, cap: usize) -> Self {
        self.max_actions_per_drain = Some(cap);
        self
    }

    /// Removes the per-drain action cap.
    #[must_use]
    pub const fn no_action_cap(mut self) -> Self {
        self.max_actions_per_drain = None;
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_actions_per_drain == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_actions_per_drain",
                reason: "must be non-zero; omit the cap instead",
            });
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    ///
    /// ```toml
    /// epoch = 0
    /// minimum_tolerance_ns = 5
    /// max_actions_per_drain = 1000
    /// ```
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for VirtualTimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_nanos {
    use crate::types::time::duration_to_nanos_saturating;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(duration_to_nanos_saturating(*d))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}
