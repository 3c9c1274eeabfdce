//! Error types.
//!
//! Two very different kinds of failure live here:
//!
//! - [`ProtocolViolation`]: a collaborator broke the subscription contract
//!   (reentrant delivery, second subscription). These are programming errors.
//!   Stages log them and panic with the error's message; they are never
//!   returned as values.
//! - [`ConfigError`]: loading or validating configuration failed. Ordinary
//!   `Result` plumbing.
//!
//! Upstream failures are not errors of this crate at all; they travel as
//! [`Completion::Failure`](crate::types::Completion::Failure).

use crate::operator::StageStatus;
use std::path::PathBuf;
use thiserror::Error;

/// A fatal breach of the publisher/subscriber contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A stage was asked to deliver while already delivering on this thread.
    #[error("reentrant delivery into non-reentrant stage `{stage}`")]
    ReentrantDelivery {
        /// Operator name.
        stage: &'static str,
    },
    /// A stage received a second upstream subscription.
    #[error("stage `{stage}` received a second upstream subscription while {status}")]
    DuplicateSubscription {
        /// Operator name.
        stage: &'static str,
        /// Status the stage was in when the extra subscription arrived.
        status: StageStatus,
    },
}

/// Configuration loading failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config text is not valid TOML for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A field holds a value the consumer cannot work with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
