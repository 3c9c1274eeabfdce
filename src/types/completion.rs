//! Terminal events.

use core::fmt;

/// How a stream ended: normally, or with a typed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion<E> {
    /// The publisher finished normally.
    Finished,
    /// The publisher failed.
    Failure(E),
}

impl<E> Completion<E> {
    /// Returns true for [`Completion::Finished`].
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns true for [`Completion::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&E> {
        match self {
            Self::Finished => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Transforms the failure value.
    pub fn map_failure<F>(self, f: impl FnOnce(E) -> F) -> Completion<F> {
        match self {
            Self::Finished => Completion::Finished,
            Self::Failure(e) => Completion::Failure(f(e)),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Completion<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Failure(e) => write!(f, "failure: {e}"),
        }
    }
}
