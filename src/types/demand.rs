//! Backpressure demand.
//!
//! A [`Demand`] is how many more values a subscriber is willing to accept.
//! All arithmetic saturates: adding past `u64::MAX` becomes
//! [`Demand::Unlimited`], subtracting never goes below [`Demand::NONE`].

use core::cmp::Ordering;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of values a subscriber will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Demand {
    /// No upper bound.
    Unlimited,
    /// At most this many further values.
    Finite(u64),
}

impl Demand {
    /// Zero demand: no further delivery is permitted right now.
    pub const NONE: Self = Self::Finite(0);

    /// Creates a finite demand of `count` values.
    #[inline]
    #[must_use]
    pub const fn max(count: u64) -> Self {
        Self::Finite(count)
    }

    /// Returns true for [`Demand::Unlimited`].
    #[inline]
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Returns true if this demand permits no values at all.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::Finite(0))
    }

    /// Returns the finite count, or `None` if unlimited.
    #[inline]
    #[must_use]
    pub const fn as_finite(self) -> Option<u64> {
        match self {
            Self::Finite(n) => Some(n),
            Self::Unlimited => None,
        }
    }

    /// Returns true once `delivered` values exhaust this demand.
    ///
    /// Unlimited demand is never satisfied.
    #[inline]
    #[must_use]
    pub const fn is_satisfied_by(self, delivered: u64) -> bool {
        match self {
            Self::Finite(n) => delivered >= n,
            Self::Unlimited => false,
        }
    }

    /// Returns the smaller of two demands.
    #[inline]
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Ord::min(self, other)
    }
}

impl Default for Demand {
    fn default() -> Self {
        Self::NONE
    }
}

impl Ord for Demand {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Unlimited, Self::Unlimited) => Ordering::Equal,
            (Self::Unlimited, Self::Finite(_)) => Ordering::Greater,
            (Self::Finite(_), Self::Unlimited) => Ordering::Less,
            (Self::Finite(a), Self::Finite(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Demand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<u64> for Demand {
    fn eq(&self, other: &u64) -> bool {
        matches!(self, Self::Finite(n) if n == other)
    }
}

impl PartialOrd<u64> for Demand {
    fn partial_cmp(&self, other: &u64) -> Option<Ordering> {
        Some(self.cmp(&Self::Finite(*other)))
    }
}

impl Add for Demand {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Finite(a), Self::Finite(b)) => {
                a.checked_add(b).map_or(Self::Unlimited, Self::Finite)
            }
            _ => Self::Unlimited,
        }
    }
}

impl Add<u64> for Demand {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        self + Self::Finite(rhs)
    }
}

impl AddAssign for Demand {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl AddAssign<u64> for Demand {
    fn add_assign(&mut self, rhs: u64) {
        *self = *self + rhs;
    }
}

impl Sub for Demand {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Unlimited, _) => Self::Unlimited,
            (Self::Finite(_), Self::Unlimited) => Self::NONE,
            (Self::Finite(a), Self::Finite(b)) => Self::Finite(a.saturating_sub(b)),
        }
    }
}

impl Sub<u64> for Demand {
    type Output = Self;

    fn sub(self, rhs: u64) -> Self {
        self - Self::Finite(rhs)
    }
}

impl SubAssign for Demand {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl SubAssign<u64> for Demand {
    fn sub_assign(&mut self, rhs: u64) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Finite(n) => write!(f, "max({n})"),
        }
    }
}
