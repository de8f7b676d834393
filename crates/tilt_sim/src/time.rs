//! Simulated time with femtosecond resolution.
//!
//! The bench advances time in whole clock half periods, so every [`SimTime`]
//! it reports lands on a clock edge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;

/// Display units, largest first.
const UNITS: [(u64, &str); 4] = [
    (FS_PER_MS, "ms"),
    (FS_PER_US, "us"),
    (FS_PER_NS, "ns"),
    (FS_PER_PS, "ps"),
];

/// A point in (or span of) simulated time, in femtoseconds.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime(u64);

impl SimTime {
    /// Time zero.
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a time from femtoseconds.
    pub fn from_fs(fs: u64) -> Self {
        Self(fs)
    }

    /// Creates a time from nanoseconds.
    pub fn from_ns(ns: u64) -> Self {
        Self(ns * FS_PER_NS)
    }

    /// Returns the time in femtoseconds.
    pub fn fs(self) -> u64 {
        self.0
    }

    /// Returns the time in nanoseconds, truncated.
    pub fn to_ns(self) -> u64 {
        self.0 / FS_PER_NS
    }

    /// Returns how many whole `step`s are needed to cover this span,
    /// rounding up. A zero `step` covers nothing.
    pub fn steps_of(self, step: SimTime) -> u64 {
        if step.0 == 0 {
            return 0;
        }
        self.0.div_ceil(step.0)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0 fs");
        }
        match UNITS
            .iter()
            .find(|(scale, _)| self.0 >= *scale && self.0 % scale == 0)
        {
            Some((scale, unit)) => write!(f, "{} {unit}", self.0 / scale),
            None => write!(f, "{} fs", self.0),
        }
    }
}
