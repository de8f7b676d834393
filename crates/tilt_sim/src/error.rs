//! Bench error types and the failure taxonomy scenarios report.
//!
//! Setup problems (bad configuration, unknown signals, conflicting drivers)
//! and the four scenario failure conditions share one [`SimError`] so that a
//! scenario can propagate any of them with `?`. [`SimError::kind`] sorts
//! them back into the reported [`FailureKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::SimTime;

/// Where on the time line something happened: rising-edge count and time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Rising clock edges seen since the bench was built.
    pub cycle: u64,
    /// Simulated time.
    pub time: SimTime,
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {} ({})", self.cycle, self.time)
    }
}

/// Errors raised while building or running a bench.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// The bench was mis-configured before any stimulus was applied.
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The device has no signal with this name.
    #[error("unknown signal '{name}'")]
    UnknownSignal {
        /// The requested name.
        name: String,
    },

    /// The harness tried to drive a device output.
    #[error("signal '{name}' is a device output and cannot be driven")]
    NotAnInput {
        /// The signal name.
        name: String,
    },

    /// A numeric value does not fit the signal's width.
    #[error("value {value} does not fit in {width}-bit signal '{name}'")]
    ValueTooWide {
        /// The signal name.
        name: String,
        /// The rejected value.
        value: i64,
        /// The signal width.
        width: u32,
    },

    /// Two components tried to drive the same signal.
    #[error("signal '{signal}' is already driven by {owner}")]
    DriverConflict {
        /// The contested signal.
        signal: String,
        /// The component that claimed it first.
        owner: String,
    },

    /// A bounded wait ran out of cycles.
    #[error("timed out after {cycles} cycles waiting for {what} at {at}")]
    Timeout {
        /// The awaited condition.
        what: String,
        /// The cap that was exhausted.
        cycles: u64,
        /// When the wait gave up.
        at: Stamp,
    },

    /// An observed value differs from the expected one.
    #[error("{what}: expected {expected}, observed {observed} at {at}")]
    Mismatch {
        /// The checked quantity.
        what: String,
        /// The expected value, rendered.
        expected: String,
        /// The observed value, rendered.
        observed: String,
        /// When the check failed.
        at: Stamp,
    },

    /// A numeric read hit `X` or `Z` bits.
    #[error("signal '{signal}' is indeterminate ({value}) at {at}")]
    Indeterminate {
        /// The signal name.
        signal: String,
        /// The raw 4-state value.
        value: String,
        /// When the read happened.
        at: Stamp,
    },

    /// The device released select in the middle of a byte.
    #[error("transaction truncated after {bits} bit(s) of byte {byte_index} at {at}")]
    TruncatedTransaction {
        /// Index of the interrupted byte within the transaction (0 = command).
        byte_index: usize,
        /// Bits already shifted of that byte.
        bits: u8,
        /// When select was released.
        at: Stamp,
    },
}

/// The reported category of a scenario failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The bench could not be set up or was driven incorrectly.
    Setup,
    /// A bounded wait expired.
    Timeout,
    /// A value differed from its expectation.
    Mismatch,
    /// A signal stayed indeterminate where a number was required.
    Indeterminate,
    /// A bus transaction ended early.
    Truncated,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Setup => "setup",
            FailureKind::Timeout => "timeout",
            FailureKind::Mismatch => "mismatch",
            FailureKind::Indeterminate => "indeterminate",
            FailureKind::Truncated => "truncated",
        };
        f.write_str(s)
    }
}

impl SimError {
    /// Builds a [`SimError::Mismatch`] from any two displayable values.
    pub fn mismatch(
        what: impl Into<String>,
        expected: impl fmt::Display,
        observed: impl fmt::Display,
        at: Stamp,
    ) -> Self {
        SimError::Mismatch {
            what: what.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
            at,
        }
    }

    /// Returns the reported category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            SimError::Timeout { .. } => FailureKind::Timeout,
            SimError::Mismatch { .. } => FailureKind::Mismatch,
            SimError::Indeterminate { .. } => FailureKind::Indeterminate,
            SimError::TruncatedTransaction { .. } => FailureKind::Truncated,
            SimError::Config { .. }
            | SimError::UnknownSignal { .. }
            | SimError::NotAnInput { .. }
            | SimError::ValueTooWide { .. }
            | SimError::DriverConflict { .. } => FailureKind::Setup,
        }
    }

    /// Returns when the failure was detected, for the run-time conditions.
    pub fn stamp(&self) -> Option<Stamp> {
        match self {
            SimError::Timeout { at, .. }
            | SimError::Mismatch { at, .. }
            | SimError::Indeterminate { at, .. }
            | SimError::TruncatedTransaction { at, .. } => Some(*at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(cycle: u64) -> Stamp {
        Stamp {
            cycle,
            time: SimTime::from_ns(cycle * 100 + 50),
        }
    }

    #[test]
    fn timeout_display() {
        let e = SimError::Timeout {
            what: "UART start bit".into(),
            cycles: 20000,
            at: at(25000),
        };
        assert_eq!(
            e.to_string(),
            "timed out after 20000 cycles waiting for UART start bit at cycle 25000 (2500050 ns)"
        );
        assert_eq!(e.kind(), FailureKind::Timeout);
    }

    #[test]
    fn mismatch_carries_both_values() {
        let e = SimError::mismatch("header byte 0", "0xde", "0x5e", at(3));
        assert_eq!(
            e.to_string(),
            "header byte 0: expected 0xde, observed 0x5e at cycle 3 (350 ns)"
        );
        assert_eq!(e.kind(), FailureKind::Mismatch);
        assert_eq!(e.stamp(), Some(at(3)));
    }

    #[test]
    fn indeterminate_and_truncated_kinds() {
        let e = SimError::Indeterminate {
            signal: "state".into(),
            value: "XXXX".into(),
            at: at(1),
        };
        assert_eq!(e.kind(), FailureKind::Indeterminate);
        let t = SimError::TruncatedTransaction {
            byte_index: 2,
            bits: 3,
            at: at(9),
        };
        assert_eq!(t.kind(), FailureKind::Truncated);
        assert_eq!(
            t.to_string(),
            "transaction truncated after 3 bit(s) of byte 2 at cycle 9 (950 ns)"
        );
    }

    #[test]
    fn setup_errors_have_no_stamp() {
        let e = SimError::Config {
            reason: "clock period must be positive".into(),
        };
        assert_eq!(e.kind(), FailureKind::Setup);
        assert_eq!(e.stamp(), None);
        assert_eq!(
            SimError::DriverConflict {
                signal: "spi_miso".into(),
                owner: "raw toggler".into()
            }
            .to_string(),
            "signal 'spi_miso' is already driven by raw toggler"
        );
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::Indeterminate).unwrap();
        assert_eq!(json, "\"indeterminate\"");
    }
}
