//! Clock generation, reset sequencing, and edge detection.

use std::fmt;

use tilt_common::Frequency;

use crate::error::SimError;
use crate::time::SimTime;

/// A clock transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising"),
            Edge::Falling => write!(f, "falling"),
        }
    }
}

/// Tracks a level across evaluations and reports the transitions.
///
/// The first observed level never counts as an edge.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdgeDetector {
    prev: Option<bool>,
}

impl EdgeDetector {
    /// Creates a detector with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `level` and returns the edge it forms with the previous one.
    pub fn update(&mut self, level: bool) -> Option<Edge> {
        let edge = match self.prev {
            Some(false) if level => Some(Edge::Rising),
            Some(true) if !level => Some(Edge::Falling),
            _ => None,
        };
        self.prev = Some(level);
        edge
    }

    /// The last recorded level.
    pub fn level(&self) -> Option<bool> {
        self.prev
    }
}

/// A free-running two-phase clock on one device input.
#[derive(Clone, Debug)]
pub struct Clock {
    signal: String,
    half_period: SimTime,
}

impl Clock {
    /// Creates a clock with the given full period.
    ///
    /// A period too short to split into two non-zero halves is rejected
    /// before any stimulus is applied.
    pub fn new(signal: &str, period: SimTime) -> Result<Self, SimError> {
        let half = period.fs() / 2;
        if half == 0 {
            return Err(SimError::Config {
                reason: format!("clock period on '{signal}' must be positive, got {period}"),
            });
        }
        Ok(Self {
            signal: signal.to_string(),
            half_period: SimTime::from_fs(half),
        })
    }

    /// Creates a clock running at `frequency`.
    pub fn from_frequency(signal: &str, frequency: Frequency) -> Result<Self, SimError> {
        Self::new(signal, SimTime::from_fs(frequency.period_fs()))
    }

    /// The driven signal.
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Time between two consecutive edges.
    pub fn half_period(&self) -> SimTime {
        self.half_period
    }

    /// Time between two rising edges.
    pub fn period(&self) -> SimTime {
        self.half_period + self.half_period
    }
}

/// The one-shot reset pulse applied at the start of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct ResetSequence {
    /// The reset input.
    pub signal: String,
    /// Whether the reset is asserted by driving 0.
    pub active_low: bool,
    /// How long reset stays asserted.
    pub hold: SimTime,
    /// How long to run after release before handing control back.
    pub settle: SimTime,
}

impl ResetSequence {
    /// An active-low reset held for `hold_ns` and followed by `settle_ns`.
    pub fn active_low(signal: &str, hold_ns: u64, settle_ns: u64) -> Self {
        Self {
            signal: signal.to_string(),
            active_low: true,
            hold: SimTime::from_ns(hold_ns),
            settle: SimTime::from_ns(settle_ns),
        }
    }

    /// The level that asserts reset.
    pub fn asserted_level(&self) -> bool {
        !self.active_low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_a_config_error() {
        let err = Clock::new("clk", SimTime::ZERO).unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
        assert!(Clock::new("clk", SimTime::from_fs(1)).is_err());
        assert!(Clock::from_frequency("clk", Frequency::new(0.0)).is_err());
        assert!(Clock::from_frequency("clk", Frequency::new(-5.0)).is_err());
    }

    #[test]
    fn ten_megahertz_halves() {
        let clk = Clock::from_frequency("clk", "10MHz".parse().unwrap()).unwrap();
        assert_eq!(clk.half_period(), SimTime::from_ns(50));
        assert_eq!(clk.period(), SimTime::from_ns(100));
        assert_eq!(clk.signal(), "clk");
    }

    #[test]
    fn edge_detector_reports_transitions() {
        let mut d = EdgeDetector::new();
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(false), Some(Edge::Falling));
        assert_eq!(d.update(true), Some(Edge::Rising));
        assert_eq!(d.level(), Some(true));
    }

    #[test]
    fn reset_levels() {
        let r = ResetSequence::active_low("rst_n", 100, 100);
        assert!(!r.asserted_level());
        assert_eq!(r.hold, SimTime::from_ns(100));
    }
}
