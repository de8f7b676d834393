//! Recursive filter oracle: convergence and direction of the fused angle.
//!
//! The filter updates once per enabled clock. The oracle pulses enable one
//! cycle on and one cycle off, holding the measurement and rate inputs
//! steady, and checks the output after a fixed number of pulses. A
//! direction check also watches the output after every pulse.

use serde::Serialize;
use tilt_sim::{Bench, Device, ResetSequence, SimError};
use tracing::info;

/// What the final output must satisfy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FilterCheck {
    /// Strictly within `tolerance` of `target`.
    Near {
        /// Value converged on.
        target: i64,
        /// Exclusive bound on the distance.
        tolerance: i64,
    },
    /// Strictly greater than zero at the end, and never back at or below
    /// zero after any pulse once it has gone positive.
    Positive,
}

impl FilterCheck {
    fn holds(&self, value: i64) -> bool {
        match *self {
            FilterCheck::Near { target, tolerance } => (value - target).abs() < tolerance,
            FilterCheck::Positive => value > 0,
        }
    }

    fn describe(&self) -> String {
        match *self {
            FilterCheck::Near { target, tolerance } => format!("{target} +/- {tolerance}"),
            FilterCheck::Positive => "> 0".to_string(),
        }
    }
}

/// One stimulus pattern and its check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FilterScenario {
    /// Short name for reports.
    pub name: &'static str,
    /// Measured angle held on the input.
    pub measurement: i16,
    /// Gyro rate held on the input.
    pub rate: i16,
    /// Enable pulses applied.
    pub pulses: u32,
    /// Check on the final output.
    pub check: FilterCheck,
}

/// Steady measurement with no rotation converges on the measurement;
/// rotation with a zero measurement still moves the estimate forward.
pub const FILTER_SCENARIOS: [FilterScenario; 2] = [
    FilterScenario {
        name: "converge",
        measurement: 1000,
        rate: 0,
        pulses: 300,
        check: FilterCheck::Near {
            target: 1000,
            tolerance: 10,
        },
    },
    FilterScenario {
        name: "rate_direction",
        measurement: 0,
        rate: 640,
        pulses: 10,
        check: FilterCheck::Positive,
    },
];

/// Port names of the filter block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPorts {
    /// Update enable.
    pub enable: String,
    /// Signed measured angle.
    pub measurement: String,
    /// Signed rotation rate.
    pub rate: String,
    /// Signed fused angle.
    pub output: String,
}

impl Default for FilterPorts {
    fn default() -> Self {
        Self {
            enable: "en".into(),
            measurement: "angle_m".into(),
            rate: "rate".into(),
            output: "angle_out".into(),
        }
    }
}

/// Runs filter scenarios, each from a fresh reset.
#[derive(Clone, Debug)]
pub struct FilterOracle {
    /// Port names.
    pub ports: FilterPorts,
    /// Reset applied before every scenario.
    pub reset: ResetSequence,
}

impl FilterOracle {
    /// An oracle using the default port names.
    pub fn new(reset: ResetSequence) -> Self {
        Self {
            ports: FilterPorts::default(),
            reset,
        }
    }

    /// Resets the block, applies the pulses and checks the output.
    /// Returns the final output.
    pub fn run_scenario<D: Device>(
        &self,
        bench: &mut Bench<D>,
        scenario: &FilterScenario,
    ) -> Result<i64, SimError> {
        let p = &self.ports;
        bench.write_u64(&p.enable, 0)?;
        bench.write_i64(&p.measurement, i64::from(scenario.measurement))?;
        bench.write_i64(&p.rate, i64::from(scenario.rate))?;
        bench.reset(&self.reset)?;
        let mut positive = false;
        for pulse in 1..=scenario.pulses {
            bench.write_u64(&p.enable, 1)?;
            bench.rising_edge()?;
            bench.write_u64(&p.enable, 0)?;
            bench.rising_edge()?;
            if scenario.check != FilterCheck::Positive {
                continue;
            }
            let value = bench.read_i64(&p.output)?;
            if value > 0 {
                positive = true;
            } else if positive {
                return Err(SimError::mismatch(
                    format!("filter output after {} pulse {pulse}", scenario.name),
                    "to stay > 0",
                    value,
                    bench.stamp(),
                ));
            }
        }
        let value = bench.read_i64(&p.output)?;
        if !scenario.check.holds(value) {
            return Err(SimError::mismatch(
                format!("filter output after {}", scenario.name),
                scenario.check.describe(),
                value,
                bench.stamp(),
            ));
        }
        info!(scenario = scenario.name, value, "filter check passed");
        Ok(value)
    }

    /// Runs both stock scenarios in order.
    pub fn run<D: Device>(&self, bench: &mut Bench<D>) -> Result<Vec<i64>, SimError> {
        FILTER_SCENARIOS
            .iter()
            .map(|s| self.run_scenario(bench, s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks() {
        let near = FilterCheck::Near {
            target: 1000,
            tolerance: 10,
        };
        assert!(near.holds(991));
        assert!(near.holds(1009));
        assert!(!near.holds(990));
        assert!(FilterCheck::Positive.holds(1));
        assert!(!FilterCheck::Positive.holds(0));
        assert_eq!(near.describe(), "1000 +/- 10");
    }

    #[test]
    fn scenarios_serialize() {
        let json = serde_json::to_string(&FILTER_SCENARIOS[1]).unwrap();
        assert!(json.contains("\"name\":\"rate_direction\""));
        assert!(json.contains("\"kind\":\"positive\""));
    }
}
