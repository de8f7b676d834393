//! Per-scenario outcomes and the suite report.

use serde::Serialize;
use tilt_sim::{FailureKind, SimError, Stamp};

/// How one scenario ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every check held.
    Passed {
        /// One-line account of what was verified.
        detail: String,
    },
    /// The first failing check.
    Failed {
        /// Failure category.
        kind: FailureKind,
        /// Full failure message.
        message: String,
        /// When it happened, if the bench was running.
        at: Option<Stamp>,
    },
}

impl Outcome {
    /// Classifies the result of a scenario body.
    pub fn from_result(result: Result<String, SimError>) -> Self {
        match result {
            Ok(detail) => Outcome::Passed { detail },
            Err(e) => Outcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
                at: e.stamp(),
            },
        }
    }

    /// Whether the scenario passed.
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Passed { .. })
    }
}

/// One scenario's entry in the report.
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// How it ended.
    pub outcome: Outcome,
    /// Wall-clock run time in milliseconds.
    pub elapsed_ms: f64,
}

/// The results of a suite run, in run order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SuiteReport {
    /// One entry per scenario run.
    pub scenarios: Vec<ScenarioReport>,
    /// Scenarios that passed.
    pub passed: usize,
    /// Scenarios that failed.
    pub failed: usize,
}

impl SuiteReport {
    /// Appends an entry and updates the counts.
    pub fn push(&mut self, report: ScenarioReport) {
        if report.outcome.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.scenarios.push(report);
    }

    /// True when nothing failed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// The report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt_sim::SimTime;

    #[test]
    fn failure_keeps_kind_and_stamp() {
        let at = Stamp {
            cycle: 12,
            time: SimTime::from_ns(1200),
        };
        let outcome = Outcome::from_result(Err(SimError::Timeout {
            what: "select asserted".into(),
            cycles: 5,
            at,
        }));
        match outcome {
            Outcome::Failed {
                kind,
                at: Some(stamp),
                ref message,
            } => {
                assert_eq!(kind, FailureKind::Timeout);
                assert_eq!(stamp.cycle, 12);
                assert!(message.contains("select asserted"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn counts_and_json_shape() {
        let mut report = SuiteReport::default();
        report.push(ScenarioReport {
            name: "a".into(),
            outcome: Outcome::Passed {
                detail: "ok".into(),
            },
            elapsed_ms: 1.0,
        });
        report.push(ScenarioReport {
            name: "b".into(),
            outcome: Outcome::from_result(Err(SimError::Config {
                reason: "bad".into(),
            })),
            elapsed_ms: 2.0,
        });
        assert_eq!((report.passed, report.failed), (1, 1));
        assert!(!report.all_passed());

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["scenarios"][0]["outcome"]["status"], "passed");
        assert_eq!(json["scenarios"][1]["outcome"]["status"], "failed");
        assert_eq!(json["scenarios"][1]["outcome"]["kind"], "setup");
        assert!(json["scenarios"][1]["outcome"]["at"].is_null());
    }
}
