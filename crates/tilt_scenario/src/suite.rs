//! Named scenarios, selection, and independent execution.

use std::time::Instant;

use tilt_sim::SimError;
use tracing::{error, info, info_span};

use crate::context::ScenarioContext;
use crate::report::{Outcome, ScenarioReport, SuiteReport};

/// The body of a scenario.
pub type ScenarioFn = Box<dyn Fn(&ScenarioContext) -> Result<String, SimError>>;

/// A named, self-contained check.
pub struct Scenario {
    /// Unique name used for selection.
    pub name: String,
    /// One-line description for listings.
    pub description: String,
    run: ScenarioFn,
}

impl Scenario {
    /// Wraps `run` as a scenario.
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, run: F) -> Self
    where
        F: Fn(&ScenarioContext) -> Result<String, SimError> + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            run: Box::new(run),
        }
    }

    /// Runs the body once.
    pub fn run(&self, ctx: &ScenarioContext) -> Result<String, SimError> {
        (self.run)(ctx)
    }
}

/// An ordered collection of scenarios.
///
/// Each scenario builds its own bench, so a failure in one never leaks
/// into the next.
#[derive(Default)]
pub struct Suite {
    scenarios: Vec<Scenario>,
}

impl Suite {
    /// An empty suite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scenario, keeping insertion order.
    pub fn add(&mut self, scenario: Scenario) -> &mut Self {
        self.scenarios.push(scenario);
        self
    }

    /// All scenarios in order.
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Scenario names in order.
    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    /// Selects scenarios by exact `name` or, failing that, by substring
    /// `filter`. With neither, selects everything.
    pub fn select(&self, name: Option<&str>, filter: Option<&str>) -> Vec<&Scenario> {
        self.scenarios
            .iter()
            .filter(|s| {
                if let Some(n) = name {
                    return s.name == n;
                }
                if let Some(f) = filter {
                    return s.name.contains(f);
                }
                true
            })
            .collect()
    }

    /// Runs the selected scenarios one after another and collects a report.
    ///
    /// `on_done` sees each entry as soon as it is recorded.
    pub fn run(
        &self,
        ctx: &ScenarioContext,
        name: Option<&str>,
        filter: Option<&str>,
        mut on_done: impl FnMut(&ScenarioReport),
    ) -> SuiteReport {
        let mut report = SuiteReport::default();
        for scenario in self.select(name, filter) {
            let span = info_span!("scenario", name = %scenario.name);
            let _guard = span.enter();
            info!("starting");
            let started = Instant::now();
            let outcome = Outcome::from_result(scenario.run(ctx));
            let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
            match &outcome {
                Outcome::Passed { detail } => info!(%detail, "passed"),
                Outcome::Failed { kind, message, .. } => error!(%kind, %message, "failed"),
            }
            let entry = ScenarioReport {
                name: scenario.name.clone(),
                outcome,
                elapsed_ms,
            };
            on_done(&entry);
            report.push(entry);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt_sim::FailureKind;

    fn suite() -> Suite {
        let mut suite = Suite::new();
        suite
            .add(Scenario::new("telemetry_fast", "", |_| Ok("fast".into())))
            .add(Scenario::new("telemetry_slow", "", |_| {
                Err(SimError::Config {
                    reason: "no device".into(),
                })
            }))
            .add(Scenario::new("state_walk", "", |_| Ok("walk".into())));
        suite
    }

    #[test]
    fn select_by_name() {
        let s = suite();
        let picked = s.select(Some("state_walk"), None);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "state_walk");
    }

    #[test]
    fn select_by_substring() {
        let s = suite();
        let names: Vec<_> = s
            .select(None, Some("telemetry"))
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, ["telemetry_fast", "telemetry_slow"]);
    }

    #[test]
    fn select_none_matches() {
        assert!(suite().select(Some("missing"), None).is_empty());
        assert_eq!(suite().select(None, None).len(), 3);
    }

    #[test]
    fn failures_do_not_stop_the_run() {
        let s = suite();
        let mut seen = Vec::new();
        let report = s.run(&ScenarioContext::default(), None, None, |r| {
            seen.push(r.name.clone())
        });
        assert_eq!(seen, ["telemetry_fast", "telemetry_slow", "state_walk"]);
        assert_eq!((report.passed, report.failed), (2, 1));
        assert!(matches!(
            report.scenarios[1].outcome,
            Outcome::Failed {
                kind: FailureKind::Setup,
                ..
            }
        ));
    }
}
