//! Scenario wrappers around the numerical oracles.

use tilt_oracle::{FilterOracle, RotationOracle, RotationPorts, FILTER_SCENARIOS};
use tilt_sim::{Device, SimError};

use crate::context::ScenarioContext;

/// Resets the rotation block and runs the whole vector table with the
/// configured tolerance and done cap.
pub fn rotation_table<D: Device>(ctx: &ScenarioContext, device: D) -> Result<String, SimError> {
    let mut bench = ctx.bench(device)?;
    let oracle = RotationOracle {
        ports: RotationPorts::default(),
        tolerance_deg: ctx.config.oracle.rotation_tolerance_deg,
        done_cap: ctx.config.oracle.done_cap,
    };
    bench.write_u64(&oracle.ports.start, 0)?;
    bench.reset(&ctx.reset_sequence())?;
    let results = oracle.run(&mut bench)?;
    let worst = results.iter().map(|r| r.error_deg).fold(0.0, f64::max);
    let latency = results.iter().map(|r| r.latency).max().unwrap_or(0);
    Ok(format!(
        "{} vectors, worst error {worst:.3} deg, latency {latency} cycles",
        results.len()
    ))
}

/// Runs both filter scenarios, each from a fresh reset.
pub fn filter_fusion<D: Device>(ctx: &ScenarioContext, device: D) -> Result<String, SimError> {
    let mut bench = ctx.bench(device)?;
    let values = FilterOracle::new(ctx.reset_sequence()).run(&mut bench)?;
    let parts: Vec<String> = FILTER_SCENARIOS
        .iter()
        .zip(&values)
        .map(|(s, v)| format!("{} -> {v}", s.name))
        .collect();
    Ok(parts.join(", "))
}
