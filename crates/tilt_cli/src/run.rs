//! `tilt list` and `tilt run`: select and run scenarios.
//!
//! Each scenario builds its own bench, so a failure in one is reported and
//! the run moves on. Prints per-scenario status plus a summary line, or the
//! whole report as JSON.

use tilt_scenario::{Outcome, ScenarioContext, ScenarioReport};

use crate::scenarios::builtin;
use crate::{GlobalArgs, ReportFormat, RunArgs};

/// Runs the `tilt list` command.
pub fn list() -> Result<i32, Box<dyn std::error::Error>> {
    let suite = builtin();
    let width = suite.names().iter().map(|n| n.len()).max().unwrap_or(0);
    for s in suite.scenarios() {
        println!("{:width$}  {}", s.name, s.description);
    }
    Ok(0)
}

/// Runs the `tilt run` command.
///
/// Returns exit code 0 if every selected scenario passes, 1 otherwise.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = global.load_config()?;
    let ctx = ScenarioContext::new(config)?;
    let suite = builtin();

    let selected = suite.select(args.name.as_deref(), args.filter.as_deref());
    if selected.is_empty() {
        if !global.quiet {
            eprintln!("warning: no scenarios match the given filter");
        }
        return Ok(0);
    }
    let text = args.format == ReportFormat::Text && !global.quiet;
    if text {
        eprintln!("   Running {} scenario(s)", selected.len());
    }

    let report = suite.run(&ctx, args.name.as_deref(), args.filter.as_deref(), |r| {
        if text {
            print_scenario_result(r, global.verbose);
        }
    });

    match args.format {
        ReportFormat::Json => println!("{}", report.to_json()?),
        ReportFormat::Text if !global.quiet => {
            eprintln!();
            eprintln!(
                "   Result: {} passed, {} failed out of {} scenario(s)",
                report.passed,
                report.failed,
                report.scenarios.len()
            );
        }
        ReportFormat::Text => {}
    }

    Ok(if report.all_passed() { 0 } else { 1 })
}

fn print_scenario_result(result: &ScenarioReport, verbose: bool) {
    match &result.outcome {
        Outcome::Passed { detail } => {
            eprintln!(
                "   PASS  {name} ({ms:.1} ms)",
                name = result.name,
                ms = result.elapsed_ms
            );
            if verbose {
                eprintln!("         {detail}");
            }
        }
        Outcome::Failed { kind, message, .. } => {
            eprintln!("   FAIL  {name} [{kind}]: {message}", name = result.name);
        }
    }
}
