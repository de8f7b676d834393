//! The built-in scenario suite, wired to the behavioural models.

use tilt_config::PinLayout;
use tilt_models::{
    CordicModel, KalmanModel, MpuModel, SelectGlitch, TopConfig, TopLayout, TopModel, UartTxModel,
};
use tilt_proto::TruncationPolicy;
use tilt_scenario::{
    end_to_end, filter_fusion, rotation_table, spi_truncation, state_walk, uart_round_trip,
    Scenario, Suite,
};
use tilt_sim::{FailureKind, SimError};

/// Burst-read command bits the glitching controller sends before letting go.
const GLITCH_BITS: u8 = 3;

/// Builds the suite in run order.
pub fn builtin() -> Suite {
    let mut suite = Suite::new();
    suite
        .add(Scenario::new(
            "rotation_oracle",
            "angle conversion block against the 15-vector table",
            |ctx| rotation_table(ctx, CordicModel::new()),
        ))
        .add(Scenario::new(
            "filter_oracle",
            "fusion filter convergence and rate direction",
            |ctx| filter_fusion(ctx, KalmanModel::new()),
        ))
        .add(Scenario::new(
            "uart_round_trip",
            "serial transmitter frames one byte",
            |ctx| {
                let baud_div = TopConfig::fast().baud_div;
                uart_round_trip(ctx, UartTxModel::new(baud_div), u64::from(baud_div))
            },
        ))
        .add(Scenario::new(
            "state_walk",
            "sensor driver power-up and poll, replayed after reset",
            |ctx| state_walk(ctx, MpuModel::new(TopConfig::fast().timing)),
        ))
        .add(Scenario::new(
            "telemetry_fast",
            "end-to-end packet from a fast-timing build",
            |ctx| end_to_end(ctx, TopModel::new(TopConfig::fast(), TopLayout::Discrete)),
        ))
        .add(Scenario::new(
            "telemetry_slow",
            "end-to-end packet from a real-time build",
            |ctx| end_to_end(ctx, TopModel::new(TopConfig::slow(), TopLayout::Discrete)),
        ))
        .add(Scenario::new(
            "telemetry_fast_packed",
            "end-to-end packet through packed pin vectors",
            |ctx| {
                end_to_end(
                    &ctx.with_layout(PinLayout::Packed),
                    TopModel::new(TopConfig::fast(), TopLayout::Packed),
                )
            },
        ))
        .add(Scenario::new(
            "spi_truncation_tolerated",
            "select released mid-byte is logged",
            |ctx| {
                spi_truncation(
                    ctx,
                    SelectGlitch::new(ctx.config.spi.burst_opcode, GLITCH_BITS),
                    TruncationPolicy::Tolerate,
                )
            },
        ))
        .add(Scenario::new(
            "spi_truncation_fail",
            "select released mid-byte fails the edge under the strict policy",
            |ctx| {
                let result = spi_truncation(
                    ctx,
                    SelectGlitch::new(ctx.config.spi.burst_opcode, GLITCH_BITS),
                    TruncationPolicy::Fail,
                );
                expect_failure(result, FailureKind::Truncated)
            },
        ));
    suite
}

/// Turns an expected failure into a pass and anything else into a mismatch.
fn expect_failure(
    result: Result<String, SimError>,
    kind: FailureKind,
) -> Result<String, SimError> {
    match result {
        Err(e) if e.kind() == kind => Ok(format!("failed as expected: {e}")),
        Err(e) => Err(e),
        Ok(detail) => Err(SimError::Config {
            reason: format!("expected a {kind} failure, scenario passed ({detail})"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let suite = builtin();
        let mut names = suite.names();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 9);
    }

    #[test]
    fn filter_selects_telemetry() {
        let suite = builtin();
        let picked: Vec<_> = suite
            .select(None, Some("telemetry"))
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            picked,
            ["telemetry_fast", "telemetry_slow", "telemetry_fast_packed"]
        );
    }

    #[test]
    fn expected_failure_inverts() {
        let e = SimError::Config {
            reason: "x".into(),
        };
        assert!(expect_failure(Err(e.clone()), FailureKind::Setup).is_ok());
        assert!(expect_failure(Err(e), FailureKind::Truncated).is_err());
        assert!(expect_failure(Ok("fine".into()), FailureKind::Truncated).is_err());
    }
}
