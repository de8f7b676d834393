use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilt_models::{CordicModel, KalmanModel};
use tilt_oracle::{
    FilterCheck, FilterOracle, FilterScenario, RotationOracle, RotationVector, FILTER_SCENARIOS,
};
use tilt_sim::{
    Bench, Clock, Device, Edge, EdgeDetector, FailureKind, PortTable, ResetSequence, SimError,
    SimTime,
};

fn reset() -> ResetSequence {
    ResetSequence::active_low("rst_n", 100, 100)
}

fn clock() -> Clock {
    Clock::new("clk", SimTime::from_ns(100)).unwrap()
}

fn cordic_bench() -> Bench<CordicModel> {
    let mut bench = Bench::new(CordicModel::new(), clock()).unwrap();
    bench.write_u64("start", 0).unwrap();
    bench.reset(&reset()).unwrap();
    bench
}

#[test]
fn rotation_table_within_one_degree() {
    let mut bench = cordic_bench();
    let results = RotationOracle::default().run(&mut bench).unwrap();
    assert_eq!(results.len(), 15);
    for r in &results {
        assert!(r.error_deg < 1.0, "{r:?}");
        assert_eq!(r.latency, 17);
    }
    let origin = results.iter().find(|r| r.vector.x == 0 && r.vector.y == 0).unwrap();
    assert_eq!(origin.observed_deg, 0.0);
}

#[test]
fn random_sweep_within_tolerance() {
    let mut bench = cordic_bench();
    let oracle = RotationOracle::default();
    let mut rng = StdRng::seed_from_u64(0x7117);
    for _ in 0..200 {
        let vector = RotationVector {
            x: rng.gen(),
            y: rng.gen(),
            expected_deg: 0.0,
        };
        let r = oracle.check(&mut bench, vector).unwrap();
        assert!(r.error_deg < 0.5, "{r:?}");
    }
}

#[test]
fn tight_tolerance_reports_mismatch() {
    let mut bench = cordic_bench();
    let oracle = RotationOracle {
        tolerance_deg: 1e-6,
        ..Default::default()
    };
    let err = oracle
        .check(
            &mut bench,
            RotationVector {
                x: -32768,
                y: 1,
                expected_deg: 180.0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Mismatch);
    assert!(err.to_string().contains("angle of (-32768, 1)"));
}

/// A rotation block that reports -180 for a vector just above the negative
/// X axis.
struct WrongSideOfCut(CordicModel);

impl Device for WrongSideOfCut {
    fn name(&self) -> &str {
        "wrong_side_of_cut"
    }

    fn ports(&self) -> &PortTable {
        self.0.ports()
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        self.0.ports_mut()
    }

    fn eval(&mut self) -> Result<(), SimError> {
        self.0.eval()?;
        let ports = self.0.ports_mut();
        let above_cut =
            ports.sample_signed("x_in")? == -32768 && ports.sample_signed("y_in")? == 1;
        if above_cut && ports.sample("done")? == 1 {
            ports.drive_u64("angle_out", 0x8000)?;
        }
        Ok(())
    }
}

#[test]
fn branch_cut_side_is_checked() {
    let mut bench = Bench::new(WrongSideOfCut(CordicModel::new()), clock()).unwrap();
    bench.write_u64("start", 0).unwrap();
    bench.reset(&reset()).unwrap();
    let err = RotationOracle::default()
        .check(
            &mut bench,
            RotationVector {
                x: -32768,
                y: 1,
                expected_deg: 180.0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Mismatch);
    assert!(err.to_string().contains("-180.000 deg"), "{err}");

    // The mirrored vector really is at -180 and still passes.
    let below = RotationOracle::default()
        .check(
            &mut bench,
            RotationVector {
                x: -32768,
                y: -1,
                expected_deg: -180.0,
            },
        )
        .unwrap();
    assert!(below.error_deg < 1.0);
}

#[test]
fn done_cap_is_enforced() {
    let mut bench = cordic_bench();
    let oracle = RotationOracle {
        done_cap: 8,
        ..Default::default()
    };
    let err = oracle
        .check(
            &mut bench,
            RotationVector {
                x: 1,
                y: 1,
                expected_deg: 45.0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Timeout);
}

#[test]
fn indeterminate_block_is_reported() {
    // Never reset: the outputs stay undriven.
    let mut bench = Bench::new(CordicModel::new(), clock()).unwrap();
    let err = RotationOracle::default().run(&mut bench).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Indeterminate);
}

fn kalman_bench() -> Bench<KalmanModel> {
    Bench::new(KalmanModel::new(), clock()).unwrap()
}

#[test]
fn filter_scenarios_pass() {
    let mut bench = kalman_bench();
    let values = FilterOracle::new(reset()).run(&mut bench).unwrap();
    assert_eq!(values, vec![991, 91]);
}

#[test]
fn filter_scenarios_are_independent_of_order() {
    let mut bench = kalman_bench();
    let oracle = FilterOracle::new(reset());
    let direction = oracle.run_scenario(&mut bench, &FILTER_SCENARIOS[1]).unwrap();
    let converge = oracle.run_scenario(&mut bench, &FILTER_SCENARIOS[0]).unwrap();
    assert_eq!((converge, direction), (991, 91));
}

/// A filter whose output reads -3 for the whole cycle after its fifth
/// update and is correct otherwise.
struct DipAfterFifth {
    inner: KalmanModel,
    clk: EdgeDetector,
    updates: u32,
}

impl Device for DipAfterFifth {
    fn name(&self) -> &str {
        "kalman_dip"
    }

    fn ports(&self) -> &PortTable {
        self.inner.ports()
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        self.inner.ports_mut()
    }

    fn eval(&mut self) -> Result<(), SimError> {
        let edge = self.clk.update(self.inner.ports().sample_bit("clk")?);
        if edge == Some(Edge::Rising) && self.inner.ports().sample("en")? == 1 {
            self.updates += 1;
        }
        self.inner.eval()?;
        if self.updates == 5 {
            self.inner.ports_mut().drive_u64("angle_out", (-3i16) as u16 as u64)?;
        }
        Ok(())
    }
}

#[test]
fn direction_must_stay_positive_after_every_pulse() {
    let mut bench = Bench::new(
        DipAfterFifth {
            inner: KalmanModel::new(),
            clk: EdgeDetector::new(),
            updates: 0,
        },
        clock(),
    )
    .unwrap();
    let err = FilterOracle::new(reset())
        .run_scenario(&mut bench, &FILTER_SCENARIOS[1])
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Mismatch);
    assert!(
        err.to_string()
            .contains("rate_direction pulse 5: expected to stay > 0, observed -3"),
        "{err}"
    );
}

#[test]
fn filter_failure_reports_both_values() {
    let mut bench = kalman_bench();
    let scenario = FilterScenario {
        name: "too_few_pulses",
        measurement: 1000,
        rate: 0,
        pulses: 5,
        check: FilterCheck::Near {
            target: 1000,
            tolerance: 10,
        },
    };
    let err = FilterOracle::new(reset())
        .run_scenario(&mut bench, &scenario)
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Mismatch);
    assert!(err.to_string().contains("expected 1000 +/- 10"));
}
