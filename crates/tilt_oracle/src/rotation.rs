//! Rotation oracle: the block's fixed-point angle against `atan2`.
//!
//! The block reports angles on a 16-bit scale where 32768 is 180 degrees.
//! Each vector is applied with a one-cycle start pulse; the angle is only
//! sampled once `done` rises, and `done` must rise within a cycle cap.

use serde::Serialize;
use tilt_sim::{Bench, Device, SimError};
use tracing::{debug, info};

/// One input vector and the angle it should produce.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RotationVector {
    /// X component.
    pub x: i16,
    /// Y component.
    pub y: i16,
    /// Expected angle in degrees.
    pub expected_deg: f64,
}

const fn v(x: i16, y: i16, expected_deg: f64) -> RotationVector {
    RotationVector { x, y, expected_deg }
}

/// The fixed vector table: the four diagonals, the axes at both moderate
/// and full-scale magnitude, the origin, and the two vectors either side of
/// the negative X axis.
pub const ROTATION_VECTORS: [RotationVector; 15] = [
    v(10000, 10000, 45.0),
    v(10000, 0, 0.0),
    v(0, 10000, 90.0),
    v(-10000, 10000, 135.0),
    v(-10000, -10000, -135.0),
    v(10000, -10000, -45.0),
    v(0, 0, 0.0),
    v(32767, 0, 0.0),
    v(0, 32767, 90.0),
    v(-32768, 0, 180.0),
    v(0, -32768, -90.0),
    v(32767, 32767, 45.0),
    v(-32768, -32768, -135.0),
    v(-32768, 1, 180.0),
    v(-32768, -1, -180.0),
];

/// Full-precision `atan2(y, x)` in degrees, with the origin defined as 0.
pub fn reference_degrees(x: i16, y: i16) -> f64 {
    if x == 0 && y == 0 {
        return 0.0;
    }
    f64::from(y).atan2(f64::from(x)).to_degrees()
}

/// Converts a block angle to degrees.
pub fn raw_to_degrees(raw: i64) -> f64 {
    raw as f64 * 180.0 / 32768.0
}

/// Absolute difference between two angles in degrees.
///
/// No wrap-around: +180 and -180 are a full turn apart, so a result on the
/// wrong side of the negative X axis fails.
pub fn angle_error(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Port names of the rotation block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationPorts {
    /// One-cycle start pulse.
    pub start: String,
    /// Signed X input.
    pub x: String,
    /// Signed Y input.
    pub y: String,
    /// Signed angle output.
    pub angle: String,
    /// Completion flag.
    pub done: String,
}

impl Default for RotationPorts {
    fn default() -> Self {
        Self {
            start: "start".into(),
            x: "x_in".into(),
            y: "y_in".into(),
            angle: "angle_out".into(),
            done: "done".into(),
        }
    }
}

/// What one vector produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RotationResult {
    /// The vector applied.
    pub vector: RotationVector,
    /// `atan2` of the vector.
    pub reference_deg: f64,
    /// The block's answer.
    pub observed_deg: f64,
    /// Absolute difference between the two, in degrees.
    pub error_deg: f64,
    /// Cycles from start to done.
    pub latency: u64,
}

/// Checks the rotation block vector by vector.
#[derive(Clone, Debug)]
pub struct RotationOracle {
    /// Port names.
    pub ports: RotationPorts,
    /// Largest accepted error in degrees.
    pub tolerance_deg: f64,
    /// Cycles to wait for done.
    pub done_cap: u64,
}

impl Default for RotationOracle {
    fn default() -> Self {
        Self {
            ports: RotationPorts::default(),
            tolerance_deg: 1.0,
            done_cap: 64,
        }
    }
}

impl RotationOracle {
    /// Applies one vector and checks the result.
    pub fn check<D: Device>(
        &self,
        bench: &mut Bench<D>,
        vector: RotationVector,
    ) -> Result<RotationResult, SimError> {
        let p = &self.ports;
        bench.write_i64(&p.x, i64::from(vector.x))?;
        bench.write_i64(&p.y, i64::from(vector.y))?;
        bench.write_u64(&p.start, 1)?;
        bench.rising_edge()?;
        bench.write_u64(&p.start, 0)?;
        let what = format!("done for ({}, {})", vector.x, vector.y);
        let latency = 1 + bench.wait_until(&what, self.done_cap, |b| {
            Ok(b.read_u64(&p.done)? == 1)
        })?;

        let observed_deg = raw_to_degrees(bench.read_i64(&p.angle)?);
        let reference_deg = reference_degrees(vector.x, vector.y);
        let error_deg = angle_error(observed_deg, reference_deg);
        debug!(
            x = vector.x,
            y = vector.y,
            observed_deg,
            reference_deg,
            latency,
            "rotation vector"
        );
        if error_deg > self.tolerance_deg {
            return Err(SimError::mismatch(
                format!("angle of ({}, {})", vector.x, vector.y),
                format!("{reference_deg:.3} deg +/- {}", self.tolerance_deg),
                format!("{observed_deg:.3} deg"),
                bench.stamp(),
            ));
        }
        Ok(RotationResult {
            vector,
            reference_deg,
            observed_deg,
            error_deg,
            latency,
        })
    }

    /// Runs the whole vector table.
    pub fn run<D: Device>(&self, bench: &mut Bench<D>) -> Result<Vec<RotationResult>, SimError> {
        let results = ROTATION_VECTORS
            .iter()
            .map(|&v| self.check(bench, v))
            .collect::<Result<Vec<_>, _>>()?;
        let worst = results.iter().map(|r| r.error_deg).fold(0.0, f64::max);
        info!(vectors = results.len(), worst_deg = worst, "rotation table passed");
        Ok(results)
    }
}
