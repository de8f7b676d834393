//! Fixed-point predict/update angle filter.
//!
//! The angle is kept in a Q8 accumulator. Each enabled cycle integrates the
//! gyro rate (scaled down by `RATE_SHIFT`) and then pulls the prediction
//! towards the measured angle with a constant gain of `2^-GAIN_SHIFT`.

use tilt_sim::{Device, PortTable, SimError};

use crate::sync::{ClockReset, Step};

/// Fraction bits of the accumulator.
const FRAC_BITS: u32 = 8;
/// Rate integration scale, as a right shift.
pub const RATE_SHIFT: u32 = 6;
/// Measurement gain, as a right shift.
pub const GAIN_SHIFT: u32 = 6;

/// The filter state.
#[derive(Clone, Debug, Default)]
pub struct KalmanCore {
    acc: i64,
}

impl KalmanCore {
    /// Clears the accumulated angle.
    pub fn reset(&mut self) {
        self.acc = 0;
    }

    /// One predict/update step. Returns the new angle estimate.
    pub fn update(&mut self, measured: i16, rate: i16) -> i16 {
        let predicted = self.acc + ((i64::from(rate) << FRAC_BITS) >> RATE_SHIFT);
        let innovation = (i64::from(measured) << FRAC_BITS) - predicted;
        self.acc = predicted + (innovation >> GAIN_SHIFT);
        self.angle()
    }

    /// The current angle estimate.
    pub fn angle(&self) -> i16 {
        (self.acc >> FRAC_BITS).clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
    }
}

/// The filter block on its own ports.
///
/// Inputs `en`, `angle_m[16]` and `rate[16]` (both signed); output
/// `angle_out[16]`.
pub struct KalmanModel {
    ports: PortTable,
    sync: ClockReset,
    core: KalmanCore,
}

impl KalmanModel {
    /// Creates the block with its output undriven.
    pub fn new() -> Self {
        Self {
            ports: PortTable::new()
                .input("clk", 1)
                .input("rst_n", 1)
                .input("en", 1)
                .input("angle_m", 16)
                .input("rate", 16)
                .output("angle_out", 16),
            sync: ClockReset::default(),
            core: KalmanCore::default(),
        }
    }
}

impl Default for KalmanModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for KalmanModel {
    fn name(&self) -> &str {
        "kalman"
    }

    fn ports(&self) -> &PortTable {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    fn eval(&mut self) -> Result<(), SimError> {
        match self.sync.step(&self.ports)? {
            Step::Reset => self.core.reset(),
            Step::Rising => {
                if self.ports.sample_bit("en")? {
                    let measured = self.ports.sample_signed("angle_m")? as i16;
                    let rate = self.ports.sample_signed("rate")? as i16;
                    self.core.update(measured, rate);
                }
            }
            Step::Hold => return Ok(()),
        }
        self.ports
            .drive_u64("angle_out", u64::from(self.core.angle() as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_steady_measurement() {
        let mut k = KalmanCore::default();
        for _ in 0..300 {
            k.update(1000, 0);
        }
        assert_eq!(k.angle(), 991);
    }

    #[test]
    fn rate_moves_estimate() {
        let mut k = KalmanCore::default();
        assert_eq!(k.update(0, 640), 9);
        for _ in 0..9 {
            k.update(0, 640);
        }
        assert_eq!(k.angle(), 91);
    }

    #[test]
    fn negative_rate_moves_down() {
        let mut k = KalmanCore::default();
        for _ in 0..10 {
            k.update(0, -640);
        }
        assert!(k.angle() < 0);
        k.reset();
        assert_eq!(k.angle(), 0);
    }
}
