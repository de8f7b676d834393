//! Vectoring-mode CORDIC: `(x, y)` to `atan2(y, x)`.
//!
//! Angles use a 16-bit scale where 32768 is 180 degrees. Vectors in the left
//! half plane are first rotated by a quarter turn so the iterations only ever
//! see `x >= 0`; sixteen shift-and-add iterations then drive `y` to zero
//! while accumulating the rotation in `z`.

use tilt_sim::{Device, PortTable, SimError};
use tracing::trace;

use crate::sync::{ClockReset, Step};

/// `atan(2^-i)` in angle units, for `i` in `0..16`.
pub const ATAN_TABLE: [i32; 16] = [
    8192, 4836, 2555, 1297, 651, 326, 163, 81, 41, 20, 10, 5, 3, 1, 1, 0,
];

/// A quarter turn in angle units.
const QUARTER: i32 = 16384;

/// One CORDIC engine, one iteration per clock.
#[derive(Clone, Debug, Default)]
pub struct CordicCore {
    x: i32,
    y: i32,
    z: i32,
    iteration: usize,
    origin: bool,
    busy: bool,
    done: bool,
    angle: i16,
}

impl CordicCore {
    /// Returns to the idle state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advances one clock. `start` is ignored while busy.
    pub fn tick(&mut self, start: bool, x: i16, y: i16) {
        self.done = false;
        if self.busy {
            self.iterate();
            return;
        }
        if start {
            self.load(i32::from(x), i32::from(y));
        }
    }

    fn load(&mut self, x: i32, y: i32) {
        self.origin = x == 0 && y == 0;
        (self.x, self.y, self.z) = match (x < 0, y >= 0) {
            (true, true) => (y, -x, QUARTER),
            (true, false) => (-y, x, -QUARTER),
            (false, _) => (x, y, 0),
        };
        self.iteration = 0;
        self.busy = true;
    }

    fn iterate(&mut self) {
        let i = self.iteration;
        let (x, y) = (self.x, self.y);
        if y > 0 {
            self.x = x + (y >> i);
            self.y = y - (x >> i);
            self.z += ATAN_TABLE[i];
        } else {
            self.x = x - (y >> i);
            self.y = y + (x >> i);
            self.z -= ATAN_TABLE[i];
        }
        self.iteration += 1;
        if self.iteration == ATAN_TABLE.len() {
            self.busy = false;
            self.done = true;
            self.angle = if self.origin {
                0
            } else {
                self.z.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
            };
            trace!(angle = self.angle, "cordic done");
        }
    }

    /// Whether an angle is being computed.
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// High for the one cycle a new angle appears.
    pub fn done(&self) -> bool {
        self.done
    }

    /// The last computed angle.
    pub fn angle(&self) -> i16 {
        self.angle
    }
}

/// Runs a [`CordicCore`] to completion.
pub fn cordic_angle(x: i16, y: i16) -> i16 {
    let mut core = CordicCore::default();
    core.tick(true, x, y);
    while core.busy() {
        core.tick(false, 0, 0);
    }
    core.angle()
}

/// The CORDIC block on its own ports.
///
/// Inputs `start`, `x_in[16]`, `y_in[16]`; outputs `angle_out[16]`, `busy`
/// and a one-cycle `done`.
pub struct CordicModel {
    ports: PortTable,
    sync: ClockReset,
    core: CordicCore,
}

impl CordicModel {
    /// Creates the block with all outputs undriven.
    pub fn new() -> Self {
        Self {
            ports: PortTable::new()
                .input("clk", 1)
                .input("rst_n", 1)
                .input("start", 1)
                .input("x_in", 16)
                .input("y_in", 16)
                .output("angle_out", 16)
                .output("busy", 1)
                .output("done", 1),
            sync: ClockReset::default(),
            core: CordicCore::default(),
        }
    }

    fn drive(&mut self) -> Result<(), SimError> {
        self.ports
            .drive_u64("angle_out", u64::from(self.core.angle() as u16))?;
        self.ports.drive_u64("busy", u64::from(self.core.busy()))?;
        self.ports.drive_u64("done", u64::from(self.core.done()))
    }
}

impl Default for CordicModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for CordicModel {
    fn name(&self) -> &str {
        "cordic"
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
                let start = self.ports.sample_bit("start")?;
                let x = self.ports.sample_signed("x_in")? as i16;
                let y = self.ports.sample_signed("y_in")? as i16;
                self.core.tick(start, x, y);
            }
            Step::Hold => return Ok(()),
        }
        self.drive()
    }
}
