//! A controller that lets go of select in the middle of a byte.

use tilt_sim::{Device, PortTable, SimError};

use crate::sync::{ClockReset, Step};

/// Clocks out the top `bits` bits of `command` and then releases select.
///
/// Two clocks after reset select goes low; each bit then takes one clock
/// with the bus clock low and one with it high. Select is released right
/// after the last rising bus clock edge and stays released.
pub struct SelectGlitch {
    ports: PortTable,
    sync: ClockReset,
    command: u8,
    bits: u8,
    tick: u32,
}

impl SelectGlitch {
    /// Releases select after `bits` (at most 8) bits of `command`.
    pub fn new(command: u8, bits: u8) -> Self {
        Self {
            ports: PortTable::new()
                .input("clk", 1)
                .input("rst_n", 1)
                .input("spi_miso", 1)
                .output("spi_cs_n", 1)
                .output("spi_sclk", 1)
                .output("spi_mosi", 1),
            sync: ClockReset::default(),
            command,
            bits: bits.min(8),
            tick: 0,
        }
    }

    fn lines(&self) -> (bool, bool, bool) {
        let bits = u32::from(self.bits);
        match self.tick {
            0..=1 => (true, true, false),
            t if t - 2 < 2 * bits => {
                let k = t - 2;
                let mosi = (self.command >> (7 - k / 2)) & 1 == 1;
                (false, k % 2 == 1, mosi)
            }
            _ => (true, true, false),
        }
    }
}

impl Device for SelectGlitch {
    fn name(&self) -> &str {
        "select_glitch"
    }

    fn ports(&self) -> &PortTable {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    fn eval(&mut self) -> Result<(), SimError> {
        match self.sync.step(&self.ports)? {
            Step::Reset => self.tick = 0,
            Step::Rising => self.tick = self.tick.saturating_add(1),
            Step::Hold => return Ok(()),
        }
        let (cs_n, sclk, mosi) = self.lines();
        self.ports.drive_u64("spi_cs_n", u64::from(cs_n))?;
        self.ports.drive_u64("spi_sclk", u64::from(sclk))?;
        self.ports.drive_u64("spi_mosi", u64::from(mosi))
    }
}
