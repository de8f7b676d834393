//! 8N1 serial transmitter.

use tilt_sim::{Device, PortTable, SimError};
use tracing::trace;

use crate::sync::{ClockReset, Step};

/// Frame slots: start bit, eight data bits, stop bit.
const FRAME_SLOTS: u8 = 10;

/// Transmitter state, one bit every `baud_div` clocks.
#[derive(Clone, Debug)]
pub struct UartTxCore {
    baud_div: u32,
    busy: bool,
    done: bool,
    tx: bool,
    shift: u8,
    slot: u8,
    count: u32,
}

impl UartTxCore {
    /// A transmitter holding each bit for `baud_div` clocks.
    pub fn new(baud_div: u32) -> Self {
        Self {
            baud_div: baud_div.max(1),
            busy: false,
            done: false,
            tx: true,
            shift: 0,
            slot: 0,
            count: 0,
        }
    }

    /// Returns to idle with the line high.
    pub fn reset(&mut self) {
        *self = Self::new(self.baud_div);
    }

    /// Advances one clock. A `start` seen while idle latches `data` and
    /// drives the start bit on this same clock.
    pub fn tick(&mut self, start: bool, data: u8) {
        self.done = false;
        if !self.busy {
            if start {
                trace!(data, "uart tx start");
                self.busy = true;
                self.shift = data;
                self.slot = 0;
                self.count = 0;
                self.tx = false;
            }
            return;
        }
        self.count += 1;
        if self.count < self.baud_div {
            return;
        }
        self.count = 0;
        self.slot += 1;
        match self.slot {
            1..=8 => {
                self.tx = self.shift & 1 == 1;
                self.shift >>= 1;
            }
            9 => self.tx = true,
            _ => {
                debug_assert_eq!(self.slot, FRAME_SLOTS);
                self.busy = false;
                self.done = true;
                self.tx = true;
            }
        }
    }

    /// Whether a frame is in flight.
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// High for the one cycle after the stop bit ends.
    pub fn done(&self) -> bool {
        self.done
    }

    /// The serial line level.
    pub fn tx(&self) -> bool {
        self.tx
    }
}

/// The transmitter on its own ports.
///
/// Inputs `data_in[8]` and `start`; outputs `busy`, `done` and `tx`.
pub struct UartTxModel {
    ports: PortTable,
    sync: ClockReset,
    core: UartTxCore,
}

impl UartTxModel {
    /// A transmitter with `baud_div` clocks per bit.
    pub fn new(baud_div: u32) -> Self {
        Self {
            ports: PortTable::new()
                .input("clk", 1)
                .input("rst_n", 1)
                .input("data_in", 8)
                .input("start", 1)
                .output("busy", 1)
                .output("done", 1)
                .output("tx", 1),
            sync: ClockReset::default(),
            core: UartTxCore::new(baud_div),
        }
    }
}

impl Device for UartTxModel {
    fn name(&self) -> &str {
        "uart_tx"
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
                let data = self.ports.sample("data_in")? as u8;
                self.core.tick(start, data);
            }
            Step::Hold => return Ok(()),
        }
        self.ports.drive_u64("busy", u64::from(self.core.busy()))?;
        self.ports.drive_u64("done", u64::from(self.core.done()))?;
        self.ports.drive_u64("tx", u64::from(self.core.tx()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        let mut tx = UartTxCore::new(2);
        tx.tick(true, 0x41);
        let mut line = vec![tx.tx()];
        while !tx.done() {
            tx.tick(false, 0);
            line.push(tx.tx());
        }
        // start, 1000_0010 LSB first, stop, each two clocks, then idle.
        let bits = [0, 1, 0, 0, 0, 0, 0, 1, 0, 1];
        let expected: Vec<bool> = bits
            .iter()
            .flat_map(|&b| [b == 1, b == 1])
            .chain([true])
            .collect();
        assert_eq!(line, expected);
        assert!(!tx.busy());
    }

    #[test]
    fn start_ignored_while_busy() {
        let mut tx = UartTxCore::new(1);
        tx.tick(true, 0xFF);
        tx.tick(true, 0x00);
        assert!(tx.tx());
    }
}
