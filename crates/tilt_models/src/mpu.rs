//! Inertial sensor polling state machine.
//!
//! After power-up the driver waits, wakes the sensor by writing `0x00` to the
//! power-management register (`0x6B`), then polls it forever: every
//! `timer_limit` clocks it issues the burst-read command `0xBB` and clocks in
//! fourteen bytes, one SPI transfer each, with select held low for the whole
//! transaction. When the burst completes the seven big-endian words are
//! latched and `valid` pulses for one cycle.

use tilt_sim::{Device, PortTable, SimError};
use tracing::{debug, trace};

use crate::spi_master::SpiMasterCore;
use crate::sync::{ClockReset, Step};

/// Power-management register address.
const PWR_MGMT_1: u8 = 0x6B;
/// Burst read of the accel, temperature and gyro block.
const BURST_READ: u8 = 0xBB;
/// Bytes in a burst.
const BURST_LEN: usize = 14;

/// Driver states, numbered as on the `state` output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
    Init = 0,
    WakeWrite1 = 1,
    WakeWait1 = 2,
    WakeWrite2 = 3,
    WakeWait2 = 4,
    Idle = 5,
    ReadCommand = 6,
    ReadCommandWait = 7,
    ReadBurst = 8,
}

/// Delays and bus speed of the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MpuTiming {
    /// Clocks spent in `Init` after reset.
    pub init_wait_cycles: u32,
    /// Clocks between polls.
    pub timer_limit: u32,
    /// Clocks per bus clock half period.
    pub clk_div: u32,
}

/// One latched burst.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SensorSample {
    /// Acceleration X.
    pub accel_x: u16,
    /// Acceleration Y.
    pub accel_y: u16,
    /// Acceleration Z.
    pub accel_z: u16,
    /// Die temperature.
    pub temp: u16,
    /// Rotation rate X.
    pub gyro_x: u16,
    /// Rotation rate Y.
    pub gyro_y: u16,
    /// Rotation rate Z.
    pub gyro_z: u16,
}

impl SensorSample {
    fn from_burst(b: &[u8; BURST_LEN]) -> Self {
        let word = |i: usize| u16::from_be_bytes([b[2 * i], b[2 * i + 1]]);
        Self {
            accel_x: word(0),
            accel_y: word(1),
            accel_z: word(2),
            temp: word(3),
            gyro_x: word(4),
            gyro_y: word(5),
            gyro_z: word(6),
        }
    }

    fn fields(&self) -> [(&'static str, u16); 7] {
        [
            ("accel_x", self.accel_x),
            ("accel_y", self.accel_y),
            ("accel_z", self.accel_z),
            ("temp", self.temp),
            ("gyro_x", self.gyro_x),
            ("gyro_y", self.gyro_y),
            ("gyro_z", self.gyro_z),
        ]
    }
}

/// The driver with its SPI controller.
#[derive(Clone, Debug)]
pub struct MpuCore {
    timing: MpuTiming,
    phase: Phase,
    counter: u32,
    cs_n: bool,
    spi_start: bool,
    spi_done: bool,
    tx_byte: u8,
    rx_byte: u8,
    master: SpiMasterCore,
    burst: [u8; BURST_LEN],
    index: usize,
    awaiting: bool,
    valid: bool,
    sample: SensorSample,
}

impl MpuCore {
    /// A driver with the given delays.
    pub fn new(timing: MpuTiming) -> Self {
        Self {
            timing,
            phase: Phase::Init,
            counter: 0,
            cs_n: true,
            spi_start: false,
            spi_done: false,
            tx_byte: 0,
            rx_byte: 0,
            master: SpiMasterCore::new(timing.clk_div),
            burst: [0; BURST_LEN],
            index: 0,
            awaiting: false,
            valid: false,
            sample: SensorSample::default(),
        }
    }

    /// Returns to `Init`.
    pub fn reset(&mut self) {
        *self = Self::new(self.timing);
    }

    fn request(&mut self, byte: u8) {
        self.tx_byte = byte;
        self.spi_start = true;
    }

    /// Advances one clock. `miso` is the line as it stood before the edge.
    pub fn tick(&mut self, miso: bool) {
        // Hand-offs registered on the previous clock.
        let start = std::mem::take(&mut self.spi_start);
        let done = std::mem::take(&mut self.spi_done);
        let rx = self.rx_byte;
        self.valid = false;

        if let Some(byte) = self.master.tick(start, self.tx_byte, miso) {
            self.rx_byte = byte;
            self.spi_done = true;
        }

        let before = self.phase;
        match self.phase {
            Phase::Init => {
                self.counter += 1;
                if self.counter >= self.timing.init_wait_cycles {
                    self.counter = 0;
                    self.phase = Phase::WakeWrite1;
                }
            }
            Phase::WakeWrite1 => {
                self.cs_n = false;
                self.request(PWR_MGMT_1);
                self.phase = Phase::WakeWait1;
            }
            Phase::WakeWait1 => {
                if done {
                    self.phase = Phase::WakeWrite2;
                }
            }
            Phase::WakeWrite2 => {
                self.request(0x00);
                self.phase = Phase::WakeWait2;
            }
            Phase::WakeWait2 => {
                if done {
                    self.cs_n = true;
                    self.phase = Phase::Idle;
                }
            }
            Phase::Idle => {
                self.counter += 1;
                if self.counter >= self.timing.timer_limit {
                    self.counter = 0;
                    self.phase = Phase::ReadCommand;
                }
            }
            Phase::ReadCommand => {
                self.cs_n = false;
                self.request(BURST_READ);
                self.phase = Phase::ReadCommandWait;
            }
            Phase::ReadCommandWait => {
                if done {
                    self.index = 0;
                    self.awaiting = false;
                    self.phase = Phase::ReadBurst;
                }
            }
            Phase::ReadBurst => {
                if !self.awaiting {
                    self.request(0x00);
                    self.awaiting = true;
                } else if done {
                    self.burst[self.index] = rx;
                    self.index += 1;
                    self.awaiting = false;
                    if self.index == BURST_LEN {
                        self.sample = SensorSample::from_burst(&self.burst);
                        self.valid = true;
                        self.cs_n = true;
                        self.phase = Phase::Idle;
                        debug!(sample = ?self.sample, "burst latched");
                    }
                }
            }
        }
        if self.phase != before {
            trace!(from = before as u8, to = self.phase as u8, "mpu state");
        }
    }

    /// The `state` output code.
    pub fn state(&self) -> u8 {
        self.phase as u8
    }

    /// Active-low select.
    pub fn cs_n(&self) -> bool {
        self.cs_n
    }

    /// The SPI controller.
    pub fn master(&self) -> &SpiMasterCore {
        &self.master
    }

    /// High for the cycle a new sample is latched.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The last latched sample.
    pub fn sample(&self) -> &SensorSample {
        &self.sample
    }

    /// Transfer request registered for the next clock.
    pub fn spi_start(&self) -> bool {
        self.spi_start
    }

    /// Transfer completion registered on this clock.
    pub fn spi_done(&self) -> bool {
        self.spi_done
    }
}

/// The driver on discrete ports.
///
/// Input `spi_miso`; outputs `spi_cs_n`, `spi_sclk`, `spi_mosi`, the
/// `state[4]` code, the `spi_start`/`spi_done` handshake, `valid` and the
/// seven 16-bit sample words.
pub struct MpuModel {
    ports: PortTable,
    sync: ClockReset,
    core: MpuCore,
}

impl MpuModel {
    /// A driver with the given delays.
    pub fn new(timing: MpuTiming) -> Self {
        let mut ports = PortTable::new()
            .input("clk", 1)
            .input("rst_n", 1)
            .input("spi_miso", 1)
            .output("spi_cs_n", 1)
            .output("spi_sclk", 1)
            .output("spi_mosi", 1)
            .output("state", 4)
            .output("spi_start", 1)
            .output("spi_done", 1)
            .output("valid", 1);
        for (name, _) in SensorSample::default().fields() {
            ports = ports.output(name, 16);
        }
        Self {
            ports,
            sync: ClockReset::default(),
            core: MpuCore::new(timing),
        }
    }

    fn drive(&mut self) -> Result<(), SimError> {
        let core = &self.core;
        let p = &mut self.ports;
        p.drive_u64("spi_cs_n", u64::from(core.cs_n()))?;
        p.drive_u64("spi_sclk", u64::from(core.master().sclk()))?;
        p.drive_u64("spi_mosi", u64::from(core.master().mosi()))?;
        p.drive_u64("state", u64::from(core.state()))?;
        p.drive_u64("spi_start", u64::from(core.spi_start()))?;
        p.drive_u64("spi_done", u64::from(core.spi_done()))?;
        p.drive_u64("valid", u64::from(core.valid()))?;
        for (name, value) in core.sample().fields() {
            p.drive_u64(name, u64::from(value))?;
        }
        Ok(())
    }
}

impl Device for MpuModel {
    fn name(&self) -> &str {
        "mpu_fsm"
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
                let miso = self.ports.sample_bit("spi_miso")?;
                self.core.tick(miso);
            }
            Step::Hold => return Ok(()),
        }
        self.drive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> MpuTiming {
        MpuTiming {
            init_wait_cycles: 10,
            timer_limit: 20,
            clk_div: 2,
        }
    }

    /// Runs the core with MISO tied to `miso` and returns the state trace.
    fn run(core: &mut MpuCore, miso: bool, cycles: usize) -> Vec<u8> {
        (0..cycles)
            .map(|_| {
                core.tick(miso);
                core.state()
            })
            .collect()
    }

    #[test]
    fn walks_through_every_state() {
        let mut core = MpuCore::new(timing());
        let mut trace = run(&mut core, true, 2000);
        trace.dedup();
        assert_eq!(&trace[..10], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 5]);
    }

    #[test]
    fn burst_of_ones_latches_all_ones() {
        let mut core = MpuCore::new(timing());
        let mut latched = false;
        for _ in 0..2000 {
            core.tick(true);
            if core.valid() {
                latched = true;
                break;
            }
        }
        assert!(latched);
        assert_eq!(core.sample().accel_x, 0xFFFF);
        assert_eq!(core.sample().gyro_z, 0xFFFF);
        assert!(core.cs_n());
    }

    #[test]
    fn words_are_big_endian() {
        let mut burst = [0u8; BURST_LEN];
        burst[4] = 0x40;
        burst[12] = 0x02;
        burst[13] = 0x80;
        let s = SensorSample::from_burst(&burst);
        assert_eq!(s.accel_z, 16384);
        assert_eq!(s.gyro_z, 640);
    }
}
