//! Peripheral-side models of a mode-3 synchronous serial bus.
//!
//! In mode 3 the bus clock idles high, the controller changes MOSI on the
//! falling edge and both sides sample on the rising edge. Every byte is
//! shifted MSB first and a transaction lasts as long as the active-low select
//! line is held low.
//!
//! Two peripheral roles implement [`BusPeripheral`]:
//!
//! - [`RawToggler`] ignores framing and drives MISO high while selected and
//!   low otherwise, so every byte the controller reads is `0xFF`.
//! - [`FramedSlave`] shifts in a command byte and, for the burst opcode,
//!   shifts out a fixed sensor payload. Other commands get silence.
//!
//! [`SpiPeripheral`] wraps either role into an [`EdgeTask`] that watches the
//! bus lines at every clock edge and owns the MISO input.

use serde::Serialize;
use tilt_sim::{Edge, EdgeDetector, EdgeTask, Pin, SignalBus, SimError, Stamp};
use tracing::{debug, trace, warn};

/// Bytes in one burst read: accel X/Y/Z, temperature, gyro X/Y/Z.
pub const SENSOR_BURST_LEN: usize = 14;

/// The device signals that make up the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpiPins {
    /// Active-low select, device output.
    pub select: Pin,
    /// Bus clock, device output.
    pub sclk: Pin,
    /// Controller data out, device output.
    pub mosi: Pin,
    /// Peripheral data out, device input.
    pub miso: Pin,
}

/// The bus as one peripheral sees it at a clock edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusLines {
    /// Whether select is asserted. An undriven select reads as released.
    pub selected: bool,
    /// The bus clock transition since the previous edge, if any.
    pub sclk: Option<Edge>,
    /// Current MOSI level.
    pub mosi: bool,
}

/// One peripheral role on the bus.
pub trait BusPeripheral {
    /// Name used in logs.
    fn label(&self) -> String;

    /// Called once when select goes low.
    fn on_select_asserted(&mut self, at: Stamp);

    /// Called once when select goes high again.
    fn on_select_released(&mut self, _at: Stamp) -> Result<(), SimError> {
        Ok(())
    }

    /// Reacts to one clock edge and returns the MISO level to drive.
    fn drive_one_cycle(&mut self, lines: BusLines, at: Stamp) -> Result<bool, SimError>;
}

/// Drives a fixed level while selected and its complement otherwise.
#[derive(Clone, Debug)]
pub struct RawToggler {
    level: bool,
}

impl RawToggler {
    /// A toggler that drives `level` while selected.
    pub fn new(level: bool) -> Self {
        Self { level }
    }
}

impl Default for RawToggler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BusPeripheral for RawToggler {
    fn label(&self) -> String {
        "raw toggler".into()
    }

    fn on_select_asserted(&mut self, at: Stamp) {
        trace!(%at, "toggler selected");
    }

    fn drive_one_cycle(&mut self, lines: BusLines, _at: Stamp) -> Result<bool, SimError> {
        Ok(if lines.selected { self.level } else { !self.level })
    }
}

/// What the framed slave does when select is released mid-byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Record the truncation and carry on.
    #[default]
    Tolerate,
    /// Fail the edge with [`SimError::TruncatedTransaction`].
    Fail,
}

/// A completed or aborted transaction seen by the framed slave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// The command byte, if all 8 bits arrived.
    pub command: Option<u8>,
    /// Payload bytes fully clocked out.
    pub payload_bytes: usize,
    /// When select was asserted.
    pub started: Stamp,
    /// Set if select was released mid-byte.
    pub truncation: Option<Truncation>,
}

/// Where a transaction was cut short.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Truncation {
    /// Interrupted byte: 0 is the command, 1.. are payload bytes.
    pub byte_index: usize,
    /// Bits of that byte already clocked.
    pub bits: u8,
    /// When select was released.
    pub at: Stamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Command { shift: u8, bits: u8 },
    Payload { byte: usize, bits: u8 },
    Silent,
}

/// A sensor that answers one burst-read opcode with a fixed payload.
#[derive(Clone, Debug)]
pub struct FramedSlave {
    opcode: u8,
    payload: Vec<u8>,
    policy: TruncationPolicy,
    phase: Phase,
    miso: bool,
    log: Vec<Transaction>,
}

impl FramedSlave {
    /// A slave answering `opcode` with `payload`.
    pub fn new(opcode: u8, payload: Vec<u8>, policy: TruncationPolicy) -> Self {
        Self {
            opcode,
            payload,
            policy,
            phase: Phase::Idle,
            miso: false,
            log: Vec::new(),
        }
    }

    /// The stock sensor: opcode `0xBB`, resting on Z with a 640 count gyro
    /// Z rate.
    pub fn sensor(policy: TruncationPolicy) -> Self {
        Self::new(0xBB, Self::sensor_payload().to_vec(), policy)
    }

    /// The stock burst: accel 0/0/16384, temperature 0, gyro 0/0/640.
    pub fn sensor_payload() -> [u8; SENSOR_BURST_LEN] {
        [
            0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x80,
        ]
    }

    /// Every transaction seen so far, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// The command bytes received so far.
    pub fn commands(&self) -> Vec<u8> {
        self.log.iter().filter_map(|t| t.command).collect()
    }

    /// Transactions that ended mid-byte.
    pub fn truncations(&self) -> Vec<Truncation> {
        self.log.iter().filter_map(|t| t.truncation).collect()
    }

    fn current(&mut self) -> Option<&mut Transaction> {
        self.log.last_mut()
    }

    fn bit_of(&self, byte: usize, bits: u8) -> bool {
        self.payload
            .get(byte)
            .is_some_and(|b| (b >> (7 - bits)) & 1 == 1)
    }

    fn on_sclk_rising(&mut self, mosi: bool) {
        match self.phase {
            Phase::Command { shift, bits } => {
                let shift = (shift << 1) | u8::from(mosi);
                if bits + 1 < 8 {
                    self.phase = Phase::Command {
                        shift,
                        bits: bits + 1,
                    };
                    return;
                }
                debug!(command = format_args!("{shift:#04x}"), "SPI command");
                if let Some(t) = self.current() {
                    t.command = Some(shift);
                }
                self.phase = if shift == self.opcode && !self.payload.is_empty() {
                    Phase::Payload { byte: 0, bits: 0 }
                } else {
                    Phase::Silent
                };
            }
            Phase::Payload { byte, bits } => {
                if bits + 1 < 8 {
                    self.phase = Phase::Payload {
                        byte,
                        bits: bits + 1,
                    };
                    return;
                }
                if let Some(t) = self.current() {
                    t.payload_bytes = byte + 1;
                }
                self.phase = if byte + 1 < self.payload.len() {
                    Phase::Payload {
                        byte: byte + 1,
                        bits: 0,
                    }
                } else {
                    Phase::Silent
                };
            }
            Phase::Idle | Phase::Silent => {}
        }
    }

    fn on_sclk_falling(&mut self) {
        match self.phase {
            Phase::Payload { byte, bits } => self.miso = self.bit_of(byte, bits),
            _ => self.miso = false,
        }
    }
}

impl BusPeripheral for FramedSlave {
    fn label(&self) -> String {
        format!("framed slave ({:#04x})", self.opcode)
    }

    fn on_select_asserted(&mut self, at: Stamp) {
        self.phase = Phase::Command { shift: 0, bits: 0 };
        self.miso = false;
        self.log.push(Transaction {
            command: None,
            payload_bytes: 0,
            started: at,
            truncation: None,
        });
    }

    fn on_select_released(&mut self, at: Stamp) -> Result<(), SimError> {
        let cut = match self.phase {
            Phase::Command { bits, .. } if bits > 0 => Some((0, bits)),
            Phase::Payload { byte, bits } if bits > 0 => Some((byte + 1, bits)),
            _ => None,
        };
        self.phase = Phase::Idle;
        self.miso = false;
        let Some((byte_index, bits)) = cut else {
            return Ok(());
        };
        let truncation = Truncation {
            byte_index,
            bits,
            at,
        };
        if let Some(t) = self.current() {
            t.truncation = Some(truncation);
        }
        match self.policy {
            TruncationPolicy::Tolerate => {
                warn!(byte_index, bits, %at, "select released mid-byte");
                Ok(())
            }
            TruncationPolicy::Fail => Err(SimError::TruncatedTransaction {
                byte_index,
                bits,
                at,
            }),
        }
    }

    fn drive_one_cycle(&mut self, lines: BusLines, _at: Stamp) -> Result<bool, SimError> {
        if lines.selected {
            match lines.sclk {
                Some(Edge::Rising) => self.on_sclk_rising(lines.mosi),
                Some(Edge::Falling) => self.on_sclk_falling(),
                None => {}
            }
        }
        Ok(self.miso)
    }
}

/// Runs a [`BusPeripheral`] on the bench as the owner of MISO.
#[derive(Clone, Debug)]
pub struct SpiPeripheral<P> {
    pins: SpiPins,
    peripheral: P,
    select: EdgeDetector,
    sclk: EdgeDetector,
}

impl<P: BusPeripheral> SpiPeripheral<P> {
    /// Attaches `peripheral` to the bus on `pins`.
    pub fn new(pins: SpiPins, peripheral: P) -> Self {
        Self {
            pins,
            peripheral,
            select: EdgeDetector::new(),
            sclk: EdgeDetector::new(),
        }
    }

    /// The wrapped role.
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// The bus pins.
    pub fn pins(&self) -> &SpiPins {
        &self.pins
    }
}

impl<P: BusPeripheral> EdgeTask for SpiPeripheral<P> {
    fn label(&self) -> String {
        self.peripheral.label()
    }

    fn driven_signals(&self) -> Vec<String> {
        vec![self.pins.miso.signal.clone()]
    }

    fn on_edge(&mut self, _edge: Edge, bus: &mut dyn SignalBus, at: Stamp) -> Result<(), SimError> {
        let select_high = bus.read_pin(&self.pins.select)?.or_idle(true);
        let sclk = bus.read_pin(&self.pins.sclk)?.or_idle(true);
        let mosi = bus.read_pin(&self.pins.mosi)?.or_idle(false);

        match self.select.update(select_high) {
            Some(Edge::Falling) => self.peripheral.on_select_asserted(at),
            Some(Edge::Rising) => self.peripheral.on_select_released(at)?,
            None => {}
        }
        let selected = !select_high;
        let sclk = self.sclk.update(sclk);
        let level = self.peripheral.drive_one_cycle(
            BusLines {
                selected,
                sclk: if selected { sclk } else { None },
                mosi,
            },
            at,
        )?;
        bus.write_pin(&self.pins.miso, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt_sim::{PortTable, SimTime};

    fn at(cycle: u64) -> Stamp {
        Stamp {
            cycle,
            time: SimTime::from_ns(cycle * 100),
        }
    }

    fn lines(sclk: Option<Edge>, mosi: bool) -> BusLines {
        BusLines {
            selected: true,
            sclk,
            mosi,
        }
    }

    /// Clocks one byte through a peripheral the way a mode-3 controller
    /// does and returns the byte read back.
    fn exchange(p: &mut impl BusPeripheral, byte: u8) -> u8 {
        let mut miso = 0u8;
        for i in (0..8).rev() {
            p.drive_one_cycle(lines(Some(Edge::Falling), false), at(0)).unwrap();
            let level = p
                .drive_one_cycle(lines(None, (byte >> i) & 1 == 1), at(0))
                .unwrap();
            miso = (miso << 1) | u8::from(level);
            p.drive_one_cycle(lines(Some(Edge::Rising), (byte >> i) & 1 == 1), at(0))
                .unwrap();
        }
        miso
    }

    #[test]
    fn toggler_follows_select() {
        let mut t = RawToggler::default();
        let mut l = lines(None, false);
        assert!(t.drive_one_cycle(l, at(0)).unwrap());
        l.selected = false;
        assert!(!t.drive_one_cycle(l, at(0)).unwrap());
        assert_eq!(exchange(&mut t, 0x3C), 0xFF);
    }

    #[test]
    fn burst_command_returns_payload_msb_first() {
        let mut s = FramedSlave::sensor(TruncationPolicy::Fail);
        s.on_select_asserted(at(1));
        assert_eq!(exchange(&mut s, 0xBB), 0x00);
        let read: Vec<u8> = (0..SENSOR_BURST_LEN).map(|_| exchange(&mut s, 0)).collect();
        assert_eq!(read, FramedSlave::sensor_payload().to_vec());
        // Past the burst the line stays quiet.
        assert_eq!(exchange(&mut s, 0), 0x00);
        s.on_select_released(at(2)).unwrap();
        assert_eq!(s.commands(), vec![0xBB]);
        assert_eq!(s.transactions()[0].payload_bytes, SENSOR_BURST_LEN);
        assert!(s.truncations().is_empty());
    }

    #[test]
    fn other_commands_get_silence() {
        let mut s = FramedSlave::sensor(TruncationPolicy::Fail);
        s.on_select_asserted(at(1));
        exchange(&mut s, 0x6B);
        assert_eq!(exchange(&mut s, 0x00), 0x00);
        s.on_select_released(at(2)).unwrap();
        assert_eq!(s.commands(), vec![0x6B]);
        assert_eq!(s.transactions()[0].payload_bytes, 0);
    }

    #[test]
    fn mid_byte_release_is_tolerated_and_logged() {
        let mut s = FramedSlave::sensor(TruncationPolicy::Tolerate);
        s.on_select_asserted(at(1));
        for _ in 0..3 {
            s.drive_one_cycle(lines(Some(Edge::Rising), true), at(1)).unwrap();
        }
        s.on_select_released(at(5)).unwrap();
        assert_eq!(
            s.truncations(),
            vec![Truncation {
                byte_index: 0,
                bits: 3,
                at: at(5)
            }]
        );
        assert_eq!(s.transactions()[0].command, None);
    }

    #[test]
    fn mid_byte_release_fails_under_fail_policy() {
        let mut s = FramedSlave::sensor(TruncationPolicy::Fail);
        s.on_select_asserted(at(1));
        exchange(&mut s, 0xBB);
        exchange(&mut s, 0);
        for _ in 0..5 {
            s.drive_one_cycle(lines(Some(Edge::Rising), false), at(1)).unwrap();
        }
        let err = s.on_select_released(at(9)).unwrap_err();
        assert_eq!(
            err,
            SimError::TruncatedTransaction {
                byte_index: 2,
                bits: 5,
                at: at(9)
            }
        );
    }

    #[test]
    fn release_on_byte_boundary_is_clean() {
        let mut s = FramedSlave::sensor(TruncationPolicy::Fail);
        s.on_select_asserted(at(1));
        exchange(&mut s, 0xBB);
        exchange(&mut s, 0);
        s.on_select_released(at(3)).unwrap();
        assert_eq!(s.transactions()[0].payload_bytes, 1);
    }

    #[test]
    fn wrapper_reads_pins_and_owns_miso() {
        let pins = SpiPins {
            select: Pin::bit("uo_out", 2),
            sclk: Pin::bit("uo_out", 0),
            mosi: Pin::bit("uo_out", 1),
            miso: Pin::bit("ui_in", 0),
        };
        let mut task = SpiPeripheral::new(pins, RawToggler::default());
        assert_eq!(task.driven_signals(), vec!["ui_in".to_string()]);
        let mut ports = PortTable::new().input("ui_in", 8).output("uo_out", 8);

        // Undriven select counts as released.
        task.on_edge(Edge::Rising, &mut ports, at(0)).unwrap();
        assert_eq!(ports.read("ui_in").unwrap().to_u64(), Some(0));

        ports.drive_u64("uo_out", 0b0000_0001).unwrap();
        task.on_edge(Edge::Falling, &mut ports, at(1)).unwrap();
        assert_eq!(ports.read("ui_in").unwrap().to_u64(), Some(1));

        ports.drive_u64("uo_out", 0b0000_0101).unwrap();
        task.on_edge(Edge::Rising, &mut ports, at(2)).unwrap();
        assert_eq!(ports.read("ui_in").unwrap().to_u64(), Some(0));
    }

    #[test]
    fn transaction_log_serializes() {
        let t = Truncation {
            byte_index: 0,
            bits: 3,
            at: at(5),
        };
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"byte_index\":0"));
        assert_eq!(
            serde_json::to_string(&TruncationPolicy::Tolerate).unwrap(),
            "\"tolerate\""
        );
    }
}
