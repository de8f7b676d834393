//! Named device ports and the signal bus the harness reads and drives.
//!
//! A device declares its boundary as a [`PortTable`]. The harness side only
//! ever sees it through [`SignalBus`], which refuses to drive outputs and
//! refuses values wider than the port. [`Pin`] addresses a single bit so the
//! same protocol model works against discrete 1-bit ports (`spi_cs_n`) and
//! packed vectors (`uo_out[2]`).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tilt_common::{Logic, LogicVec};

use crate::error::SimError;

/// Which side of the boundary drives a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Driven by the harness, read by the device.
    Input,
    /// Driven by the device, read by the harness.
    Output,
}

/// One named, fixed-width signal on the device boundary.
#[derive(Clone, Debug)]
pub struct Port {
    /// Signal name.
    pub name: String,
    /// Bit width.
    pub width: u32,
    /// Which side drives it.
    pub direction: Direction,
    /// Current value. Starts all-`X`.
    pub value: LogicVec,
}

/// The declared ports of a device, looked up by name.
#[derive(Clone, Debug, Default)]
pub struct PortTable {
    ports: Vec<Port>,
    index: HashMap<String, usize>,
}

impl PortTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an input port.
    pub fn input(self, name: &str, width: u32) -> Self {
        self.declare(name, width, Direction::Input)
    }

    /// Declares an output port.
    pub fn output(self, name: &str, width: u32) -> Self {
        self.declare(name, width, Direction::Output)
    }

    fn declare(mut self, name: &str, width: u32, direction: Direction) -> Self {
        self.index.insert(name.to_string(), self.ports.len());
        self.ports.push(Port {
            name: name.to_string(),
            width,
            direction,
            value: LogicVec::all_x(width),
        });
        self
    }

    /// Returns the port with this name.
    pub fn port(&self, name: &str) -> Result<&Port, SimError> {
        self.index
            .get(name)
            .map(|&i| &self.ports[i])
            .ok_or_else(|| SimError::UnknownSignal {
                name: name.to_string(),
            })
    }

    fn port_mut(&mut self, name: &str) -> Result<&mut Port, SimError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.ports[i]),
            None => Err(SimError::UnknownSignal {
                name: name.to_string(),
            }),
        }
    }

    /// Iterates over all ports in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    /// Device side: sets any port, outputs included.
    pub fn drive(&mut self, name: &str, value: LogicVec) -> Result<(), SimError> {
        let port = self.port_mut(name)?;
        if value.width() != port.width {
            return Err(SimError::ValueTooWide {
                name: name.to_string(),
                value: value.to_u64().map_or(-1, |v| v as i64),
                width: port.width,
            });
        }
        port.value = value;
        Ok(())
    }

    /// Device side: sets a port from an integer, keeping the low bits.
    pub fn drive_u64(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        let width = self.port(name)?.width;
        self.drive(name, LogicVec::from_u64(value, width))
    }

    /// Device side: sets every output back to all-`X`.
    pub fn float_outputs(&mut self) {
        for port in self.ports.iter_mut() {
            if port.direction == Direction::Output {
                port.value = LogicVec::all_x(port.width);
            }
        }
    }

    /// Device side: reads an input as a two-state number.
    ///
    /// Undriven bits read as 0, the way a two-state simulator sees them.
    pub fn sample(&self, name: &str) -> Result<u64, SimError> {
        let value = &self.port(name)?.value;
        let mut raw = 0u64;
        for i in 0..value.width().min(64) {
            if value.get(i) == Logic::One {
                raw |= 1 << i;
            }
        }
        Ok(raw)
    }

    /// Device side: reads a two-state input and sign-extends it.
    pub fn sample_signed(&self, name: &str) -> Result<i64, SimError> {
        let width = self.port(name)?.width;
        let raw = self.sample(name)?;
        if width == 0 || width >= 64 {
            return Ok(raw as i64);
        }
        let shift = 64 - width;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Device side: reads a single-bit input as a level.
    pub fn sample_bit(&self, name: &str) -> Result<bool, SimError> {
        Ok(self.sample(name)? & 1 == 1)
    }
}

/// Harness-side access to the device boundary.
///
/// Reads never block and return the raw 4-state value. Writes only reach
/// inputs and become visible to the device at its next evaluation.
pub trait SignalBus {
    /// Reads the current value of a signal.
    fn read(&self, name: &str) -> Result<LogicVec, SimError>;

    /// Drives an input signal.
    fn write(&mut self, name: &str, value: LogicVec) -> Result<(), SimError>;

    /// Returns the width of a signal.
    fn width(&self, name: &str) -> Result<u32, SimError>;

    /// Drives an input from an unsigned integer that must fit its width.
    fn write_u64(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        let width = self.width(name)?;
        if width < 64 && value >> width != 0 {
            return Err(SimError::ValueTooWide {
                name: name.to_string(),
                value: value as i64,
                width,
            });
        }
        self.write(name, LogicVec::from_u64(value, width))
    }

    /// Drives an input with the two's-complement encoding of `value`.
    fn write_i64(&mut self, name: &str, value: i64) -> Result<(), SimError> {
        let width = self.width(name)?;
        let fits = match width {
            0 => value == 0,
            1..=63 => (-(1i64 << (width - 1))..=(1i64 << width) - 1).contains(&value),
            _ => true,
        };
        if !fits {
            return Err(SimError::ValueTooWide {
                name: name.to_string(),
                value,
                width,
            });
        }
        self.write(name, LogicVec::from_i64(value, width))
    }

    /// Reads one bit of a signal.
    fn read_pin(&self, pin: &Pin) -> Result<Logic, SimError> {
        let value = self.read(&pin.signal)?;
        if pin.bit >= value.width() {
            return Err(SimError::UnknownSignal {
                name: pin.to_string(),
            });
        }
        Ok(value.get(pin.bit))
    }

    /// Drives one bit of an input, keeping the other bits.
    ///
    /// Indeterminate neighbours are driven to 0, since the harness is the
    /// only writer of its inputs and an undriven bit has no value to keep.
    fn write_pin(&mut self, pin: &Pin, level: bool) -> Result<(), SimError> {
        let mut value = self.read(&pin.signal)?;
        if pin.bit >= value.width() {
            return Err(SimError::UnknownSignal {
                name: pin.to_string(),
            });
        }
        for i in 0..value.width() {
            if !value.get(i).is_known() {
                value.set(i, Logic::Zero);
            }
        }
        value.set(pin.bit, Logic::from_bool(level));
        self.write(&pin.signal, value)
    }
}

impl SignalBus for PortTable {
    fn read(&self, name: &str) -> Result<LogicVec, SimError> {
        Ok(self.port(name)?.value.clone())
    }

    fn write(&mut self, name: &str, value: LogicVec) -> Result<(), SimError> {
        if self.port(name)?.direction != Direction::Input {
            return Err(SimError::NotAnInput {
                name: name.to_string(),
            });
        }
        self.drive(name, value)
    }

    fn width(&self, name: &str) -> Result<u32, SimError> {
        Ok(self.port(name)?.width)
    }
}

/// A single bit of a named signal, written `name` or `name[bit]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pin {
    /// The signal holding the bit.
    pub signal: String,
    /// Bit index within the signal.
    pub bit: u32,
}

impl Pin {
    /// Addresses bit 0 of a signal.
    pub fn new(signal: &str) -> Self {
        Self {
            signal: signal.to_string(),
            bit: 0,
        }
    }

    /// Addresses one bit of a packed signal.
    pub fn bit(signal: &str, bit: u32) -> Self {
        Self {
            signal: signal.to_string(),
            bit,
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bit == 0 {
            write!(f, "{}", self.signal)
        } else {
            write!(f, "{}[{}]", self.signal, self.bit)
        }
    }
}

impl FromStr for Pin {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || SimError::Config {
            reason: format!("invalid pin '{s}', expected 'name' or 'name[bit]'"),
        };
        let (signal, bit) = match s.strip_suffix(']') {
            Some(head) => {
                let (name, index) = head.split_once('[').ok_or_else(invalid)?;
                (name, index.trim().parse().map_err(|_| invalid())?)
            }
            None => (s, 0),
        };
        let valid_name = !signal.is_empty()
            && signal
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid_name {
            return Err(invalid());
        }
        Ok(Pin::bit(signal, bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PortTable {
        PortTable::new()
            .input("ui_in", 8)
            .input("x_in", 16)
            .output("uo_out", 8)
    }

    #[test]
    fn ports_start_indeterminate() {
        let t = table();
        assert_eq!(t.read("uo_out").unwrap().to_string(), "XXXXXXXX");
        assert_eq!(t.read("ui_in").unwrap().to_u64(), None);
    }

    #[test]
    fn harness_cannot_drive_outputs() {
        let mut t = table();
        let err = t.write_u64("uo_out", 1).unwrap_err();
        assert!(matches!(err, SimError::NotAnInput { .. }));
    }

    #[test]
    fn unknown_signal_is_reported() {
        let t = table();
        assert!(matches!(
            t.read("nope").unwrap_err(),
            SimError::UnknownSignal { .. }
        ));
    }

    #[test]
    fn width_is_enforced() {
        let mut t = table();
        assert!(t.write_u64("ui_in", 0x1FF).is_err());
        t.write_u64("ui_in", 0xFF).unwrap();
        assert!(t.write_i64("x_in", -32769).is_err());
        assert!(t.write_i64("x_in", 65536).is_err());
        t.write_i64("x_in", -32768).unwrap();
        assert_eq!(t.read("x_in").unwrap().to_i64(), Some(-32768));
        assert_eq!(t.sample_signed("x_in").unwrap(), -32768);
    }

    #[test]
    fn zero_width_port_only_takes_zero() {
        let mut t = PortTable::new().input("spare", 0);
        t.write_i64("spare", 0).unwrap();
        assert!(matches!(
            t.write_i64("spare", -1),
            Err(SimError::ValueTooWide { width: 0, .. })
        ));
        assert!(t.write_u64("spare", 1).is_err());
    }

    #[test]
    fn device_sampling_treats_undriven_as_zero() {
        let t = table();
        assert_eq!(t.sample("ui_in").unwrap(), 0);
        assert!(!t.sample_bit("ui_in").unwrap());
    }

    #[test]
    fn pin_write_is_read_modify_write() {
        let mut t = table();
        t.write_u64("ui_in", 0b1000_0000).unwrap();
        t.write_pin(&Pin::bit("ui_in", 0), true).unwrap();
        assert_eq!(t.read("ui_in").unwrap().to_u64(), Some(0b1000_0001));
        t.write_pin(&Pin::bit("ui_in", 7), false).unwrap();
        assert_eq!(t.read("ui_in").unwrap().to_u64(), Some(0b0000_0001));
    }

    #[test]
    fn pin_write_clears_undriven_neighbours() {
        let mut t = table();
        t.write_pin(&Pin::bit("ui_in", 0), true).unwrap();
        assert_eq!(t.read("ui_in").unwrap().to_u64(), Some(1));
    }

    #[test]
    fn pin_read_out_of_range() {
        let t = table();
        assert!(t.read_pin(&Pin::bit("uo_out", 8)).is_err());
        assert_eq!(t.read_pin(&Pin::bit("uo_out", 2)).unwrap(), Logic::X);
    }

    #[test]
    fn pin_parsing() {
        assert_eq!("uo_out[2]".parse::<Pin>().unwrap(), Pin::bit("uo_out", 2));
        assert_eq!("spi_cs_n".parse::<Pin>().unwrap(), Pin::new("spi_cs_n"));
        assert_eq!(Pin::bit("uo_out", 3).to_string(), "uo_out[3]");
        assert!("uo_out[x]".parse::<Pin>().is_err());
        assert!("[3]".parse::<Pin>().is_err());
        assert!("a b".parse::<Pin>().is_err());
    }

    #[test]
    fn float_outputs_resets_to_x() {
        let mut t = table();
        t.drive_u64("uo_out", 0x0C).unwrap();
        t.float_outputs();
        assert_eq!(t.read("uo_out").unwrap(), LogicVec::all_x(8));
    }
}
