//! The device driver's state code.

use std::fmt;

use serde::Serialize;
use tilt_sim::{Bench, Device, SimError};

/// The sensor driver's states, in the order they are first visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceState {
    /// Power-up wait.
    Init = 0,
    /// Sending the power-management register address.
    WakeWrite1 = 1,
    /// Waiting for that byte to finish.
    WakeWait1 = 2,
    /// Sending the wake value.
    WakeWrite2 = 3,
    /// Waiting for that byte to finish.
    WakeWait2 = 4,
    /// Waiting for the next poll.
    Idle = 5,
    /// Sending the burst-read command.
    ReadCommand = 6,
    /// Waiting for the command byte to finish.
    ReadCommandWait = 7,
    /// Clocking in the sample bytes.
    ReadBurst = 8,
}

impl DeviceState {
    /// Every state, by code.
    pub const ALL: [DeviceState; 9] = [
        DeviceState::Init,
        DeviceState::WakeWrite1,
        DeviceState::WakeWait1,
        DeviceState::WakeWrite2,
        DeviceState::WakeWait2,
        DeviceState::Idle,
        DeviceState::ReadCommand,
        DeviceState::ReadCommandWait,
        DeviceState::ReadBurst,
    ];

    /// The numeric code on the device's `state` output.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a state code.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(code).ok()?).copied()
    }

    /// Reads and decodes the state output of a device.
    ///
    /// An undriven output is an indeterminate-read failure; a code outside
    /// `0..=8` is a mismatch.
    pub fn read<D: Device>(bench: &Bench<D>, signal: &str) -> Result<Self, SimError> {
        let code = bench.read_u64(signal)?;
        Self::from_code(code).ok_or_else(|| {
            SimError::mismatch(
                format!("{signal} code"),
                "a state in 0..=8",
                code,
                bench.stamp(),
            )
        })
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Init => "Init",
            DeviceState::WakeWrite1 => "WakeWrite1",
            DeviceState::WakeWait1 => "WakeWait1",
            DeviceState::WakeWrite2 => "WakeWrite2",
            DeviceState::WakeWait2 => "WakeWait2",
            DeviceState::Idle => "Idle",
            DeviceState::ReadCommand => "ReadCommand",
            DeviceState::ReadCommandWait => "ReadCommandWait",
            DeviceState::ReadBurst => "ReadBurst",
        };
        write!(f, "{name}({})", self.code())
    }
}
