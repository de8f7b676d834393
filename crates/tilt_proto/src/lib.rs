//! Bit-level protocol models the bench attaches to a device.
//!
//! [`spi`] emulates the peripheral side of a mode-3 synchronous bus, either
//! as a raw level toggler or as a framed sensor that answers a burst-read
//! command. [`uart`] reconstructs bytes from an asynchronous serial line.

#![warn(missing_docs)]

pub mod spi;
pub mod uart;

pub use spi::{
    BusLines, BusPeripheral, FramedSlave, RawToggler, SpiPeripheral, SpiPins, Transaction,
    Truncation, TruncationPolicy, SENSOR_BURST_LEN,
};
pub use uart::{read_byte, read_bytes, DecodedByte, FrameDecoder, UartMonitor};
