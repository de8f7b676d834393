//! Asynchronous serial frame decoding.
//!
//! A frame is one start bit (0), eight data bits LSB first and one stop bit
//! (1); the line idles high. The decoder is fed one line level per clock
//! cycle. It waits for a high-to-low transition, skips one and a half bit
//! periods to land in the middle of bit 0, then samples every bit period.
//! The stop bit is not checked, so a decoder that starts hunting right after
//! bit 7 is ready for a back-to-back frame.

use serde::Serialize;
use tilt_sim::{Bench, Device, Edge, EdgeTask, Pin, SignalBus, SimError, Stamp};
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Hunting,
    Sampling { remaining: u64, bits: u8, value: u8 },
}

/// Cycle-fed frame decoder.
#[derive(Clone, Debug)]
pub struct FrameDecoder {
    bit_period: u64,
    prev: bool,
    state: State,
}

impl FrameDecoder {
    /// A decoder for `bit_period` clock cycles per bit, assuming the line
    /// was last seen at `level`.
    ///
    /// Seeding with the current level instead of idle-high keeps a frame
    /// whose bit 7 is 0 from looking like a start bit when hunting for the
    /// next one.
    pub fn new(bit_period: u64, level: bool) -> Self {
        Self {
            bit_period: bit_period.max(1),
            prev: level,
            state: State::Hunting,
        }
    }

    /// Cycles per bit.
    pub fn bit_period(&self) -> u64 {
        self.bit_period
    }

    /// Whether the decoder is still looking for a start bit.
    pub fn is_hunting(&self) -> bool {
        self.state == State::Hunting
    }

    /// Feeds one cycle's line level and returns a byte when one completes.
    pub fn feed(&mut self, level: bool) -> Option<u8> {
        let prev = std::mem::replace(&mut self.prev, level);
        match self.state {
            State::Hunting => {
                if prev && !level {
                    trace!(bit_period = self.bit_period, "start bit");
                    self.state = State::Sampling {
                        remaining: self.bit_period + self.bit_period / 2,
                        bits: 0,
                        value: 0,
                    };
                }
                None
            }
            State::Sampling {
                remaining,
                bits,
                value,
            } => {
                if remaining > 1 {
                    self.state = State::Sampling {
                        remaining: remaining - 1,
                        bits,
                        value,
                    };
                    return None;
                }
                let value = value | (u8::from(level) << bits);
                trace!(bit = bits, level, "data bit");
                if bits + 1 == 8 {
                    self.state = State::Hunting;
                    return Some(value);
                }
                self.state = State::Sampling {
                    remaining: self.bit_period,
                    bits: bits + 1,
                    value,
                };
                None
            }
        }
    }
}

/// Decodes one byte from `line`, clocking the bench.
///
/// The search for the start bit is capped at `cap` cycles; once found, the
/// frame takes a fixed eight and a half bit periods. An undriven line reads
/// as idle high. Returns with the bench sitting on the middle of bit 7.
pub fn read_byte<D: Device>(
    bench: &mut Bench<D>,
    line: &Pin,
    bit_period: u64,
    cap: u64,
) -> Result<u8, SimError> {
    let mut decoder = FrameDecoder::new(bit_period, bench.read_level(line, true)?);
    let mut hunted = 0u64;
    loop {
        bench.rising_edge()?;
        let level = bench.read_level(line, true)?;
        if let Some(byte) = decoder.feed(level) {
            debug!(byte = format_args!("{byte:#04x}"), at = %bench.stamp(), "UART byte");
            return Ok(byte);
        }
        if decoder.is_hunting() {
            hunted += 1;
            if hunted >= cap {
                return Err(SimError::Timeout {
                    what: format!("UART start bit on {line}"),
                    cycles: cap,
                    at: bench.stamp(),
                });
            }
        }
    }
}

/// Decodes `count` back-to-back bytes.
///
/// The first start bit may take up to `cap` cycles. Each later one must
/// begin within two bit periods of the previous frame's stop bit.
pub fn read_bytes<D: Device>(
    bench: &mut Bench<D>,
    line: &Pin,
    bit_period: u64,
    cap: u64,
    count: usize,
) -> Result<Vec<u8>, SimError> {
    // Half of bit 7, the stop bit, then the search window.
    let next_cap = bit_period / 2 + bit_period + 2 * bit_period;
    let mut bytes = Vec::with_capacity(count);
    for i in 0..count {
        let cap = if i == 0 { cap } else { next_cap };
        bytes.push(read_byte(bench, line, bit_period, cap)?);
    }
    Ok(bytes)
}

/// A byte seen by [`UartMonitor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedByte {
    /// The byte value.
    pub value: u8,
    /// When its last data bit was sampled.
    pub at: Stamp,
}

/// Passively decodes a serial line in the background.
#[derive(Clone, Debug)]
pub struct UartMonitor {
    line: Pin,
    decoder: FrameDecoder,
    bytes: Vec<DecodedByte>,
}

impl UartMonitor {
    /// Watches `line` at `bit_period` cycles per bit.
    pub fn new(line: Pin, bit_period: u64) -> Self {
        Self {
            line,
            decoder: FrameDecoder::new(bit_period, true),
            bytes: Vec::new(),
        }
    }

    /// Bytes decoded so far.
    pub fn bytes(&self) -> &[DecodedByte] {
        &self.bytes
    }

    /// Byte values decoded so far.
    pub fn values(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.value).collect()
    }
}

impl EdgeTask for UartMonitor {
    fn label(&self) -> String {
        format!("UART monitor on {}", self.line)
    }

    fn on_edge(&mut self, edge: Edge, bus: &mut dyn SignalBus, at: Stamp) -> Result<(), SimError> {
        if edge != Edge::Rising {
            return Ok(());
        }
        let level = bus.read_pin(&self.line)?.or_idle(true);
        if let Some(value) = self.decoder.feed(level) {
            debug!(byte = format_args!("{value:#04x}"), %at, "monitor byte");
            self.bytes.push(DecodedByte { value, at });
        }
        Ok(())
    }
}
