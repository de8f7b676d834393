//! Mode-3 SPI controller: one byte per request.

use tracing::trace;

/// Shifts one byte out on MOSI and one in from MISO.
///
/// The bus clock idles high. Every `clk_div` clocks it toggles: on the
/// falling half the next MOSI bit goes out MSB first, on the rising half
/// MISO is sampled. After the eighth rising half `tick` returns the byte
/// received, with the bus clock back at idle.
#[derive(Clone, Debug)]
pub struct SpiMasterCore {
    clk_div: u32,
    busy: bool,
    sclk: bool,
    mosi: bool,
    tx: u8,
    rx: u8,
    bits: u8,
    count: u32,
}

impl SpiMasterCore {
    /// A controller toggling the bus clock every `clk_div` clocks.
    pub fn new(clk_div: u32) -> Self {
        Self {
            clk_div: clk_div.max(1),
            busy: false,
            sclk: true,
            mosi: false,
            tx: 0,
            rx: 0,
            bits: 0,
            count: 0,
        }
    }

    /// Returns to idle.
    pub fn reset(&mut self) {
        *self = Self::new(self.clk_div);
    }

    /// Advances one clock, sampling `miso` as it stood before this edge.
    pub fn tick(&mut self, start: bool, data: u8, miso: bool) -> Option<u8> {
        if !self.busy {
            if start {
                self.busy = true;
                self.tx = data;
                self.rx = 0;
                self.bits = 0;
                self.count = 0;
            }
            return None;
        }
        self.count += 1;
        if self.count < self.clk_div {
            return None;
        }
        self.count = 0;
        if self.sclk {
            self.sclk = false;
            self.mosi = self.tx & 0x80 != 0;
            self.tx <<= 1;
            return None;
        }
        self.sclk = true;
        self.rx = (self.rx << 1) | u8::from(miso);
        self.bits += 1;
        if self.bits < 8 {
            return None;
        }
        self.busy = false;
        trace!(rx = self.rx, "spi byte");
        Some(self.rx)
    }

    /// Whether a byte is in flight.
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// The bus clock.
    pub fn sclk(&self) -> bool {
        self.sclk
    }

    /// The controller data line.
    pub fn mosi(&self) -> bool {
        self.mosi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Loops MOSI back to MISO through a one-clock register.
    #[test]
    fn loopback_exchanges_byte() {
        let mut m = SpiMasterCore::new(2);
        let mut miso = false;
        let mut out = None;
        m.tick(true, 0xA5, miso);
        for _ in 0..64 {
            out = m.tick(false, 0, miso);
            miso = m.mosi();
            if out.is_some() {
                break;
            }
        }
        assert_eq!(out, Some(0xA5));
        assert!(m.sclk());
        assert!(!m.busy());
    }

    #[test]
    fn byte_takes_sixteen_half_periods() {
        let mut m = SpiMasterCore::new(3);
        m.tick(true, 0, true);
        let mut cycles = 0;
        loop {
            cycles += 1;
            if m.tick(false, 0, true).is_some() {
                break;
            }
        }
        assert_eq!(cycles, 16 * 3);
    }
}
