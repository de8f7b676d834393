//! The full sensor-fusion pipeline.
//!
//! Every latched sensor sample starts an angle conversion of
//! `(accel_z, accel_y)`; its result and `gyro_z` feed one filter step, and the
//! fused angle goes out on the telemetry line as a six-byte packet:
//! `0xDE 0xAD fused_hi fused_lo gyro_hi gyro_lo`. A sample that arrives
//! while a packet is still being sent is dropped.

use tilt_sim::{Device, PortTable, SimError};
use tracing::debug;

use crate::cordic::CordicCore;
use crate::kalman::KalmanCore;
use crate::mpu::{MpuCore, MpuTiming};
use crate::sync::{ClockReset, Step};
use crate::uart_tx::UartTxCore;

/// Bytes every telemetry packet starts with.
pub const PACKET_HEADER: [u8; 2] = [0xDE, 0xAD];
const PACKET_LEN: usize = 6;

/// How the top level exposes its serial pins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TopLayout {
    /// `spi_cs_n`, `spi_sclk`, `spi_mosi`, `uart_tx_out` out and `spi_miso`
    /// in.
    #[default]
    Discrete,
    /// `uo_out[0..4]` carries SCLK, MOSI, CS_N and TX; `ui_in[0]` is MISO.
    Packed,
}

/// Build-time parameters of the top level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopConfig {
    /// Sensor driver delays and bus speed.
    pub timing: MpuTiming,
    /// Clocks per telemetry bit.
    pub baud_div: u32,
}

impl TopConfig {
    /// Shortened delays for quick simulation: selects within a few cycles
    /// and sends five clocks per bit.
    pub fn fast() -> Self {
        Self {
            timing: MpuTiming {
                init_wait_cycles: 10,
                timer_limit: 20,
                clk_div: 2,
            },
            baud_div: 5,
        }
    }

    /// Real-time delays at 10 MHz: a long power-up wait and 9600 baud
    /// telemetry.
    pub fn slow() -> Self {
        Self {
            timing: MpuTiming {
                init_wait_cycles: 6000,
                timer_limit: 2000,
                clk_div: 4,
            },
            baud_div: 1042,
        }
    }
}

/// The whole device.
pub struct TopModel {
    ports: PortTable,
    layout: TopLayout,
    sync: ClockReset,
    mpu: MpuCore,
    cordic: CordicCore,
    kalman: KalmanCore,
    uart: UartTxCore,
    cordic_start: bool,
    cordic_x: i16,
    cordic_y: i16,
    kalman_en: bool,
    uart_start: bool,
    uart_data: u8,
    packet: [u8; PACKET_LEN],
    sent: usize,
    dropped: u64,
}

impl TopModel {
    /// Builds the top level with the given parameters and pin layout.
    pub fn new(config: TopConfig, layout: TopLayout) -> Self {
        let ports = PortTable::new().input("clk", 1).input("rst_n", 1);
        let ports = match layout {
            TopLayout::Discrete => ports
                .input("spi_miso", 1)
                .output("spi_cs_n", 1)
                .output("spi_sclk", 1)
                .output("spi_mosi", 1)
                .output("uart_tx_out", 1),
            TopLayout::Packed => ports.input("ui_in", 8).output("uo_out", 8),
        };
        Self {
            ports: ports
                .output("state", 4)
                .output("valid", 1)
                .output("angle_out", 16),
            layout,
            sync: ClockReset::default(),
            mpu: MpuCore::new(config.timing),
            cordic: CordicCore::default(),
            kalman: KalmanCore::default(),
            uart: UartTxCore::new(config.baud_div),
            cordic_start: false,
            cordic_x: 0,
            cordic_y: 0,
            kalman_en: false,
            uart_start: false,
            uart_data: 0,
            packet: [0; PACKET_LEN],
            sent: PACKET_LEN,
            dropped: 0,
        }
    }

    /// Samples dropped because telemetry was busy.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn reset(&mut self) {
        self.mpu.reset();
        self.cordic.reset();
        self.kalman.reset();
        self.uart.reset();
        self.cordic_start = false;
        self.kalman_en = false;
        self.uart_start = false;
        self.sent = PACKET_LEN;
    }

    fn tick(&mut self, miso: bool) {
        let cordic_start = std::mem::take(&mut self.cordic_start);
        let kalman_en = std::mem::take(&mut self.kalman_en);
        let uart_start = std::mem::take(&mut self.uart_start);

        self.uart.tick(uart_start, self.uart_data);

        if kalman_en {
            let gyro_z = self.mpu.sample().gyro_z as i16;
            let fused = self.kalman.update(self.cordic.angle(), gyro_z);
            self.offer(fused, gyro_z);
        }

        self.cordic.tick(cordic_start, self.cordic_x, self.cordic_y);
        if self.cordic.done() {
            self.kalman_en = true;
        }

        self.mpu.tick(miso);
        if self.mpu.valid() {
            let sample = self.mpu.sample();
            self.cordic_x = sample.accel_z as i16;
            self.cordic_y = sample.accel_y as i16;
            self.cordic_start = true;
        }

        if self.sent < PACKET_LEN && !self.uart.busy() {
            self.uart_data = self.packet[self.sent];
            self.uart_start = true;
            self.sent += 1;
        }
    }

    fn offer(&mut self, fused: i16, gyro_z: i16) {
        if self.sent < PACKET_LEN || self.uart.busy() {
            self.dropped += 1;
            debug!(fused, dropped = self.dropped, "telemetry busy, sample dropped");
            return;
        }
        let [fused_hi, fused_lo] = fused.to_be_bytes();
        let [gyro_hi, gyro_lo] = gyro_z.to_be_bytes();
        self.packet = [
            PACKET_HEADER[0],
            PACKET_HEADER[1],
            fused_hi,
            fused_lo,
            gyro_hi,
            gyro_lo,
        ];
        self.sent = 0;
        debug!(fused, gyro_z, "telemetry packet queued");
    }

    fn read_miso(&self) -> Result<bool, SimError> {
        match self.layout {
            TopLayout::Discrete => self.ports.sample_bit("spi_miso"),
            TopLayout::Packed => Ok(self.ports.sample("ui_in")? & 1 == 1),
        }
    }

    fn drive(&mut self) -> Result<(), SimError> {
        let sclk = self.mpu.master().sclk();
        let mosi = self.mpu.master().mosi();
        let cs_n = self.mpu.cs_n();
        let tx = self.uart.tx();
        match self.layout {
            TopLayout::Discrete => {
                self.ports.drive_u64("spi_cs_n", u64::from(cs_n))?;
                self.ports.drive_u64("spi_sclk", u64::from(sclk))?;
                self.ports.drive_u64("spi_mosi", u64::from(mosi))?;
                self.ports.drive_u64("uart_tx_out", u64::from(tx))?;
            }
            TopLayout::Packed => {
                let packed = u64::from(sclk)
                    | u64::from(mosi) << 1
                    | u64::from(cs_n) << 2
                    | u64::from(tx) << 3;
                self.ports.drive_u64("uo_out", packed)?;
            }
        }
        self.ports.drive_u64("state", u64::from(self.mpu.state()))?;
        self.ports.drive_u64("valid", u64::from(self.mpu.valid()))?;
        self.ports
            .drive_u64("angle_out", u64::from(self.kalman.angle() as u16))
    }
}

impl Device for TopModel {
    fn name(&self) -> &str {
        match self.layout {
            TopLayout::Discrete => "tilt_top",
            TopLayout::Packed => "tilt_top_packed",
        }
    }

    fn ports(&self) -> &PortTable {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    fn eval(&mut self) -> Result<(), SimError> {
        match self.sync.step(&self.ports)? {
            Step::Reset => self.reset(),
            Step::Rising => {
                let miso = self.read_miso()?;
                self.tick(miso);
            }
            Step::Hold => return Ok(()),
        }
        self.drive()
    }
}
