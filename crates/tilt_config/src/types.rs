//! Configuration types deserialized from `tilt.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use tilt_common::Frequency;

/// The top-level bench configuration parsed from `tilt.toml`.
///
/// Every section may be omitted; missing sections and fields take the
/// defaults of the stock bench.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Clock frequency and signal.
    pub clock: ClockConfig,
    /// Reset pulse.
    pub reset: ResetConfig,
    /// Telemetry line framing.
    pub telemetry: TelemetryConfig,
    /// Timing-mode probe and per-mode limits.
    pub timing: TimingConfig,
    /// Peripheral bus emulation.
    pub spi: SpiConfig,
    /// Logical pin to device signal mapping.
    pub pins: PinsConfig,
    /// Oracle limits.
    pub oracle: OracleConfig,
}

impl BenchConfig {
    /// Bit period of the telemetry line in clock cycles, as derived from the
    /// clock frequency and baud rate (1042 for 10 MHz at 9600 baud).
    pub fn slow_bit_period(&self) -> u64 {
        self.clock.frequency.cycles_per(f64::from(self.telemetry.baud))
    }
}

/// The `[clock]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Clock frequency, as `"10MHz"` or a number of Hertz.
    #[serde(deserialize_with = "frequency")]
    pub frequency: Frequency,
    /// The clock input.
    pub signal: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::new(10e6),
            signal: "clk".into(),
        }
    }
}

/// The `[reset]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// The reset input.
    pub signal: String,
    /// Whether reset is asserted low.
    pub active_low: bool,
    /// Time reset stays asserted, in nanoseconds.
    pub hold_ns: u64,
    /// Time run after release, in nanoseconds.
    pub settle_ns: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            signal: "rst_n".into(),
            active_low: true,
            hold_ns: 100,
            settle_ns: 100,
        }
    }
}

/// Bytes in one telemetry packet: header, fused angle, gyro rate.
pub const PACKET_LEN: usize = 6;

/// The `[telemetry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Baud rate of the telemetry line in slow mode.
    pub baud: u32,
    /// Bytes every telemetry packet starts with. At most [`PACKET_LEN`].
    pub header: Vec<u8>,
    /// Also require the last two packet bytes to echo the sensor's gyro Z
    /// word. Off by default; only the header is checked then.
    pub check_gyro_echo: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            header: vec![0xDE, 0xAD],
            check_gyro_echo: false,
        }
    }
}

/// The `[timing]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Cycles to watch for select before settling on slow mode.
    pub probe_cycles: u64,
    /// Per-wait cap in fast mode.
    pub fast_timeout: u64,
    /// Per-wait cap in slow mode.
    pub slow_timeout: u64,
    /// Telemetry bit period in fast mode.
    pub fast_bit_period: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            probe_cycles: 5000,
            fast_timeout: 20_000,
            slow_timeout: 500_000,
            fast_bit_period: 5,
        }
    }
}

/// What a scenario does when select is released mid-byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncation {
    /// Log it and keep going.
    #[default]
    Tolerate,
    /// Abort the scenario.
    Fail,
}

/// The `[spi]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    /// Truncation policy.
    pub truncation: Truncation,
    /// Command byte answered with the sensor burst.
    pub burst_opcode: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            truncation: Truncation::Tolerate,
            burst_opcode: 0xBB,
        }
    }
}

/// Built-in pin layouts of the top-level device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinLayout {
    /// One port per line: `spi_cs_n`, `spi_sclk`, `spi_mosi`, `spi_miso`,
    /// `uart_tx_out`.
    #[default]
    Discrete,
    /// Packed 8-bit ports: SCLK, MOSI, CS_N and TX on `uo_out[0..4]`, MISO on
    /// `ui_in[0]`.
    Packed,
}

/// The `[pins]` section.
///
/// `layout` picks a preset; any role given explicitly overrides it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PinsConfig {
    /// Preset the explicit roles are laid over.
    pub layout: PinLayout,
    /// Active-low chip select, device output.
    pub select: Option<String>,
    /// Bus clock, device output.
    pub sclk: Option<String>,
    /// Controller-to-peripheral data, device output.
    pub mosi: Option<String>,
    /// Peripheral-to-controller data, device input.
    pub miso: Option<String>,
    /// Telemetry serial line, device output.
    pub telemetry: Option<String>,
}

/// The `[oracle]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Largest accepted rotation error, in degrees.
    pub rotation_tolerance_deg: f64,
    /// Cycles to wait for an oracle block's done flag.
    pub done_cap: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            rotation_tolerance_deg: 1.0,
            done_cap: 64,
        }
    }
}

/// Deserializes a frequency from either `"10MHz"` or a number of Hertz.
fn frequency<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Frequency, D::Error> {
    struct FrequencyVisitor;

    impl<'de> Visitor<'de> for FrequencyVisitor {
        type Value = Frequency;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a frequency such as \"10MHz\" or a number of Hertz")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse().map_err(|e| E::custom(format!("{e}")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Frequency::new(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Frequency::new(v as f64))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Frequency::new(v))
        }
    }

    deserializer.deserialize_any(FrequencyVisitor)
}
