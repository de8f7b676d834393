//! End-to-end telemetry checks with timing-mode detection.
//!
//! The device may be built with shortened delays for quick simulation or
//! with real-time delays. The harness cannot be told which, so it runs in
//! two phases:
//!
//! 1. Probe: watch select for a bounded number of cycles. A device that
//!    starts polling the sensor that early was built fast.
//! 2. Main: with the per-wait timeout and telemetry bit period of the
//!    detected mode, decode the first packet and check it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tilt_config::BenchConfig;
pub use tilt_config::PACKET_LEN;
use tilt_proto::{read_bytes, FramedSlave, SpiPeripheral, SENSOR_BURST_LEN};
use tilt_common::Logic;
use tilt_sim::{Bench, Device, Pin, SimError};
use tracing::{debug, info};

use crate::context::ScenarioContext;

/// How the device under test was built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    /// Shortened delays.
    Fast,
    /// Real-time delays.
    Slow,
}

impl fmt::Display for TimingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingMode::Fast => write!(f, "fast"),
            TimingMode::Slow => write!(f, "slow"),
        }
    }
}

/// Limits for the main phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimingParams {
    /// Detected mode.
    pub mode: TimingMode,
    /// Cap on each wait, in cycles.
    pub timeout: u64,
    /// Telemetry bit period, in cycles.
    pub bit_period: u64,
}

impl TimingParams {
    /// The limits for `mode` under `config`.
    pub fn for_mode(mode: TimingMode, config: &BenchConfig) -> Self {
        match mode {
            TimingMode::Fast => Self {
                mode,
                timeout: config.timing.fast_timeout,
                bit_period: config.timing.fast_bit_period,
            },
            TimingMode::Slow => Self {
                mode,
                timeout: config.timing.slow_timeout,
                bit_period: config.slow_bit_period(),
            },
        }
    }
}

/// Phase one: watches `select` for up to `config.timing.probe_cycles`
/// cycles and picks the mode. An undriven select counts as released.
pub fn probe_timing<D: Device>(
    bench: &mut Bench<D>,
    select: &Pin,
    config: &BenchConfig,
) -> Result<TimingParams, SimError> {
    let cap = config.timing.probe_cycles;
    let mode = match bench.wait_until("select asserted", cap, |b| {
        Ok(b.read_pin(select)? == Logic::Zero)
    }) {
        Ok(waited) => {
            debug!(waited, "select seen during probe");
            TimingMode::Fast
        }
        Err(SimError::Timeout { .. }) => TimingMode::Slow,
        Err(e) => return Err(e),
    };
    let params = TimingParams::for_mode(mode, config);
    info!(
        %mode,
        timeout = params.timeout,
        bit_period = params.bit_period,
        "timing mode detected"
    );
    Ok(params)
}

/// A decoded telemetry packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Packet {
    /// The two header bytes.
    pub header: [u8; 2],
    /// Fused angle.
    pub fused: i16,
    /// Gyro Z rate echoed from the sample.
    pub gyro_z: i16,
}

impl Packet {
    fn from_bytes(b: &[u8; PACKET_LEN]) -> Self {
        Self {
            header: [b[0], b[1]],
            fused: i16::from_be_bytes([b[2], b[3]]),
            gyro_z: i16::from_be_bytes([b[4], b[5]]),
        }
    }
}

/// Phase two: decodes one packet and checks that it starts with `header`.
///
/// The remaining bytes are only decoded, unless `gyro_echo` is given, in
/// which case the gyro field must equal it.
pub fn read_packet<D: Device>(
    bench: &mut Bench<D>,
    line: &Pin,
    params: &TimingParams,
    header: &[u8],
    gyro_echo: Option<i16>,
) -> Result<Packet, SimError> {
    let bytes = read_bytes(bench, line, params.bit_period, params.timeout, PACKET_LEN)?;
    for (i, (&want, &got)) in header.iter().zip(&bytes).enumerate() {
        if want != got {
            return Err(SimError::mismatch(
                format!("header byte {i}"),
                format!("{want:#04x}"),
                format!("{got:#04x}"),
                bench.stamp(),
            ));
        }
    }
    info!("header verified");
    let mut raw = [0u8; PACKET_LEN];
    raw.copy_from_slice(&bytes);
    let packet = Packet::from_bytes(&raw);
    debug!(fused = packet.fused, gyro_z = packet.gyro_z, "packet decoded");
    match gyro_echo {
        Some(want) if packet.gyro_z != want => Err(SimError::mismatch(
            "gyro echo",
            want,
            packet.gyro_z,
            bench.stamp(),
        )),
        _ => Ok(packet),
    }
}

/// The end-to-end scenario.
///
/// A framed slave serves the stock sensor burst (accel 0/0/16384, temperature
/// 0, gyro 0/0/640). After the timing probe the first telemetry packet must
/// carry the configured header, and echo the gyro rate when
/// `telemetry.check_gyro_echo` is set. The slave must have seen the
/// burst-read command and no select released mid-byte.
pub fn end_to_end<D: Device>(ctx: &ScenarioContext, device: D) -> Result<String, SimError> {
    let config = &ctx.config;
    let mut bench = ctx.bench(device)?;
    let payload = FramedSlave::sensor_payload();
    let slave = Rc::new(RefCell::new(SpiPeripheral::new(
        ctx.spi_pins(),
        FramedSlave::new(
            config.spi.burst_opcode,
            payload.to_vec(),
            ctx.truncation_policy(),
        ),
    )));
    bench.attach(slave.clone())?;
    bench.reset(&ctx.reset_sequence())?;

    let params = probe_timing(&mut bench, &ctx.pins.select, config)?;
    let gyro_echo = config.telemetry.check_gyro_echo.then(|| {
        i16::from_be_bytes([payload[SENSOR_BURST_LEN - 2], payload[SENSOR_BURST_LEN - 1]])
    });
    let packet = read_packet(
        &mut bench,
        &ctx.pins.telemetry,
        &params,
        &config.telemetry.header,
        gyro_echo,
    )?;

    let slave = slave.borrow();
    let commands = slave.peripheral().commands();
    if !commands.contains(&config.spi.burst_opcode) {
        return Err(SimError::mismatch(
            "commands seen by sensor",
            format!("{:#04x}", config.spi.burst_opcode),
            format!("{commands:02x?}"),
            bench.stamp(),
        ));
    }
    let truncations = slave.peripheral().truncations();
    if let Some(t) = truncations.first() {
        return Err(SimError::mismatch(
            "sensor transactions",
            "complete bytes only",
            format!("byte {} cut after {} bit(s)", t.byte_index, t.bits),
            t.at,
        ));
    }
    Ok(format!(
        "{} mode, header {:02x?}, fused {}, gyro {}, at {}",
        params.mode,
        packet.header,
        packet.fused,
        packet.gyro_z,
        bench.stamp()
    ))
}
