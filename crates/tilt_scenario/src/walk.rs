//! Power-up and poll sequencing of the sensor driver.
//!
//! The walk follows the driver from reset through the wake-up writes and
//! one burst read, checking the select line at each step. A second reset
//! followed by the same walk must visit the same states at the same cycle
//! offsets.

use serde::Serialize;
use tilt_common::Logic;
use tilt_proto::{RawToggler, SpiPeripheral};
use tilt_sim::{Bench, Device, Pin, SimError};
use tracing::info;

use crate::context::ScenarioContext;
use crate::state::DeviceState;

/// The driver's state-code output.
pub const STATE_SIGNAL: &str = "state";
/// The driver's sample-latched pulse.
pub const VALID_SIGNAL: &str = "valid";
/// Accelerometer words the burst check reads.
pub const ACCEL_SIGNALS: [&str; 3] = ["accel_x", "accel_y", "accel_z"];

/// One checkpoint of the walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WalkStep {
    /// Cycles since the walk started.
    pub offset: u64,
    /// State observed.
    pub state: DeviceState,
    /// Select level observed.
    pub select_low: bool,
}

/// What the walk saw, in order.
pub type WalkTrace = Vec<WalkStep>;

struct Walker<'a, D: Device> {
    bench: &'a mut Bench<D>,
    select: &'a Pin,
    cap: u64,
    start: u64,
    trace: WalkTrace,
}

impl<D: Device> Walker<'_, D> {
    fn state(&self) -> Result<DeviceState, SimError> {
        DeviceState::read(&*self.bench, STATE_SIGNAL)
    }

    fn wait_for(&mut self, target: DeviceState) -> Result<(), SimError> {
        self.bench
            .wait_until(&format!("state {target}"), self.cap, |b| {
                Ok(DeviceState::read(b, STATE_SIGNAL)? == target)
            })?;
        self.record()
    }

    fn step_expecting(&mut self, target: DeviceState) -> Result<(), SimError> {
        self.bench.rising_edge()?;
        let state = self.state()?;
        if state != target {
            return Err(SimError::mismatch(
                "state after one cycle",
                target,
                state,
                self.bench.stamp(),
            ));
        }
        self.record()
    }

    fn record(&mut self) -> Result<(), SimError> {
        let step = WalkStep {
            offset: self.bench.cycle() - self.start,
            state: self.state()?,
            select_low: self.bench.read_pin(self.select)? == Logic::Zero,
        };
        self.trace.push(step);
        Ok(())
    }

    fn expect_select(&self, low: bool) -> Result<(), SimError> {
        let level = self.bench.read_pin(self.select)?;
        let expected = if low { Logic::Zero } else { Logic::One };
        if level != expected {
            return Err(SimError::mismatch(
                format!("{} in {}", self.select, self.state()?),
                expected,
                level,
                self.bench.stamp(),
            ));
        }
        Ok(())
    }
}

/// Walks the driver from the current point (just after a reset) through
/// wake-up and one burst read.
///
/// Every wait is capped at `cap` cycles. When `all_ones` is set the peripheral
/// is expected to answer with a constant high MISO, so every accelerometer
/// word latched by the burst must read `0xFFFF`.
pub fn walk_states<D: Device>(
    bench: &mut Bench<D>,
    select: &Pin,
    cap: u64,
    all_ones: bool,
) -> Result<WalkTrace, SimError> {
    let start = bench.cycle();
    let mut w = Walker {
        bench,
        select,
        cap,
        start,
        trace: Vec::new(),
    };

    let state = w.state()?;
    if state != DeviceState::Init {
        return Err(SimError::mismatch(
            "state after reset",
            DeviceState::Init,
            state,
            w.bench.stamp(),
        ));
    }
    w.record()?;
    w.expect_select(false)?;

    w.wait_for(DeviceState::WakeWrite1)?;
    w.step_expecting(DeviceState::WakeWait1)?;
    w.expect_select(true)?;

    w.wait_for(DeviceState::WakeWrite2)?;
    w.expect_select(true)?;
    w.step_expecting(DeviceState::WakeWait2)?;
    w.expect_select(true)?;

    w.wait_for(DeviceState::Idle)?;
    w.expect_select(false)?;

    w.wait_for(DeviceState::ReadCommand)?;
    w.step_expecting(DeviceState::ReadCommandWait)?;
    w.expect_select(true)?;

    w.wait_for(DeviceState::ReadBurst)?;
    w.expect_select(true)?;

    w.bench.wait_until("burst valid", cap, |b| Ok(b.read_u64(VALID_SIGNAL)? == 1))?;
    w.record()?;
    let state = w.state()?;
    if state != DeviceState::Idle {
        return Err(SimError::mismatch(
            "state after burst",
            DeviceState::Idle,
            state,
            w.bench.stamp(),
        ));
    }
    w.expect_select(false)?;

    if all_ones {
        for name in ACCEL_SIGNALS {
            let value = w.bench.read_u64(name)?;
            if value != 0xFFFF {
                return Err(SimError::mismatch(
                    name,
                    "0xffff",
                    format!("{value:#06x}"),
                    w.bench.stamp(),
                ));
            }
        }
    }
    Ok(w.trace)
}

/// The state-walk scenario: walk once, reset, walk again and compare.
///
/// A raw toggler stands in for the sensor.
pub fn state_walk<D: Device>(ctx: &ScenarioContext, device: D) -> Result<String, SimError> {
    let mut bench = ctx.bench(device)?;
    let pins = ctx.spi_pins();
    let select = pins.select.clone();
    bench.attach(SpiPeripheral::new(pins, RawToggler::default()))?;
    let reset = ctx.reset_sequence();
    let cap = ctx.config.timing.fast_timeout;

    bench.reset(&reset)?;
    let first = walk_states(&mut bench, &select, cap, true)?;
    info!(checkpoints = first.len(), "state walk complete");

    bench.reset(&reset)?;
    let replay = walk_states(&mut bench, &select, cap, true)?;
    compare_traces(&first, &replay, &bench)?;
    info!("replay after reset identical");

    let last = first.last().map_or(0, |s| s.offset);
    Ok(format!(
        "{} checkpoints over {last} cycles, replay identical",
        first.len()
    ))
}

fn compare_traces<D: Device>(
    first: &[WalkStep],
    replay: &[WalkStep],
    bench: &Bench<D>,
) -> Result<(), SimError> {
    if let Some((i, (a, b))) = first
        .iter()
        .zip(replay)
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(SimError::mismatch(
            format!("replay checkpoint {i}"),
            format!("{} at +{}", a.state, a.offset),
            format!("{} at +{}", b.state, b.offset),
            bench.stamp(),
        ));
    }
    if first.len() != replay.len() {
        return Err(SimError::mismatch(
            "replay checkpoints",
            first.len(),
            replay.len(),
            bench.stamp(),
        ));
    }
    Ok(())
}
