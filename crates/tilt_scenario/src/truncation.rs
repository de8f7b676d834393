//! Select released in the middle of a byte.

use std::cell::RefCell;
use std::rc::Rc;

use tilt_proto::{FramedSlave, SpiPeripheral, TruncationPolicy};
use tilt_sim::{Device, SimError};
use tracing::info;

use crate::context::ScenarioContext;

/// Cycles to run after reset; the glitching controller is finished long
/// before this.
const GLITCH_CYCLES: u64 = 32;

/// Runs a controller that drops select mid-byte against a framed sensor
/// with `policy`.
///
/// Under [`TruncationPolicy::Tolerate`] exactly one truncation must be
/// logged. Under [`TruncationPolicy::Fail`] the bench surfaces the
/// peripheral's `TruncatedTransaction` error from the edge it happened on.
pub fn spi_truncation<D: Device>(
    ctx: &ScenarioContext,
    device: D,
    policy: TruncationPolicy,
) -> Result<String, SimError> {
    let mut bench = ctx.bench(device)?;
    let slave = Rc::new(RefCell::new(SpiPeripheral::new(
        ctx.spi_pins(),
        FramedSlave::new(
            ctx.config.spi.burst_opcode,
            FramedSlave::sensor_payload().to_vec(),
            policy,
        ),
    )));
    bench.attach(slave.clone())?;
    bench.reset(&ctx.reset_sequence())?;
    bench.cycles(GLITCH_CYCLES)?;

    let slave = slave.borrow();
    let truncations = slave.peripheral().truncations();
    match truncations.as_slice() {
        [t] => {
            info!(byte = t.byte_index, bits = t.bits, at = %t.at, "truncation logged");
            Ok(format!(
                "byte {} cut after {} bit(s) at {}",
                t.byte_index, t.bits, t.at
            ))
        }
        other => Err(SimError::mismatch(
            "truncations logged",
            1,
            other.len(),
            bench.stamp(),
        )),
    }
}
