//! Stand-alone check of the device's serial transmitter.

use std::cell::RefCell;
use std::rc::Rc;

use tilt_proto::UartMonitor;
use tilt_sim::{Device, Pin, SimError};
use tracing::info;

use crate::context::ScenarioContext;

/// Byte sent by [`uart_round_trip`].
pub const ROUND_TRIP_BYTE: u8 = 0x41;

/// Frames `0x41` through a transmitter with ports `data_in[8]`, `start`,
/// `busy`, `done` and `tx`, and decodes the line with a background monitor.
///
/// `busy` must be high one cycle after the start edge, and `done` must
/// pulse within twelve bit periods with `busy` low and the line idle high.
pub fn uart_round_trip<D: Device>(
    ctx: &ScenarioContext,
    device: D,
    bit_period: u64,
) -> Result<String, SimError> {
    let mut bench = ctx.bench(device)?;
    let monitor = Rc::new(RefCell::new(UartMonitor::new(Pin::new("tx"), bit_period)));
    bench.attach(monitor.clone())?;
    bench.reset(&ctx.reset_sequence())?;

    bench.write_u64("data_in", u64::from(ROUND_TRIP_BYTE))?;
    bench.write_u64("start", 1)?;
    bench.rising_edge()?;
    bench.write_u64("start", 0)?;
    bench.rising_edge()?;
    bench.expect("busy", 1)?;

    let waited = bench.wait_until("transmitter done", 12 * bit_period, |b| {
        Ok(b.read_u64("done")? == 1)
    })?;
    bench.expect("busy", 0)?;
    bench.expect("tx", 1)?;

    let values = monitor.borrow().values();
    if values != [ROUND_TRIP_BYTE] {
        return Err(SimError::mismatch(
            "bytes on tx",
            format!("[{ROUND_TRIP_BYTE:#04x}]"),
            format!("{values:02x?}"),
            bench.stamp(),
        ));
    }
    info!(waited, "round trip complete");
    Ok(format!(
        "{ROUND_TRIP_BYTE:#04x} framed and decoded, done after {} cycles",
        waited + 2
    ))
}
