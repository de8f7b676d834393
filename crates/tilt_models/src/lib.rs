//! Cycle-level behavioral models of the sensor-fusion device.
//!
//! Each block is split into a core, which advances one clock cycle per
//! `tick`, and a [`Device`](tilt_sim::Device) wrapper that maps the core
//! onto named ports. Wrappers implement an asynchronous active-low reset on
//! `rst_n` and keep their outputs indeterminate until the first reset.
//! [`TopModel`] wires the cores into the full pipeline: sensor polling, angle
//! conversion, fusion and telemetry.

#![warn(missing_docs)]

pub mod cordic;
pub mod glitch;
pub mod kalman;
pub mod mpu;
pub mod spi_master;
mod sync;
pub mod top;
pub mod uart_tx;

pub use cordic::{cordic_angle, CordicCore, CordicModel};
pub use glitch::SelectGlitch;
pub use kalman::{KalmanCore, KalmanModel};
pub use mpu::{MpuCore, MpuModel, MpuTiming, SensorSample};
pub use spi_master::SpiMasterCore;
pub use top::{TopConfig, TopLayout, TopModel};
pub use uart_tx::{UartTxCore, UartTxModel};
