//! Cycle-synchronous test bench engine for tiltbench.
//!
//! The engine drives a clock into a [`Device`], applies a reset pulse, and
//! runs background [`EdgeTask`]s at every edge while the foreground scenario
//! reads and writes named signals and waits on device conditions with
//! explicit cycle caps.
//!
//! # Modules
//!
//! - `error`: Bench errors, failure kinds, and time stamps
//! - `time`: Femtosecond simulated time
//! - `signal`: Ports, the signal bus, and pin addressing
//! - `clock`: Clock, reset sequence, and edge detection
//! - `device`: The device-under-test trait
//! - `bench`: The bench itself and background tasks

#![warn(missing_docs)]

pub mod bench;
pub mod clock;
pub mod device;
pub mod error;
pub mod signal;
pub mod time;

pub use bench::{Bench, EdgeTask};
pub use clock::{Clock, Edge, EdgeDetector, ResetSequence};
pub use device::Device;
pub use error::{FailureKind, SimError, Stamp};
pub use signal::{Direction, Pin, Port, PortTable, SignalBus};
pub use time::SimTime;
