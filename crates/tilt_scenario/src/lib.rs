//! Scenario orchestration for the tiltbench harness.
//!
//! A scenario builds its own bench around a device, attaches the protocol
//! models it needs, and runs a sequence of bounded checks. The [`Suite`]
//! runs scenarios independently and gathers a [`SuiteReport`].
//!
//! # Modules
//!
//! - `context`: Configuration and resolved pins shared by all scenarios
//! - `state`: The sensor driver's state codes
//! - `walk`: Power-up and poll sequencing with replay after reset
//! - `telemetry`: Timing-mode probe and end-to-end packet check
//! - `transmit`: Stand-alone serial transmitter round trip
//! - `truncation`: Select released mid-byte
//! - `oracle`: Rotation and filter oracle scenarios
//! - `report`: Outcomes and the suite report
//! - `suite`: Named scenarios, selection, and execution

#![warn(missing_docs)]

pub mod context;
pub mod oracle;
pub mod report;
pub mod state;
pub mod suite;
pub mod telemetry;
pub mod transmit;
pub mod truncation;
pub mod walk;

pub use context::ScenarioContext;
pub use oracle::{filter_fusion, rotation_table};
pub use report::{Outcome, ScenarioReport, SuiteReport};
pub use state::DeviceState;
pub use suite::{Scenario, ScenarioFn, Suite};
pub use telemetry::{
    end_to_end, probe_timing, read_packet, Packet, TimingMode, TimingParams, PACKET_LEN,
};
pub use transmit::{uart_round_trip, ROUND_TRIP_BYTE};
pub use truncation::spi_truncation;
pub use walk::{state_walk, walk_states, WalkStep, WalkTrace};
