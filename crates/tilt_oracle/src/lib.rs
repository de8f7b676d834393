//! Independent numerical oracles for the angle-conversion and fusion blocks.
//!
//! Both oracles drive a block through its ports on a [`tilt_sim::Bench`] and
//! compare what it produces against statically enumerated expectations.

#![warn(missing_docs)]

pub mod filter;
pub mod rotation;

pub use filter::{FilterCheck, FilterOracle, FilterPorts, FilterScenario, FILTER_SCENARIOS};
pub use rotation::{
    angle_error, raw_to_degrees, reference_degrees, RotationOracle, RotationPorts,
    RotationResult, RotationVector, ROTATION_VECTORS,
};
