//! Shared value types for the tiltbench verification harness.
//!
//! This crate provides the 4-state logic model used on the device boundary,
//! packed logic vectors with signed and unsigned conversions, and frequency
//! values used to derive clock periods and serial bit periods.

#![warn(missing_docs)]

pub mod frequency;
pub mod logic;
pub mod logic_vec;

pub use frequency::{Frequency, ParseFrequencyError};
pub use logic::Logic;
pub use logic_vec::LogicVec;
