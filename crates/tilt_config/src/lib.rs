//! Parsing and validation of `tilt.toml` bench configuration files.
//!
//! Every section is optional; an empty file yields the stock 10 MHz bench
//! with a 9600 baud telemetry line and discrete SPI pins.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_pins, ResolvedPins};
pub use types::*;
