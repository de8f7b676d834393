//! `tilt vectors`: print the rotation oracle table.

use tilt_oracle::{reference_degrees, ROTATION_VECTORS};

use crate::GlobalArgs;

/// Runs the `tilt vectors` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = global.load_config()?;
    println!(
        "{:>7} {:>7} {:>10} {:>12}",
        "x", "y", "expected", "reference"
    );
    for v in ROTATION_VECTORS {
        println!(
            "{:>7} {:>7} {:>10.2} {:>12.4}",
            v.x,
            v.y,
            v.expected_deg,
            reference_degrees(v.x, v.y)
        );
    }
    if !global.quiet {
        eprintln!(
            "   {} vectors, tolerance {} deg",
            ROTATION_VECTORS.len(),
            config.oracle.rotation_tolerance_deg
        );
    }
    Ok(0)
}
