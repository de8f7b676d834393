//! The device-under-test boundary.

use crate::error::SimError;
use crate::signal::PortTable;

/// A cycle-evaluated device behind a table of named ports.
///
/// The bench writes inputs into [`Device::ports_mut`] and then calls
/// [`Device::eval`]; the device reacts to whatever changed since its last
/// evaluation (a clock edge, an asynchronous reset) and updates its outputs
/// in place. Outputs are only read after `eval` returns.
pub trait Device {
    /// Instance name used in logs and reports.
    fn name(&self) -> &str;

    /// The device's ports.
    fn ports(&self) -> &PortTable;

    /// Mutable access to the ports.
    fn ports_mut(&mut self) -> &mut PortTable;

    /// Evaluates the device against its current inputs until it settles.
    fn eval(&mut self) -> Result<(), SimError>;
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ports(&self) -> &PortTable {
        (**self).ports()
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        (**self).ports_mut()
    }

    fn eval(&mut self) -> Result<(), SimError> {
        (**self).eval()
    }
}
