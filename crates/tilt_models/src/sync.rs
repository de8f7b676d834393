use tilt_sim::{Edge, EdgeDetector, PortTable, SignalBus, SimError};

/// What a clocked model should do in one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Reset,
    Rising,
    Hold,
}

/// Clock edge and asynchronous reset tracking shared by the wrappers.
#[derive(Clone, Debug, Default)]
pub(crate) struct ClockReset {
    clk: EdgeDetector,
    live: bool,
}

impl ClockReset {
    pub(crate) fn step(&mut self, ports: &PortTable) -> Result<Step, SimError> {
        let edge = self.clk.update(ports.sample_bit("clk")?);
        match ports.read("rst_n")?.to_u64() {
            Some(0) => {
                self.live = true;
                Ok(Step::Reset)
            }
            Some(_) if self.live && edge == Some(Edge::Rising) => Ok(Step::Rising),
            _ => Ok(Step::Hold),
        }
    }
}
