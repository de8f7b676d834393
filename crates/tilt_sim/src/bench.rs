//! The cycle-synchronous test bench.
//!
//! A [`Bench`] owns one [`Device`] and a [`Clock`] and advances time one
//! clock half period at a time. Each half step runs in a fixed order:
//!
//! 1. time advances and the clock input toggles (a rising edge bumps the
//!    cycle counter),
//! 2. the device evaluates and its outputs settle,
//! 3. every attached [`EdgeTask`] runs, in attachment order, seeing the
//!    settled outputs.
//!
//! Anything written during step 3, or by the foreground between steps, is
//! seen by the device at its next evaluation. Background tasks declare the
//! inputs they drive up front and no two writers may share a signal.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tilt_common::{Logic, LogicVec};
use tracing::{debug, info, trace};

use crate::clock::{Clock, Edge, ResetSequence};
use crate::device::Device;
use crate::error::{SimError, Stamp};
use crate::signal::{Direction, Pin, SignalBus};
use crate::time::SimTime;

/// A background component run at every clock edge.
pub trait EdgeTask {
    /// Name used in logs and driver-conflict reports.
    fn label(&self) -> String;

    /// The device inputs this task writes.
    fn driven_signals(&self) -> Vec<String> {
        Vec::new()
    }

    /// Reacts to one clock edge after the device has settled.
    fn on_edge(&mut self, edge: Edge, bus: &mut dyn SignalBus, at: Stamp) -> Result<(), SimError>;
}

/// Lets the foreground keep a handle on a task's state while it runs.
impl<T: EdgeTask> EdgeTask for Rc<RefCell<T>> {
    fn label(&self) -> String {
        self.borrow().label()
    }

    fn driven_signals(&self) -> Vec<String> {
        self.borrow().driven_signals()
    }

    fn on_edge(&mut self, edge: Edge, bus: &mut dyn SignalBus, at: Stamp) -> Result<(), SimError> {
        self.borrow_mut().on_edge(edge, bus, at)
    }
}

/// A device, its clock, and the background tasks attached to it.
pub struct Bench<D: Device> {
    device: D,
    clock: Clock,
    level: bool,
    cycle: u64,
    time: SimTime,
    tasks: Vec<Box<dyn EdgeTask>>,
    owners: HashMap<String, String>,
}

impl<D: Device> Bench<D> {
    /// Wraps `device`, parks the clock low and lets the device settle once.
    pub fn new(mut device: D, clock: Clock) -> Result<Self, SimError> {
        let port = device.ports().port(clock.signal())?;
        if port.direction != Direction::Input {
            return Err(SimError::NotAnInput {
                name: clock.signal().to_string(),
            });
        }
        device.ports_mut().write_u64(clock.signal(), 0)?;
        device.eval()?;
        let mut owners = HashMap::new();
        owners.insert(clock.signal().to_string(), "clock".to_string());
        debug!(device = device.name(), half_period = %clock.half_period(), "bench created");
        Ok(Self {
            device,
            clock,
            level: false,
            cycle: 0,
            time: SimTime::ZERO,
            tasks: Vec::new(),
            owners,
        })
    }

    /// Attaches a background task.
    ///
    /// Fails with [`SimError::DriverConflict`] if the task drives a signal
    /// that already has a writer.
    pub fn attach(&mut self, task: impl EdgeTask + 'static) -> Result<(), SimError> {
        let label = task.label();
        let driven = task.driven_signals();
        for signal in &driven {
            if self.device.ports().port(signal)?.direction != Direction::Input {
                return Err(SimError::NotAnInput {
                    name: signal.clone(),
                });
            }
            if let Some(owner) = self.owners.get(signal) {
                return Err(SimError::DriverConflict {
                    signal: signal.clone(),
                    owner: owner.clone(),
                });
            }
        }
        for signal in driven {
            self.owners.insert(signal, label.clone());
        }
        debug!(task = %label, at = %self.stamp(), "task attached");
        self.tasks.push(Box::new(task));
        Ok(())
    }

    /// Removes every background task and releases the signals they drove.
    pub fn detach_all(&mut self) {
        let clock = self.clock.signal().to_string();
        self.tasks.clear();
        self.owners.retain(|signal, _| *signal == clock);
    }

    /// Applies a reset pulse.
    ///
    /// The pulse starts with the clock low, holds reset for `seq.hold`
    /// (rounded up to whole half periods, at least one), releases it, then
    /// runs for `seq.settle`.
    pub fn reset(&mut self, seq: &ResetSequence) -> Result<(), SimError> {
        if self.level {
            self.half_step()?;
        }
        let half = self.clock.half_period();
        self.drive(&seq.signal, seq.asserted_level())?;
        self.device.eval()?;
        for _ in 0..seq.hold.steps_of(half).max(1) {
            self.half_step()?;
        }
        self.drive(&seq.signal, !seq.asserted_level())?;
        info!(signal = %seq.signal, at = %self.stamp(), "reset released");
        for _ in 0..seq.settle.steps_of(half) {
            self.half_step()?;
        }
        Ok(())
    }

    fn drive(&mut self, name: &str, level: bool) -> Result<(), SimError> {
        self.device.ports_mut().write_u64(name, u64::from(level))
    }

    /// Advances to the next clock edge and returns which one it was.
    pub fn half_step(&mut self) -> Result<Edge, SimError> {
        self.time += self.clock.half_period();
        self.level = !self.level;
        let edge = if self.level {
            self.cycle += 1;
            Edge::Rising
        } else {
            Edge::Falling
        };
        let level = u64::from(self.level);
        self.device.ports_mut().write_u64(self.clock.signal(), level)?;
        self.device.eval()?;
        let at = self.stamp();
        trace!(%edge, %at, "edge");
        for task in self.tasks.iter_mut() {
            task.on_edge(edge, self.device.ports_mut(), at)?;
        }
        Ok(edge)
    }

    /// Advances to the next rising edge.
    pub fn rising_edge(&mut self) -> Result<(), SimError> {
        while self.half_step()? != Edge::Rising {}
        Ok(())
    }

    /// Advances to the next falling edge.
    pub fn falling_edge(&mut self) -> Result<(), SimError> {
        while self.half_step()? != Edge::Falling {}
        Ok(())
    }

    /// Advances `n` rising edges.
    pub fn cycles(&mut self, n: u64) -> Result<(), SimError> {
        for _ in 0..n {
            self.rising_edge()?;
        }
        Ok(())
    }

    /// Advances by at least `delay`, in whole half periods.
    pub fn wait(&mut self, delay: SimTime) -> Result<(), SimError> {
        for _ in 0..delay.steps_of(self.clock.half_period()) {
            self.half_step()?;
        }
        Ok(())
    }

    /// Waits for `cond` to hold, checking now and after each rising edge.
    ///
    /// Returns how many rising edges it took. Fails with
    /// [`SimError::Timeout`] once `cap` edges pass without the condition.
    pub fn wait_until<F>(&mut self, what: &str, cap: u64, mut cond: F) -> Result<u64, SimError>
    where
        F: FnMut(&Self) -> Result<bool, SimError>,
    {
        if cond(self)? {
            return Ok(0);
        }
        for waited in 1..=cap {
            self.rising_edge()?;
            if cond(self)? {
                trace!(what, waited, "condition met");
                return Ok(waited);
            }
        }
        Err(SimError::Timeout {
            what: what.to_string(),
            cycles: cap,
            at: self.stamp(),
        })
    }

    /// Reads a signal's raw value.
    pub fn read(&self, name: &str) -> Result<LogicVec, SimError> {
        self.device.ports().read(name)
    }

    /// Reads a signal as an unsigned number.
    pub fn read_u64(&self, name: &str) -> Result<u64, SimError> {
        let value = self.read(name)?;
        value.to_u64().ok_or_else(|| self.indeterminate(name, &value))
    }

    /// Reads a signal as a two's-complement number.
    pub fn read_i64(&self, name: &str) -> Result<i64, SimError> {
        let value = self.read(name)?;
        value.to_i64().ok_or_else(|| self.indeterminate(name, &value))
    }

    fn indeterminate(&self, name: &str, value: &LogicVec) -> SimError {
        SimError::Indeterminate {
            signal: name.to_string(),
            value: value.to_string(),
            at: self.stamp(),
        }
    }

    /// Reads one bit.
    pub fn read_pin(&self, pin: &Pin) -> Result<Logic, SimError> {
        self.device.ports().read_pin(pin)
    }

    /// Reads one bit as a line level, taking `X`/`Z` as `idle`.
    pub fn read_level(&self, pin: &Pin, idle: bool) -> Result<bool, SimError> {
        Ok(self.read_pin(pin)?.or_idle(idle))
    }

    fn claim_check(&self, name: &str) -> Result<(), SimError> {
        match self.owners.get(name) {
            Some(owner) => Err(SimError::DriverConflict {
                signal: name.to_string(),
                owner: owner.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Drives an input with a raw value.
    pub fn write(&mut self, name: &str, value: LogicVec) -> Result<(), SimError> {
        self.claim_check(name)?;
        self.device.ports_mut().write(name, value)
    }

    /// Drives an input with an unsigned number.
    pub fn write_u64(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        self.claim_check(name)?;
        self.device.ports_mut().write_u64(name, value)
    }

    /// Drives an input with a signed number.
    pub fn write_i64(&mut self, name: &str, value: i64) -> Result<(), SimError> {
        self.claim_check(name)?;
        self.device.ports_mut().write_i64(name, value)
    }

    /// Drives one bit of an input.
    pub fn write_pin(&mut self, pin: &Pin, level: bool) -> Result<(), SimError> {
        self.claim_check(&pin.signal)?;
        self.device.ports_mut().write_pin(pin, level)
    }

    /// Checks that a signal currently reads as `expected`.
    pub fn expect(&self, name: &str, expected: u64) -> Result<(), SimError> {
        let observed = self.read_u64(name)?;
        if observed != expected {
            return Err(SimError::mismatch(
                name,
                format!("{expected:#x}"),
                format!("{observed:#x}"),
                self.stamp(),
            ));
        }
        Ok(())
    }

    /// The current cycle and time.
    pub fn stamp(&self) -> Stamp {
        Stamp {
            cycle: self.cycle,
            time: self.time,
        }
    }

    /// Rising edges so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Simulated time so far.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// The clock driving this bench.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The device under test.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the device, for whitebox setup.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::EdgeDetector;
    use crate::signal::PortTable;

    /// An 8-bit counter with enable and async active-low reset.
    struct Counter {
        ports: PortTable,
        clk: EdgeDetector,
        count: u64,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                ports: PortTable::new()
                    .input("clk", 1)
                    .input("rst_n", 1)
                    .input("en", 1)
                    .input("ui_in", 8)
                    .output("count", 8),
                clk: EdgeDetector::new(),
                count: 0,
            }
        }
    }

    impl Device for Counter {
        fn name(&self) -> &str {
            "counter"
        }
        fn ports(&self) -> &PortTable {
            &self.ports
        }
        fn ports_mut(&mut self) -> &mut PortTable {
            &mut self.ports
        }
        fn eval(&mut self) -> Result<(), SimError> {
            let rising = self.clk.update(self.ports.sample_bit("clk")?) == Some(Edge::Rising);
            if self.ports.read("rst_n")?.to_u64() == Some(0) {
                self.count = 0;
                self.ports.drive_u64("count", 0)?;
            } else if rising && self.ports.read("rst_n")?.to_u64() == Some(1) {
                if self.ports.sample_bit("en")? {
                    self.count = (self.count + 1) & 0xFF;
                }
                self.ports.drive_u64("count", self.count)?;
            }
            Ok(())
        }
    }

    fn bench() -> Bench<Counter> {
        let clock = Clock::new("clk", SimTime::from_ns(100)).unwrap();
        Bench::new(Counter::new(), clock).unwrap()
    }

    fn reset() -> ResetSequence {
        ResetSequence::active_low("rst_n", 100, 100)
    }

    /// Records the edges it sees and mirrors `count` bit 0 into `ui_in`.
    #[derive(Default)]
    struct Probe {
        edges: Vec<(Edge, u64)>,
    }

    impl EdgeTask for Probe {
        fn label(&self) -> String {
            "probe".into()
        }
        fn driven_signals(&self) -> Vec<String> {
            vec!["ui_in".into()]
        }
        fn on_edge(
            &mut self,
            edge: Edge,
            bus: &mut dyn SignalBus,
            at: Stamp,
        ) -> Result<(), SimError> {
            self.edges.push((edge, at.cycle));
            let bit = bus.read("count")?.to_u64().unwrap_or(0) & 1;
            bus.write_u64("ui_in", bit)
        }
    }

    #[test]
    fn outputs_indeterminate_before_reset() {
        let b = bench();
        assert!(matches!(
            b.read_u64("count").unwrap_err(),
            SimError::Indeterminate { .. }
        ));
    }

    #[test]
    fn reset_then_count() {
        let mut b = bench();
        b.reset(&reset()).unwrap();
        b.expect("count", 0).unwrap();
        b.write_u64("en", 1).unwrap();
        b.cycles(5).unwrap();
        b.expect("count", 5).unwrap();
        let err = b.expect("count", 6).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Mismatch);
    }

    #[test]
    fn time_and_cycles_advance_together() {
        let mut b = bench();
        b.rising_edge().unwrap();
        assert_eq!(b.cycle(), 1);
        assert_eq!(b.time(), SimTime::from_ns(50));
        b.falling_edge().unwrap();
        assert_eq!(b.cycle(), 1);
        assert_eq!(b.time(), SimTime::from_ns(100));
        b.wait(SimTime::from_ns(120)).unwrap();
        assert_eq!(b.time(), SimTime::from_ns(250));
        assert_eq!(b.cycle(), 3);
    }

    #[test]
    fn wait_until_checks_before_stepping() {
        let mut b = bench();
        b.reset(&reset()).unwrap();
        let waited = b
            .wait_until("count zero", 10, |b| Ok(b.read_u64("count")? == 0))
            .unwrap();
        assert_eq!(waited, 0);
        b.write_u64("en", 1).unwrap();
        let waited = b
            .wait_until("count 3", 10, |b| Ok(b.read_u64("count")? == 3))
            .unwrap();
        assert_eq!(waited, 3);
    }

    #[test]
    fn wait_until_times_out_with_cap() {
        let mut b = bench();
        b.reset(&reset()).unwrap();
        let start = b.cycle();
        let err = b
            .wait_until("count 9", 4, |b| Ok(b.read_u64("count")? == 9))
            .unwrap_err();
        match err {
            SimError::Timeout { cycles, at, .. } => {
                assert_eq!(cycles, 4);
                assert_eq!(at.cycle, start + 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tasks_run_every_edge_in_order() {
        let mut b = bench();
        let probe = Rc::new(RefCell::new(Probe::default()));
        b.attach(probe.clone()).unwrap();
        b.rising_edge().unwrap();
        b.falling_edge().unwrap();
        assert_eq!(
            probe.borrow().edges,
            vec![(Edge::Rising, 1), (Edge::Falling, 1)]
        );
    }

    #[test]
    fn task_writes_land_at_next_eval() {
        let mut b = bench();
        b.attach(Probe::default()).unwrap();
        b.reset(&reset()).unwrap();
        b.write_u64("en", 1).unwrap();
        b.rising_edge().unwrap();
        assert_eq!(b.read_u64("count").unwrap(), 1);
        assert_eq!(b.read_u64("ui_in").unwrap(), 1);
    }

    #[test]
    fn single_writer_is_enforced() {
        let mut b = bench();
        b.attach(Probe::default()).unwrap();
        let err = b.attach(Probe::default()).unwrap_err();
        assert_eq!(
            err,
            SimError::DriverConflict {
                signal: "ui_in".into(),
                owner: "probe".into()
            }
        );
        assert!(matches!(
            b.write_u64("ui_in", 1).unwrap_err(),
            SimError::DriverConflict { .. }
        ));
        assert!(b.write_u64("clk", 1).is_err());
        b.detach_all();
        b.write_u64("ui_in", 1).unwrap();
        assert!(b.write_u64("clk", 1).is_err());
    }

    #[test]
    fn reset_is_repeatable() {
        let mut b = bench();
        b.reset(&reset()).unwrap();
        b.write_u64("en", 1).unwrap();
        b.cycles(7).unwrap();
        b.falling_edge().unwrap();
        b.reset(&reset()).unwrap();
        b.expect("count", 0).unwrap();
    }
}
