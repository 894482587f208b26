use std::collections::HashMap;

use cosim_core::{Error, Model, Slave, ValueReference};
use thiserror::Error;
use tracing::debug;

/// Upper bound on initialization passes before inputs are taken as settled.
const MAX_INIT_PASSES: usize = 100;

/// The orchestrator's view of one slave.
pub trait Unit {
    /// Binds the start time and enters initialization mode.
    fn initialize(&mut self, start_time: f64) -> Result<(), Error>;
    fn exit_initialization(&mut self) -> Result<(), Error>;
    fn real(&self, vr: ValueReference) -> Result<f64, Error>;
    fn set_real(&mut self, vr: ValueReference, value: f64) -> Result<(), Error>;
    fn do_step(&mut self, current_point: f64, step_size: f64) -> Result<(), Error>;
    fn terminate(&mut self) -> Result<(), Error>;
    /// Current simulation time in seconds.
    fn time(&self) -> f64;
}

impl<M: Model> Unit for Slave<M> {
    fn initialize(&mut self, start_time: f64) -> Result<(), Error> {
        self.setup_experiment(None, start_time, None)?;
        self.enter_initialization_mode()
    }

    fn exit_initialization(&mut self) -> Result<(), Error> {
        self.exit_initialization_mode()
    }

    fn real(&self, vr: ValueReference) -> Result<f64, Error> {
        let mut value = [0.0];
        self.get_reals(&[vr], &mut value)?;
        Ok(value[0])
    }

    fn set_real(&mut self, vr: ValueReference, value: f64) -> Result<(), Error> {
        self.set_reals(&[vr], &[value])
    }

    fn do_step(&mut self, current_point: f64, step_size: f64) -> Result<(), Error> {
        Slave::do_step(self, current_point, step_size, true)
    }

    fn terminate(&mut self) -> Result<(), Error> {
        Slave::terminate(self)
    }

    fn time(&self) -> f64 {
        Slave::time(self).value
    }
}

/// A real variable of one unit in a [`Coupling`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    pub unit: usize,
    pub vr: ValueReference,
}

impl Port {
    #[must_use]
    pub fn new(unit: usize, vr: ValueReference) -> Self {
        Self { unit, vr }
    }
}

/// Feeds the value of `from` into `to` before `to`'s unit steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub from: Port,
    pub to: Port,
}

/// Order in which units see each other's outputs within a macro step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sequence {
    /// Every unit reads outputs from the previous macro step.
    Jacobi,
    /// Units step one after another in the given order; later units read
    /// outputs already produced in the current macro step.
    GaussSeidel(Vec<usize>),
}

#[derive(Debug, Error)]
pub enum CouplingError {
    #[error(transparent)]
    Unit(#[from] Error),

    #[error("Gauss-Seidel order must list each of the {0} units exactly once")]
    Order(usize),

    #[error("step size must be positive and end time reachable, got dt = {dt}, end = {end}")]
    Horizon { dt: f64, end: f64 },
}

/// Connection sources and observed ports at every communication point.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub times: Vec<f64>,
    pub values: HashMap<Port, Vec<f64>>,
}

impl Trace {
    /// Returns the recorded history of a port.
    ///
    /// # Panics
    ///
    /// Panics if `port` was neither a connection source nor observed.
    #[must_use]
    pub fn of(&self, port: Port) -> &[f64] {
        &self.values[&port]
    }

    /// Returns the last recorded value of `port`.
    ///
    /// # Panics
    ///
    /// Panics if `port` was neither a connection source nor observed.
    #[must_use]
    pub fn last(&self, port: Port) -> f64 {
        *self.of(port).last().unwrap_or(&f64::NAN)
    }
}

/// A set of units and the connections between them.
#[derive(Default)]
pub struct Coupling {
    units: Vec<Box<dyn Unit>>,
    connections: Vec<Connection>,
    observed: Vec<Port>,
}

impl Coupling {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit and returns its index.
    pub fn add(&mut self, unit: impl Unit + 'static) -> usize {
        self.units.push(Box::new(unit));
        self.units.len() - 1
    }

    pub fn connect(&mut self, from: Port, to: Port) {
        self.connections.push(Connection { from, to });
    }

    /// Records `port` in the trace even if nothing reads it.
    pub fn observe(&mut self, port: Port) {
        self.observed.push(port);
    }

    /// Gives access to a unit, e.g. to set parameters before a run.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not returned by [`add`](Self::add).
    pub fn unit_mut(&mut self, index: usize) -> &mut dyn Unit {
        self.units[index].as_mut()
    }

    #[must_use]
    pub fn unit(&self, index: usize) -> &dyn Unit {
        self.units[index].as_ref()
    }

    /// Runs all units from `t = 0` to `end` in steps of `dt`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid horizon or order, or as soon as any unit rejects a
    /// call.
    pub fn run(&mut self, sequence: &Sequence, dt: f64, end: f64) -> Result<Trace, CouplingError> {
        let steps = step_count(dt, end)?;
        let order = self.order(sequence)?;

        for unit in &mut self.units {
            unit.initialize(0.0)?;
        }
        self.settle_inputs()?;
        for unit in &mut self.units {
            unit.exit_initialization()?;
        }

        let mut trace = Trace::default();
        let mut t = 0.0;
        self.record(&mut trace, t)?;

        for _ in 0..steps {
            match sequence {
                Sequence::Jacobi => {
                    for &unit in &order {
                        self.update_inputs(unit)?;
                    }
                    for &unit in &order {
                        self.units[unit].do_step(t, dt)?;
                    }
                }
                Sequence::GaussSeidel(_) => {
                    for &unit in &order {
                        self.update_inputs(unit)?;
                        self.units[unit].do_step(t, dt)?;
                    }
                }
            }
            t += dt;
            self.record(&mut trace, t)?;
        }

        for unit in &mut self.units {
            unit.terminate()?;
        }
        debug!(steps, end = t, ?sequence, "coupled run finished");
        Ok(trace)
    }

    fn order(&self, sequence: &Sequence) -> Result<Vec<usize>, CouplingError> {
        let n = self.units.len();
        match sequence {
            Sequence::Jacobi => Ok((0..n).collect()),
            Sequence::GaussSeidel(order) => {
                let mut sorted = order.clone();
                sorted.sort_unstable();
                if sorted.into_iter().eq(0..n) {
                    Ok(order.clone())
                } else {
                    Err(CouplingError::Order(n))
                }
            }
        }
    }

    /// Copies outputs into connected inputs until nothing changes.
    fn settle_inputs(&mut self) -> Result<(), Error> {
        for _ in 0..MAX_INIT_PASSES {
            let mut settled = true;
            for i in 0..self.connections.len() {
                let Connection { from, to } = self.connections[i];
                let value = self.units[from.unit].real(from.vr)?;
                if self.units[to.unit].real(to.vr)? != value {
                    self.units[to.unit].set_real(to.vr, value)?;
                    settled = false;
                }
            }
            if settled {
                break;
            }
        }
        Ok(())
    }

    fn update_inputs(&mut self, unit: usize) -> Result<(), Error> {
        for i in 0..self.connections.len() {
            let Connection { from, to } = self.connections[i];
            if to.unit == unit {
                let value = self.units[from.unit].real(from.vr)?;
                self.units[unit].set_real(to.vr, value)?;
            }
        }
        Ok(())
    }

    fn record(&self, trace: &mut Trace, t: f64) -> Result<(), Error> {
        trace.times.push(t);
        let sources = self.connections.iter().map(|connection| connection.from);
        for port in sources.chain(self.observed.iter().copied()) {
            let history = trace.values.entry(port).or_default();
            if history.len() < trace.times.len() {
                history.push(self.units[port.unit].real(port.vr)?);
            }
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn step_count(dt: f64, end: f64) -> Result<usize, CouplingError> {
    let steps = (end / dt).round();
    if dt > 0.0 && steps.is_finite() && steps >= 0.0 {
        Ok(steps as usize)
    } else {
        Err(CouplingError::Horizon { dt, end })
    }
}
