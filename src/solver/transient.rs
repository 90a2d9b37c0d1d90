//! Fixed-step backward-Euler integration.
//!
//! Each step replaces capacitors and inductors by their companion models
//! (see [`crate::devices::Capacitor`] and [`crate::devices::Inductor`]) and
//! runs a Newton-Raphson solve at the new time. The reactive history (one
//! value per device, indexed by [`crate::circuit::DeviceId`]) is advanced
//! only after a step produces a usable solution.

use tracing::trace;

use crate::circuit::Circuit;
use crate::devices::{Device, StampContext};
use crate::error::Result;

use super::newton::{NewtonOutcome, NewtonRaphson, SolverState};
use super::SolverOptions;

/// Time-stepping state for one transient run.
#[derive(Debug)]
pub struct TransientIntegrator<'c> {
    circuit: &'c Circuit,
    newton: NewtonRaphson,
    state: SolverState,
    history: Vec<f64>,
    step: f64,
    time: f64,
    /// Time of the point the history belongs to
    accepted: f64,
}

impl<'c> TransientIntegrator<'c> {
    /// Create an integrator with fixed step `step`, starting at t = 0 with
    /// all unknowns and history zero.
    pub fn new(circuit: &'c Circuit, options: SolverOptions, step: f64) -> Self {
        Self {
            circuit,
            newton: NewtonRaphson::new(options),
            state: SolverState::new(circuit.unknown_count()),
            history: vec![0.0; circuit.devices().len()],
            step,
            time: 0.0,
            accepted: 0.0,
        }
    }

    /// Seed unknowns and reactive history from the t = 0 operating point.
    pub fn initialize(&mut self, operating_point: &[f64]) {
        self.state.seed(operating_point);
        self.time = 0.0;
        self.accepted = 0.0;
        self.update_history();
    }

    /// Advance one step to `time + step`.
    ///
    /// A non-converged solve is still accepted as the best available
    /// solution. On `Err` (singular matrix, overflow) the unknowns and
    /// history are left at the previous accepted timepoint, but the clock
    /// advances so the caller can skip the point and carry on.
    pub fn advance(&mut self) -> Result<NewtonOutcome> {
        let time = self.time + self.step;
        self.advance_to(time)
    }

    /// Advance to an explicit `time`.
    ///
    /// The companion models span the interval since the last accepted
    /// point, so after a skipped step the next one integrates over both.
    pub fn advance_to(&mut self, time: f64) -> Result<NewtonOutcome> {
        let previous = self.state.unknowns.clone();
        self.time = time;
        let interval = time - self.accepted;

        let ctx = StampContext::transient(self.circuit.node_count(), time, interval, &self.history)
            .with_gmin(self.newton.options.gmin);

        match self.newton.solve(self.circuit, &ctx, &mut self.state) {
            Ok(outcome) => {
                trace!(time, interval, iterations = outcome.iterations, "transient step");
                self.accepted = time;
                self.update_history();
                Ok(outcome)
            }
            Err(err) => {
                self.state.seed(&previous);
                Err(err)
            }
        }
    }

    /// Time of the most recent step.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Time of the most recent accepted point.
    pub fn accepted_time(&self) -> f64 {
        self.accepted
    }

    /// Unknowns at the most recent accepted timepoint.
    pub fn unknowns(&self) -> &[f64] {
        &self.state.unknowns
    }

    /// Reactive history at the most recent accepted timepoint.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Capture capacitor voltages and inductor currents from the unknowns.
    fn update_history(&mut self) {
        let unknowns = &self.state.unknowns;
        let node_count = self.circuit.node_count();
        let voltage = |index: Option<usize>| index.map_or(0.0, |i| unknowns[i]);

        for device in self.circuit.devices() {
            match device {
                Device::Capacitor(c) => {
                    self.history[c.id.0] = voltage(c.nodes[0].index()) - voltage(c.nodes[1].index());
                }
                Device::Inductor(l) => {
                    self.history[l.id.0] = unknowns[node_count + l.branch.0];
                }
                _ => {}
            }
        }
    }
}
