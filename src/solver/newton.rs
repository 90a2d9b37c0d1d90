//! Newton-Raphson iteration for nonlinear circuits.

use tracing::{debug, trace};

use crate::circuit::Circuit;
use crate::devices::StampContext;
use crate::error::{Result, SimError};

use super::mna::MnaMatrix;
use super::SolverOptions;

/// Scratch buffers for one solve: the unknown vector and the MNA system.
///
/// Owned by exactly one analysis; the matrix and RHS are zeroed and
/// re-stamped every iteration.
#[derive(Debug, Clone)]
pub struct SolverState {
    /// Current guess, then the solution once the solve returns
    pub unknowns: Vec<f64>,
    /// System matrix, RHS and LU buffers
    pub mna: MnaMatrix,
}

impl SolverState {
    /// Zero-initialized state for `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            unknowns: vec![0.0; size],
            mna: MnaMatrix::new(size),
        }
    }

    /// Replace the initial guess.
    pub fn seed(&mut self, guess: &[f64]) {
        self.unknowns.copy_from_slice(guess);
    }

    pub fn size(&self) -> usize {
        self.unknowns.len()
    }
}

/// Result of one Newton-Raphson solve.
#[derive(Debug, Clone)]
pub struct NewtonOutcome {
    /// Whether the final iteration met the convergence test
    pub converged: bool,
    /// Iterations performed (linear solves)
    pub iterations: usize,
    /// Final iterate; the best available vector when not converged
    pub unknowns: Vec<f64>,
}

/// Newton-Raphson solver for nonlinear circuits.
#[derive(Debug, Clone, Default)]
pub struct NewtonRaphson {
    pub options: SolverOptions,
}

impl NewtonRaphson {
    /// Create a new Newton-Raphson solver.
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// Solve the circuit for the sources and history in `ctx`, starting from
    /// `state.unknowns`.
    ///
    /// Reaching the iteration cap is not an error: the outcome reports
    /// `converged = false` with the last iterate. A singular matrix or a
    /// non-finite solution is returned as `Err`.
    pub fn solve(
        &self,
        circuit: &Circuit,
        ctx: &StampContext,
        state: &mut SolverState,
    ) -> Result<NewtonOutcome> {
        debug_assert_eq!(state.size(), circuit.unknown_count());

        if !circuit.is_nonlinear() {
            // Purely linear circuit - solve directly
            stamp_all(circuit, ctx, state);
            state.mna.factor()?;
            state.mna.solve()?;
            check_finite(circuit, &state.mna.x)?;
            state.unknowns.copy_from_slice(&state.mna.x);
            return Ok(NewtonOutcome {
                converged: true,
                iterations: 1,
                unknowns: state.unknowns.clone(),
            });
        }

        let node_count = circuit.node_count();
        for iter in 0..self.options.max_iterations {
            // Clear and rebuild the linearized system at the current guess
            stamp_all(circuit, ctx, state);

            state.mna.factor()?;
            state.mna.solve()?;
            check_finite(circuit, &state.mna.x)?;

            let converged = self.apply_update(node_count, &mut state.unknowns, &state.mna.x);
            trace!(iteration = iter + 1, converged, "newton iteration");

            if converged {
                debug!(iterations = iter + 1, "newton converged");
                return Ok(NewtonOutcome {
                    converged: true,
                    iterations: iter + 1,
                    unknowns: state.unknowns.clone(),
                });
            }
        }

        debug!(
            iterations = self.options.max_iterations,
            "newton hit the iteration cap"
        );
        Ok(NewtonOutcome {
            converged: false,
            iterations: self.options.max_iterations,
            unknowns: state.unknowns.clone(),
        })
    }

    /// Move `unknowns` toward `solution`, clamping node-voltage steps if
    /// configured. Returns true when the step met the tolerance and was not
    /// clamped.
    fn apply_update(&self, node_count: usize, unknowns: &mut [f64], solution: &[f64]) -> bool {
        let opts = &self.options;
        let mut converged = true;
        let mut clamped = false;

        for (i, (old, &new)) in unknowns.iter_mut().zip(solution).enumerate() {
            let mut delta = new - *old;
            let abs_tol = if i < node_count { opts.vntol } else { opts.abstol };
            let tol = opts.reltol * new.abs().max(old.abs()) + abs_tol;
            if delta.abs() > tol {
                converged = false;
            }

            if i < node_count {
                if let Some(max_step) = opts.max_voltage_step {
                    if delta.abs() > max_step {
                        delta = max_step.copysign(delta);
                        clamped = true;
                    }
                }
            }
            *old += delta;
        }

        converged && !clamped
    }
}

/// Zero the system and stamp every device at `state.unknowns`.
pub(crate) fn stamp_all(circuit: &Circuit, ctx: &StampContext, state: &mut SolverState) {
    state.mna.clear();
    for device in circuit.devices() {
        device.stamp(ctx, &state.unknowns, &mut state.mna);
    }
}

fn check_finite(circuit: &Circuit, x: &[f64]) -> Result<()> {
    match x.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(SimError::NumericalOverflow {
            label: circuit.unknown_label(i),
            value: x[i],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{DeviceDef, ParsedNetlist};
    use approx::assert_relative_eq;

    fn diode_clamp() -> Circuit {
        let netlist = ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "in", "0", 5.0))
            .with_device(DeviceDef::resistor("R1", "in", "a", 1000.0))
            .with_device(DeviceDef::diode("D1", "a", "0"));
        Circuit::from_netlist(&netlist).unwrap()
    }

    #[test]
    fn test_linear_circuit_single_solve() {
        let netlist = ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "in", "0", 1.8))
            .with_device(DeviceDef::resistor("R1", "in", "out", 1000.0))
            .with_device(DeviceDef::resistor("R2", "out", "0", 1000.0));
        let circuit = Circuit::from_netlist(&netlist).unwrap();
        let mut state = SolverState::new(circuit.unknown_count());
        let ctx = StampContext::dc(circuit.node_count());

        let outcome = NewtonRaphson::default().solve(&circuit, &ctx, &mut state).unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
        let out = circuit.find_node("out").unwrap().index().unwrap();
        assert_relative_eq!(outcome.unknowns[out], 0.9, max_relative = 1e-12);
    }

    #[test]
    fn test_diode_circuit_converges() {
        let circuit = diode_clamp();
        let mut state = SolverState::new(circuit.unknown_count());
        let ctx = StampContext::dc(circuit.node_count());

        let outcome = NewtonRaphson::default().solve(&circuit, &ctx, &mut state).unwrap();
        assert!(outcome.converged);
        assert!(outcome.iterations < 100);

        let a = circuit.find_node("a").unwrap().index().unwrap();
        let vd = outcome.unknowns[a];
        assert!(vd > 0.6 && vd < 0.75, "V(diode) = {vd}");
    }

    #[test]
    fn test_damped_update_reaches_same_solution() {
        let circuit = diode_clamp();
        let ctx = StampContext::dc(circuit.node_count());
        let a = circuit.find_node("a").unwrap().index().unwrap();

        let mut plain = SolverState::new(circuit.unknown_count());
        let undamped = NewtonRaphson::default().solve(&circuit, &ctx, &mut plain).unwrap();

        let mut damped_state = SolverState::new(circuit.unknown_count());
        let damped = NewtonRaphson::new(SolverOptions::new().with_max_voltage_step(0.5))
            .solve(&circuit, &ctx, &mut damped_state)
            .unwrap();

        assert!(damped.converged);
        assert_relative_eq!(damped.unknowns[a], undamped.unknowns[a], max_relative = 1e-3);
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let circuit = diode_clamp();
        let mut state = SolverState::new(circuit.unknown_count());
        let ctx = StampContext::dc(circuit.node_count());

        let outcome = NewtonRaphson::new(SolverOptions::new().with_max_iterations(2))
            .solve(&circuit, &ctx, &mut state)
            .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.unknowns.len(), circuit.unknown_count());
    }

    #[test]
    fn test_floating_node_is_an_error() {
        let netlist = ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "in", "0", 1.0))
            .with_device(DeviceDef::capacitor("C1", "in", "float", 1e-9));
        let circuit = Circuit::from_netlist(&netlist).unwrap();
        let mut state = SolverState::new(circuit.unknown_count());
        let ctx = StampContext::dc(circuit.node_count());

        let err = NewtonRaphson::default().solve(&circuit, &ctx, &mut state).unwrap_err();
        assert!(matches!(err, SimError::SingularMatrix));
    }

    #[test]
    fn test_update_tolerance() {
        let newton = NewtonRaphson::default();
        let mut x = vec![1.0, 2.0, 0.001];
        assert!(newton.apply_update(2, &mut x, &[1.0000001, 2.0000001, 0.001]));

        let mut x = vec![1.0, 2.0, 0.001];
        assert!(!newton.apply_update(2, &mut x, &[1.1, 2.0, 0.001]));
        assert_eq!(x[0], 1.1);
    }
}
