//! DC operating point.

use std::time::Instant;

use tracing::{info, warn};

use crate::circuit::Circuit;
use crate::devices::StampContext;
use crate::error::Result;
use crate::solver::{NewtonOutcome, NewtonRaphson, SolverOptions, SolverState};

use super::result::{label_solution, SimulationResult, SolverIssue};

/// Solve for the DC operating point.
///
/// Capacitors are open, inductors shorted and time-varying sources take
/// their t = 0 value. Numerical failures are reported in the result
/// (`converged = false` plus an issue) rather than as an error.
pub fn run_dc_op(circuit: &Circuit, options: &SolverOptions) -> SimulationResult {
    let started = Instant::now();
    info!(unknowns = circuit.unknown_count(), "starting operating point analysis");

    let newton = NewtonRaphson::new(options.clone());
    let mut state = SolverState::new(circuit.unknown_count());
    let mut result = SimulationResult::default();

    match solve_operating_point(circuit, &newton, &mut state) {
        Ok(outcome) => {
            result.converged = outcome.converged;
            result.iterations = outcome.iterations;
            if !outcome.converged {
                warn!(iterations = outcome.iterations, "operating point did not converge");
                result
                    .issues
                    .push(SolverIssue::non_convergence(None, outcome.iterations));
            }
            result.op_point = Some(label_solution(circuit, &outcome.unknowns));
        }
        Err(err) => {
            warn!(error = %err, "operating point solve failed");
            result.converged = false;
            result.issues.extend(SolverIssue::from_error(&err, None));
        }
    }

    result.elapsed = started.elapsed();
    info!(
        converged = result.converged,
        iterations = result.iterations,
        elapsed = ?result.elapsed,
        "operating point analysis finished"
    );
    result
}

/// One DC Newton solve starting from `state.unknowns`.
pub(crate) fn solve_operating_point(
    circuit: &Circuit,
    newton: &NewtonRaphson,
    state: &mut SolverState,
) -> Result<NewtonOutcome> {
    let ctx = StampContext::dc(circuit.node_count()).with_gmin(newton.options.gmin);
    newton.solve(circuit, &ctx, state)
}
