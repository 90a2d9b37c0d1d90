//! DC sweep of one independent source.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::circuit::Circuit;
use crate::devices::{Device, StampContext};
use crate::error::{Result, SimError};
use crate::solver::{NewtonRaphson, SolverOptions, SolverState};

use super::config::DcSweepConfig;
use super::control::RunControl;
use super::result::{SignalSet, SimulationResult, SolverIssue};

/// Sweep `sweep.source` from `start` to `stop` and record every unknown.
///
/// Each point is solved as an operating point with the source forced to the
/// swept value, seeded with the previous point's solution. A point whose
/// solve fails numerically is skipped and reported as an issue.
pub fn run_dc_sweep(
    circuit: &Circuit,
    sweep: &DcSweepConfig,
    options: &SolverOptions,
    control: &mut RunControl,
) -> Result<SimulationResult> {
    sweep.validate()?;
    options.validate()?;
    let source = swept_source(circuit, &sweep.source)?;

    let started = Instant::now();
    let total = sweep.point_count();
    info!(source = %sweep.source, points = total, "starting DC sweep");

    let newton = NewtonRaphson::new(options.clone());
    let mut state = SolverState::new(circuit.unknown_count());
    let mut result = SimulationResult {
        converged: true,
        waveform: SignalSet::for_circuit(circuit),
        ..Default::default()
    };

    for i in 0..total {
        if control.is_cancelled() {
            info!(completed = i, "DC sweep cancelled");
            result.cancelled = true;
            if i == 0 {
                result.converged = false;
            }
            break;
        }

        let value = sweep.value_at(i);
        let ctx = StampContext::dc(circuit.node_count())
            .with_override(source.id(), value)
            .with_gmin(options.gmin);
        let previous = state.unknowns.clone();

        match newton.solve(circuit, &ctx, &mut state) {
            Ok(outcome) => {
                result.iterations += outcome.iterations;
                if !outcome.converged {
                    warn!(value, "DC sweep point did not converge");
                    result.converged = false;
                    result
                        .issues
                        .push(SolverIssue::non_convergence(Some(value), outcome.iterations));
                }
                result.waveform.record(value, &outcome.unknowns);
            }
            Err(err) => {
                let issue = SolverIssue::from_error(&err, Some(value)).ok_or(err)?;
                warn!(value, issue = %issue.message, "skipping DC sweep point");
                result.converged = false;
                result.issues.push(issue);
                state.seed(&previous);
            }
        }
        debug!(value, "DC sweep point done");
        control.report(i + 1, total, value);
    }

    result.elapsed = started.elapsed();
    info!(
        converged = result.converged,
        iterations = result.iterations,
        elapsed = ?result.elapsed,
        "DC sweep finished"
    );
    Ok(result)
}

/// Resolve the swept device; it must be an independent V or I source.
fn swept_source<'c>(circuit: &'c Circuit, name: &str) -> Result<&'c Device> {
    circuit
        .find_device(name)
        .filter(|d| d.is_independent_source())
        .ok_or_else(|| SimError::UnknownSource {
            name: name.to_string(),
        })
}
