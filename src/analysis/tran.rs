//! Fixed-step transient analysis.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::circuit::Circuit;
use crate::error::Result;
use crate::solver::{NewtonRaphson, SolverOptions, SolverState, TransientIntegrator};

use super::config::TranConfig;
use super::control::RunControl;
use super::op::solve_operating_point;
use super::result::{label_solution, SignalSet, SimulationResult, SolverIssue};

/// Run a transient analysis from t = 0 to `tran.stop`.
///
/// The t = 0 operating point seeds the reactive history and is reported as
/// `op_point`. If it cannot be solved, the run starts from all-zero initial
/// conditions instead. Points are recorded for `t >= start` only.
pub fn run_transient(
    circuit: &Circuit,
    tran: &TranConfig,
    options: &SolverOptions,
    control: &mut RunControl,
) -> Result<SimulationResult> {
    tran.validate()?;
    options.validate()?;

    let started = Instant::now();
    let steps = tran.step_count();
    let start = tran.start_time();
    // Tolerate rounding in k * step when comparing against the start time
    let record_from = start - 1e-9 * tran.step;
    info!(step = tran.step, stop = tran.stop, steps, "starting transient analysis");

    let mut result = SimulationResult {
        waveform: SignalSet::for_circuit(circuit),
        ..Default::default()
    };

    if control.is_cancelled() {
        info!("transient cancelled before start");
        result.cancelled = true;
        result.elapsed = started.elapsed();
        return Ok(result);
    }

    // Operating point at t = 0
    let newton = NewtonRaphson::new(options.clone());
    let mut state = SolverState::new(circuit.unknown_count());
    let initial = match solve_operating_point(circuit, &newton, &mut state) {
        Ok(outcome) => {
            result.converged = outcome.converged;
            result.iterations = outcome.iterations;
            if !outcome.converged {
                warn!("transient operating point did not converge");
                result
                    .issues
                    .push(SolverIssue::non_convergence(Some(0.0), outcome.iterations));
            }
            result.op_point = Some(label_solution(circuit, &outcome.unknowns));
            outcome.unknowns
        }
        Err(err) => {
            let issue = SolverIssue::from_error(&err, Some(0.0)).ok_or(err)?;
            warn!(issue = %issue.message, "no operating point, starting from zero initial conditions");
            result.converged = false;
            result.issues.push(issue);
            vec![0.0; circuit.unknown_count()]
        }
    };

    let mut integrator = TransientIntegrator::new(circuit, options.clone(), tran.step);
    integrator.initialize(&initial);
    if 0.0 >= record_from {
        result.waveform.record(0.0, &initial);
    }

    for k in 1..=steps {
        if control.is_cancelled() {
            info!(time = integrator.time(), "transient cancelled");
            result.cancelled = true;
            break;
        }

        let time = tran.time_at(k);
        match integrator.advance_to(time) {
            Ok(outcome) => {
                result.iterations += outcome.iterations;
                if !outcome.converged {
                    warn!(time, "transient step did not converge");
                    result.converged = false;
                    result
                        .issues
                        .push(SolverIssue::non_convergence(Some(time), outcome.iterations));
                }
                if time >= record_from {
                    result.waveform.record(time, &outcome.unknowns);
                }
            }
            Err(err) => {
                let issue = SolverIssue::from_error(&err, Some(time)).ok_or(err)?;
                warn!(time, issue = %issue.message, "skipping transient step");
                result.converged = false;
                result.issues.push(issue);
            }
        }
        debug!(time, "transient step done");
        control.report(k, steps, time);
    }

    result.elapsed = started.elapsed();
    info!(
        converged = result.converged,
        iterations = result.iterations,
        points = result.waveform.point_count(),
        elapsed = ?result.elapsed,
        "transient analysis finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::IssueKind;
    use crate::devices::{Pulse, Waveform};
    use crate::netlist::{DeviceDef, DeviceKind, ParsedNetlist};
    use approx::assert_abs_diff_eq;

    fn pulsed_rc() -> Circuit {
        let pulse = Waveform::Pulse(Pulse {
            v1: 0.0,
            v2: 1.0,
            delay: 0.0,
            rise: 1e-9,
            fall: 1e-9,
            width: 1.0,
            period: 0.0,
        });
        let netlist = ParsedNetlist::new()
            .with_device(
                DeviceDef::new(DeviceKind::VoltageSource, "V1", &["in", "0"], None).with_waveform(pulse),
            )
            .with_device(DeviceDef::resistor("R1", "in", "out", 1000.0))
            .with_device(DeviceDef::capacitor("C1", "out", "0", 1e-6));
        Circuit::from_netlist(&netlist).unwrap()
    }

    #[test]
    fn test_rc_step_response() {
        let circuit = pulsed_rc();
        let tran = TranConfig::new(1e-5, 5e-3);
        let result =
            run_transient(&circuit, &tran, &SolverOptions::default(), &mut RunControl::new()).unwrap();

        assert!(result.converged);
        assert_eq!(result.op_value("V(out)"), Some(0.0));
        let out = result.signal("V(out)").unwrap();
        assert_eq!(out.len(), 501);
        assert_eq!(out.data[0], (0.0, 0.0));

        // Within backward-Euler error of 1 - exp(-t/RC)
        for &(t, v) in out.data.iter().step_by(50) {
            assert_abs_diff_eq!(v, 1.0 - (-t / 1e-3).exp(), epsilon = 0.01);
        }
    }

    #[test]
    fn test_start_time_skips_early_points() {
        let circuit = pulsed_rc();
        let tran = TranConfig::new(1e-4, 1e-3).with_start(5e-4);
        let result =
            run_transient(&circuit, &tran, &SolverOptions::default(), &mut RunControl::new()).unwrap();

        let out = result.signal("V(out)").unwrap();
        assert_eq!(out.len(), 6);
        assert!(out.data[0].0 >= 5e-4 - 1e-12);
    }

    #[test]
    fn test_floating_capacitor_node_starts_from_zero() {
        // No DC path for node "mid": the OP is singular, transient is not
        let netlist = ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "in", "0", 1.0))
            .with_device(DeviceDef::capacitor("C1", "in", "mid", 1e-6))
            .with_device(DeviceDef::capacitor("C2", "mid", "0", 1e-6));
        let circuit = Circuit::from_netlist(&netlist).unwrap();
        let tran = TranConfig::new(1e-6, 1e-5);
        let result =
            run_transient(&circuit, &tran, &SolverOptions::default(), &mut RunControl::new()).unwrap();

        assert!(!result.converged);
        assert_eq!(result.issues[0].kind, IssueKind::Singular);
        assert_eq!(result.issues[0].at, Some(0.0));
        // Capacitive divider once the source is applied
        let mid = result.signal("V(mid)").unwrap();
        assert_abs_diff_eq!(mid.last_value().unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_steps_skipped_and_reported() {
        let netlist = ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "in", "0", 1.0))
            .with_device(DeviceDef::capacitor("C1", "in", "0", 1e-6))
            .with_device(DeviceDef::resistor("R2", "a", "b", 1000.0));
        let circuit = Circuit::from_netlist(&netlist).unwrap();
        let tran = TranConfig::new(1e-6, 5e-6);
        let result =
            run_transient(&circuit, &tran, &SolverOptions::default(), &mut RunControl::new()).unwrap();

        assert!(!result.converged);
        // Only the zero initial condition at t = 0 is recorded
        assert_eq!(result.waveform.point_count(), 1);
        assert_eq!(result.issues.len(), 6);
        assert!(result.issues.iter().all(|i| i.kind == IssueKind::Singular));
        for (k, issue) in result.issues.iter().enumerate() {
            assert_abs_diff_eq!(issue.at.unwrap(), tran.time_at(k), epsilon = 1e-18);
        }
    }

    #[test]
    fn test_invalid_config_is_error() {
        let circuit = pulsed_rc();
        let tran = TranConfig::new(-1.0, 1e-3);
        assert!(run_transient(&circuit, &tran, &SolverOptions::default(), &mut RunControl::new()).is_err());

        let tran = TranConfig::new(1e-30, 1.0);
        assert!(run_transient(&circuit, &tran, &SolverOptions::default(), &mut RunControl::new()).is_err());
    }
}
