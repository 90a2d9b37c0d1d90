//! Analysis drivers.
//!
//! Three analyses share one output type, [`SimulationResult`]:
//!
//! - [`run_dc_op`] - DC operating point
//! - [`run_dc_sweep`] - operating points over the values of one source
//! - [`run_transient`] - fixed-step backward-Euler time response
//!
//! [`run_simulation`] dispatches on an [`AnalysisConfig`], defaulting to an
//! operating point. Numerical trouble at individual points never aborts a
//! run: it is collected in [`SimulationResult::issues`] and the affected
//! point is kept (non-convergence) or skipped (singular system). Only
//! malformed requests come back as `Err`.

mod config;
mod control;
mod op;
mod result;
mod sweep;
mod tran;

pub use config::{AnalysisConfig, DcSweepConfig, TranConfig};
pub use control::{CancelToken, Progress, RunControl, PROGRESS_UPDATES};
pub use op::run_dc_op;
pub use result::{IssueKind, Signal, SignalSet, SimulationResult, SolverIssue};
pub use sweep::run_dc_sweep;
pub use tran::run_transient;

use crate::circuit::Circuit;
use crate::error::Result;
use crate::solver::SolverOptions;

/// Run the requested analysis (operating point if `None`) with default
/// solver options.
pub fn run_simulation(circuit: &Circuit, config: Option<&AnalysisConfig>) -> Result<SimulationResult> {
    run_simulation_with(circuit, config, &SolverOptions::default(), &mut RunControl::new())
}

/// Run the requested analysis with explicit solver options, progress
/// reporting and cancellation.
pub fn run_simulation_with(
    circuit: &Circuit,
    config: Option<&AnalysisConfig>,
    options: &SolverOptions,
    control: &mut RunControl,
) -> Result<SimulationResult> {
    match config.unwrap_or(&AnalysisConfig::Op) {
        AnalysisConfig::Op => {
            options.validate()?;
            Ok(run_dc_op(circuit, options))
        }
        AnalysisConfig::Tran(tran) => run_transient(circuit, tran, options, control),
        AnalysisConfig::DcSweep(sweep) => run_dc_sweep(circuit, sweep, options, control),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{DeviceDef, ParsedNetlist};

    #[test]
    fn test_default_is_operating_point() {
        let netlist = ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "vdd", "0", 3.3))
            .with_device(DeviceDef::resistor("R1", "vdd", "0", 1e3));
        let circuit = Circuit::from_netlist(&netlist).unwrap();

        let implicit = run_simulation(&circuit, None).unwrap();
        let explicit = run_simulation(&circuit, Some(&AnalysisConfig::Op)).unwrap();
        assert_eq!(implicit.op_point, explicit.op_point);
        assert_eq!(implicit.converged, explicit.converged);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let circuit = Circuit::from_netlist(&ParsedNetlist::new()).unwrap();
        let options = SolverOptions::new().with_max_iterations(0);
        let result = run_simulation_with(&circuit, None, &options, &mut RunControl::new());
        assert!(result.is_err());
    }
}
