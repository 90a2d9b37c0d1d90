//! # OpenSilicon Sim
//!
//! Analog circuit simulation core for the OpenSilicon layout tool.
//!
//! This library provides:
//! - A typed circuit model built from a parsed SPICE-style netlist
//! - Modified Nodal Analysis (MNA) with dense LU factorization
//! - Linear devices (R, C, L), independent sources with pulse/sine/PWL
//!   waveforms, diodes and level-1 MOSFETs
//! - DC operating point, DC sweep and fixed-step transient analyses
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`netlist`] - Parsed-netlist boundary types (what a netlist parser hands over)
//! - [`circuit`] - Circuit graph representation and validation
//! - [`devices`] - Device models and their MNA stamps
//! - [`solver`] - MNA assembly, LU solving, Newton-Raphson and time integration
//! - [`analysis`] - Operating point, DC sweep and transient drivers
//!
//! ## Usage
//!
//! ```
//! use opensilicon_sim::netlist::{DeviceDef, ParsedNetlist};
//! use opensilicon_sim::{run_simulation, Circuit};
//!
//! let netlist = ParsedNetlist::new()
//!     .with_device(DeviceDef::voltage_source("V1", "in", "0", 1.8))
//!     .with_device(DeviceDef::resistor("R1", "in", "out", 1e3))
//!     .with_device(DeviceDef::resistor("R2", "out", "0", 1e3));
//! let circuit = Circuit::from_netlist(&netlist)?;
//! let result = run_simulation(&circuit, None)?;
//! assert!((result.op_value("V(out)").unwrap() - 0.9).abs() < 1e-9);
//! # Ok::<(), opensilicon_sim::SimError>(())
//! ```
//!
//! ## Simulation Method
//!
//! Every analysis reduces to Newton-Raphson solves of the MNA system:
//!
//! 1. Stamp each device's (linearized) contribution into A and z
//! 2. Solve Ax = z for node voltages and branch currents
//! 3. Repeat from the new solution until the update is within tolerance
//!
//! Reactive elements (C, L) are discretized with backward Euler during
//! transient analysis; each timestep is one Newton solve seeded with the
//! previous solution.

pub mod analysis;
pub mod circuit;
pub mod devices;
pub mod error;
pub mod netlist;
pub mod solver;

// Re-export main types for convenience
pub use analysis::{
    run_dc_op, run_dc_sweep, run_simulation, run_simulation_with, run_transient, AnalysisConfig,
    SimulationResult,
};
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use netlist::ParsedNetlist;
pub use solver::SolverOptions;

/// Thermal voltage kT/q at 300 K (V)
pub const THERMAL_VOLTAGE: f64 = 0.025852;
