//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources and inductors to nodes
//! - D is 0 for ideal voltage sources and -L/h for inductors in transient
//! - v is the vector of node voltages (ground excluded)
//! - j is the vector of branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of branch voltages
//!
//! Nonlinear devices are handled by [`NewtonRaphson`], reactive devices by
//! the backward-Euler [`TransientIntegrator`].

mod mna;
mod newton;
mod options;
mod transient;

pub use mna::{MnaMatrix, PIVOT_THRESHOLD};
pub use newton::{NewtonOutcome, NewtonRaphson, SolverState};
pub use options::SolverOptions;
pub use transient::TransientIntegrator;

/// Default relative convergence tolerance.
pub const DEFAULT_RELTOL: f64 = 1e-3;

/// Default absolute tolerance on node voltages (V).
pub const DEFAULT_VNTOL: f64 = 1e-6;

/// Default absolute tolerance on branch currents (A).
pub const DEFAULT_ABSTOL: f64 = 1e-9;

/// Maximum Newton-Raphson iterations per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Minimum conductance across nonlinear junctions.
pub const MIN_CONDUCTANCE: f64 = 1e-12;
