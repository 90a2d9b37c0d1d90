//! Solver tolerances and limits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SimError};

use super::{
    DEFAULT_ABSTOL, DEFAULT_MAX_ITERATIONS, DEFAULT_RELTOL, DEFAULT_VNTOL, MIN_CONDUCTANCE,
};

/// Configuration for the Newton-Raphson solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Relative tolerance on every unknown.
    pub reltol: f64,
    /// Absolute tolerance on node voltages (V).
    pub vntol: f64,
    /// Absolute tolerance on branch currents (A).
    pub abstol: f64,
    /// Maximum Newton-Raphson iterations per solve.
    pub max_iterations: usize,
    /// Minimum junction conductance (S).
    pub gmin: f64,
    /// Largest node-voltage change applied in one Newton iteration.
    /// `None` applies the full update.
    pub max_voltage_step: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            reltol: DEFAULT_RELTOL,
            vntol: DEFAULT_VNTOL,
            abstol: DEFAULT_ABSTOL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gmin: MIN_CONDUCTANCE,
            max_voltage_step: None,
        }
    }
}

impl SolverOptions {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative tolerance.
    pub fn with_reltol(mut self, reltol: f64) -> Self {
        self.reltol = reltol;
        self
    }

    /// Set the absolute tolerances for node voltages and branch currents.
    pub fn with_abstol(mut self, vntol: f64, abstol: f64) -> Self {
        self.vntol = vntol;
        self.abstol = abstol;
        self
    }

    /// Set the minimum junction conductance.
    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    /// Clamp node-voltage updates to `step` volts per iteration.
    ///
    /// Helps steep diode/MOSFET exponentials at the cost of more iterations
    /// for large supply voltages.
    pub fn with_max_voltage_step(mut self, step: f64) -> Self {
        self.max_voltage_step = Some(step);
        self
    }

    /// Build options from `.options` parameters on top of the defaults.
    ///
    /// Recognized keys: `reltol`, `vntol`, `abstol`, `gmin`, `itl1`
    /// (iteration limit) and `maxstep` (voltage step clamp).
    pub fn from_params(params: &BTreeMap<String, f64>) -> Result<Self> {
        let mut options = Self::default();
        for (key, &value) in params {
            match key.to_ascii_lowercase().as_str() {
                "reltol" => options.reltol = value,
                "vntol" => options.vntol = value,
                "abstol" => options.abstol = value,
                "gmin" => options.gmin = value,
                "itl1" => {
                    if !(value >= 1.0) {
                        return Err(SimError::invalid_analysis(format!("itl1 must be at least 1, got {value}")));
                    }
                    options.max_iterations = value as usize;
                }
                "maxstep" => options.max_voltage_step = Some(value),
                other => warn!(option = other, "ignoring unsupported solver option"),
            }
        }
        options.validate()?;
        Ok(options)
    }

    /// Check that every tolerance is usable.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("reltol", self.reltol),
            ("vntol", self.vntol),
            ("abstol", self.abstol),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SimError::invalid_analysis(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.gmin >= 0.0) {
            return Err(SimError::invalid_analysis(format!("gmin must be non-negative, got {}", self.gmin)));
        }
        if self.max_iterations == 0 {
            return Err(SimError::invalid_analysis("max_iterations must be at least 1"));
        }
        if let Some(step) = self.max_voltage_step {
            if !(step > 0.0) {
                return Err(SimError::invalid_analysis(format!("max_voltage_step must be positive, got {step}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_spice_like() {
        let opts = SolverOptions::default();
        assert_eq!(opts.reltol, 1e-3);
        assert_eq!(opts.abstol, 1e-9);
        assert_eq!(opts.max_iterations, 100);
        assert!(opts.max_voltage_step.is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_from_params() {
        let mut params = BTreeMap::new();
        params.insert("RELTOL".to_string(), 1e-4);
        params.insert("itl1".to_string(), 250.0);
        params.insert("maxstep".to_string(), 0.3);
        params.insert("temp".to_string(), 27.0);
        let opts = SolverOptions::from_params(&params).unwrap();
        assert_eq!(opts.reltol, 1e-4);
        assert_eq!(opts.max_iterations, 250);
        assert_eq!(opts.max_voltage_step, Some(0.3));
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let opts = SolverOptions::new().with_reltol(0.0);
        assert!(opts.validate().is_err());
        let opts = SolverOptions::new().with_max_iterations(0);
        assert!(opts.validate().is_err());
    }
}
