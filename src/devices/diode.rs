//! Junction diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! For Newton-Raphson iteration, we linearize around the current guess V0:
//!   I ≈ G_d * V + I_eq,  G_d = dI/dV(V0),  I_eq = I(V0) - G_d * V0
//!
//! Above `n * Vt * MAX_EXP_ARG` the exponential is continued along its
//! tangent so that a wild first guess cannot overflow the stamp.

use crate::circuit::{DeviceId, NodeId};
use crate::error::{Result, SimError};
use crate::netlist::ModelDef;
use crate::solver::MnaMatrix;
use crate::THERMAL_VOLTAGE;

use super::StampContext;

/// Largest exponent evaluated exactly.
const MAX_EXP_ARG: f64 = 40.0;

/// Parameters for a diode model.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self { is: 1e-14, n: 1.0 }
    }
}

impl DiodeParams {
    /// Create parameters from a model definition, scaled by the instance area.
    pub fn from_model(model: &ModelDef, device: &str, area: f64) -> Result<Self> {
        let mut params = Self::default();
        if let Some(is) = model.param("is") {
            params.is = is;
        }
        if let Some(n) = model.param("n") {
            params.n = n;
        }
        params.is *= area;
        params.check(device)?;
        Ok(params)
    }

    fn check(&self, device: &str) -> Result<()> {
        if !(self.is > 0.0) {
            return Err(SimError::invalid_parameter(device, "is", "saturation current must be positive"));
        }
        if !(self.n > 0.0) {
            return Err(SimError::invalid_parameter(device, "n", "ideality factor must be positive"));
        }
        Ok(())
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }
}

/// A diode.
#[derive(Debug, Clone)]
pub struct Diode {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub params: DiodeParams,
}

impl Diode {
    /// Create a new diode.
    pub fn new(id: DeviceId, name: String, nodes: [NodeId; 2], params: DiodeParams) -> Self {
        Self {
            id,
            name,
            nodes,
            params,
        }
    }

    fn v_max(&self) -> f64 {
        self.params.n_vt() * MAX_EXP_ARG
    }

    /// Diode current at forward voltage `v`.
    pub fn current(&self, v: f64) -> f64 {
        let n_vt = self.params.n_vt();
        let v_max = self.v_max();
        if v > v_max {
            let e = MAX_EXP_ARG.exp();
            self.params.is * (e - 1.0) + self.params.is / n_vt * e * (v - v_max)
        } else {
            self.params.is * ((v / n_vt).exp() - 1.0)
        }
    }

    /// Small-signal conductance dI/dV at forward voltage `v`.
    pub fn conductance(&self, v: f64) -> f64 {
        let n_vt = self.params.n_vt();
        let arg = (v / n_vt).min(MAX_EXP_ARG);
        self.params.is / n_vt * arg.exp()
    }

    /// Get the linearized model at `v0`.
    /// Returns (conductance G, equivalent current source I_eq)
    /// such that I = G * V + I_eq
    pub fn linearize(&self, v0: f64, gmin: f64) -> (f64, f64) {
        let g = self.conductance(v0).max(gmin);
        let i_eq = self.current(v0) - g * v0;
        (g, i_eq)
    }

    pub fn stamp(&self, ctx: &StampContext, unknowns: &[f64], mna: &mut MnaMatrix) {
        let n_anode = self.nodes[0].index();
        let n_cathode = self.nodes[1].index();
        let v_d = voltage(unknowns, n_anode) - voltage(unknowns, n_cathode);

        let (g, i_eq) = self.linearize(v_d, ctx.gmin);
        mna.stamp_conductance(n_anode, n_cathode, g);
        mna.stamp_current_source(n_anode, n_cathode, i_eq);
    }
}

/// Node voltage from an unknown vector, ground reads as 0 V.
pub(crate) fn voltage(unknowns: &[f64], index: Option<usize>) -> f64 {
    index.and_then(|i| unknowns.get(i).copied()).unwrap_or(0.0)
}
