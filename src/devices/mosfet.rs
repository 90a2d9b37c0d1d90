//! Level-1 (Shichman-Hodges) MOSFET model.
//!
//! With polarity-normalized voltages (NMOS as-is, PMOS negated) and
//! β = KP·W/L, Vov = Vgs − Vto:
//!
//! ```text
//! cutoff     Vov <= 0          Ids = 0
//! triode     Vds <  Vov        Ids = β (Vov Vds − Vds²/2)(1 + λ Vds)
//! saturation Vds >= Vov        Ids = β/2 Vov² (1 + λ Vds)
//! ```
//!
//! A negative Vds swaps the roles of drain and source. The device is stamped
//! as gds between drain and source, a gm transconductance controlled by Vgs,
//! and the Norton current Ids − gm·Vgs − gds·Vds. The optional bulk terminal
//! is accepted but there is no body effect.

use crate::circuit::{DeviceId, NodeId};
use crate::error::{Result, SimError};
use crate::netlist::{DeviceDef, ModelDef, ModelKind};
use crate::solver::MnaMatrix;

use super::diode::voltage;
use super::StampContext;

/// Channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosType {
    Nmos,
    Pmos,
}

impl MosType {
    fn sign(&self) -> f64 {
        match self {
            MosType::Nmos => 1.0,
            MosType::Pmos => -1.0,
        }
    }
}

/// Parameters for a level-1 MOSFET.
#[derive(Debug, Clone)]
pub struct MosfetParams {
    pub mos_type: MosType,
    /// Threshold voltage in the device's own polarity (V); negative for a
    /// depletion-mode device
    pub vto: f64,
    /// Process transconductance µCox (A/V²)
    pub kp: f64,
    /// Channel-length modulation (1/V)
    pub lambda: f64,
    /// Channel width (m)
    pub w: f64,
    /// Channel length (m)
    pub l: f64,
}

impl MosfetParams {
    /// Default NMOS: Vto = 0.7 V, KP = 2e-5 A/V², W = L = 1 µm.
    pub fn nmos() -> Self {
        Self {
            mos_type: MosType::Nmos,
            vto: 0.7,
            kp: 2e-5,
            lambda: 0.0,
            w: 1e-6,
            l: 1e-6,
        }
    }

    /// Default PMOS with the same magnitudes as [`MosfetParams::nmos`].
    pub fn pmos() -> Self {
        Self {
            mos_type: MosType::Pmos,
            ..Self::nmos()
        }
    }

    /// Build parameters from a model plus the instance's `W`/`L`.
    ///
    /// The model VTO is taken as written for NMOS and negated for PMOS, so a
    /// conventional PMOS VTO of -0.7 becomes 0.7 and an NMOS VTO of -1 stays
    /// a depletion threshold.
    pub fn from_model(model: &ModelDef, instance: &DeviceDef) -> Result<Self> {
        let mut params = match model.kind {
            ModelKind::Nmos => Self::nmos(),
            ModelKind::Pmos => Self::pmos(),
            ModelKind::Diode => {
                return Err(SimError::invalid_device(
                    &instance.name,
                    format!("model '{}' is a diode model, expected NMOS or PMOS", model.name),
                ));
            }
        };

        if let Some(vto) = model.param("vto") {
            params.vto = params.mos_type.sign() * vto;
        }
        if let Some(kp) = model.param("kp") {
            params.kp = kp;
        }
        if let Some(lambda) = model.param("lambda") {
            params.lambda = lambda;
        }
        params.with_geometry(instance)
    }

    /// Default NMOS sized by the instance's `W`/`L`, for devices without a model.
    pub fn from_instance(instance: &DeviceDef) -> Result<Self> {
        Self::nmos().with_geometry(instance)
    }

    fn with_geometry(mut self, instance: &DeviceDef) -> Result<Self> {
        if let Some(w) = instance.param("w") {
            self.w = w;
        }
        if let Some(l) = instance.param("l") {
            self.l = l;
        }
        self.check(&instance.name)?;
        Ok(self)
    }

    fn check(&self, device: &str) -> Result<()> {
        if !(self.kp > 0.0) {
            return Err(SimError::invalid_parameter(device, "kp", "must be positive"));
        }
        if !(self.w > 0.0) {
            return Err(SimError::invalid_parameter(device, "w", "must be positive"));
        }
        if !(self.l > 0.0) {
            return Err(SimError::invalid_parameter(device, "l", "must be positive"));
        }
        if !(self.lambda >= 0.0) {
            return Err(SimError::invalid_parameter(device, "lambda", "must be non-negative"));
        }
        Ok(())
    }

    /// β = KP·W/L
    pub fn beta(&self) -> f64 {
        self.kp * self.w / self.l
    }
}

/// Operating region of the (normalized) device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosRegion {
    Cutoff,
    Triode,
    Saturation,
}

/// Drain current and its partial derivatives at one bias point.
///
/// `ids` flows into the drain terminal and out of the source terminal.
#[derive(Debug, Clone, Copy)]
pub struct MosOperatingPoint {
    pub ids: f64,
    /// ∂Ids/∂Vgs
    pub gm: f64,
    /// ∂Ids/∂Vds
    pub gds: f64,
    pub region: MosRegion,
}

/// A MOSFET.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 3], // [drain, gate, source]
    pub bulk: Option<NodeId>,
    pub params: MosfetParams,
}

impl Mosfet {
    /// Create a new MOSFET.
    pub fn new(
        id: DeviceId,
        name: String,
        nodes: [NodeId; 3],
        bulk: Option<NodeId>,
        params: MosfetParams,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            bulk,
            params,
        }
    }

    pub fn drain(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn gate(&self) -> NodeId {
        self.nodes[1]
    }

    pub fn source(&self) -> NodeId {
        self.nodes[2]
    }

    /// Forward-mode square law for normalized `vgs`, `vds >= 0`.
    fn forward(&self, vgs: f64, vds: f64) -> MosOperatingPoint {
        let beta = self.params.beta();
        let lambda = self.params.lambda;
        let vov = vgs - self.params.vto;

        if vov <= 0.0 {
            return MosOperatingPoint {
                ids: 0.0,
                gm: 0.0,
                gds: 0.0,
                region: MosRegion::Cutoff,
            };
        }

        let clm = 1.0 + lambda * vds;
        if vds < vov {
            let core = vov * vds - 0.5 * vds * vds;
            MosOperatingPoint {
                ids: beta * core * clm,
                gm: beta * vds * clm,
                gds: beta * (vov - vds) * clm + beta * core * lambda,
                region: MosRegion::Triode,
            }
        } else {
            let core = 0.5 * vov * vov;
            MosOperatingPoint {
                ids: beta * core * clm,
                gm: beta * vov * clm,
                gds: beta * core * lambda,
                region: MosRegion::Saturation,
            }
        }
    }

    /// Evaluate at terminal voltages `vgs`, `vds` (actual, not normalized).
    pub fn evaluate(&self, vgs: f64, vds: f64) -> MosOperatingPoint {
        let sign = self.params.mos_type.sign();
        let (vgs_n, vds_n) = (sign * vgs, sign * vds);

        let mut op = if vds_n >= 0.0 {
            self.forward(vgs_n, vds_n)
        } else {
            // Source and drain exchange roles: Ids = -f(Vgd, -Vds)
            let rev = self.forward(vgs_n - vds_n, -vds_n);
            MosOperatingPoint {
                ids: -rev.ids,
                gm: -rev.gm,
                gds: rev.gm + rev.gds,
                region: rev.region,
            }
        };

        // Derivatives are invariant under the polarity flip; the current is not
        op.ids *= sign;
        op
    }

    pub fn stamp(&self, ctx: &StampContext, unknowns: &[f64], mna: &mut MnaMatrix) {
        let n_d = self.drain().index();
        let n_g = self.gate().index();
        let n_s = self.source().index();

        let v_s = voltage(unknowns, n_s);
        let vgs = voltage(unknowns, n_g) - v_s;
        let vds = voltage(unknowns, n_d) - v_s;

        let op = self.evaluate(vgs, vds);
        let gds = op.gds.max(ctx.gmin);
        let i_eq = op.ids - op.gm * vgs - gds * vds;

        mna.stamp_conductance(n_d, n_s, gds);
        mna.stamp_vccs(n_d, n_s, n_g, n_s, op.gm);
        mna.stamp_current_source(n_d, n_s, i_eq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn nmos() -> Mosfet {
        let params = MosfetParams {
            kp: 1e-4,
            lambda: 0.02,
            ..MosfetParams::nmos()
        };
        Mosfet::new(
            DeviceId(0),
            "M1".to_string(),
            [NodeId(1), NodeId(2), NodeId(0)],
            None,
            params,
        )
    }

    #[test]
    fn test_regions() {
        let m = nmos();
        assert_eq!(m.evaluate(0.5, 1.0).region, MosRegion::Cutoff);
        assert_eq!(m.evaluate(1.5, 0.2).region, MosRegion::Triode);
        assert_eq!(m.evaluate(1.5, 2.0).region, MosRegion::Saturation);
        assert_eq!(m.evaluate(0.5, 1.0).ids, 0.0);
    }

    #[test]
    fn test_saturation_current() {
        let m = nmos();
        let op = m.evaluate(1.7, 2.0);
        // β/2 · 1² · (1 + 0.04)
        assert_relative_eq!(op.ids, 0.5e-4 * 1.04, max_relative = 1e-12);
    }

    #[test]
    fn test_continuous_at_pinchoff() {
        let m = nmos();
        let vov = 0.8;
        let below = m.evaluate(0.7 + vov, vov - 1e-9).ids;
        let above = m.evaluate(0.7 + vov, vov + 1e-9).ids;
        assert_relative_eq!(below, above, max_relative = 1e-6);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let m = nmos();
        let h = 1e-7;
        for &(vgs, vds) in &[(1.5, 0.3), (1.5, 2.0), (1.2, -0.4), (1.0, -2.0)] {
            let op = m.evaluate(vgs, vds);
            let gm_fd = (m.evaluate(vgs + h, vds).ids - m.evaluate(vgs - h, vds).ids) / (2.0 * h);
            let gds_fd = (m.evaluate(vgs, vds + h).ids - m.evaluate(vgs, vds - h).ids) / (2.0 * h);
            assert_relative_eq!(op.gm, gm_fd, max_relative = 1e-4, epsilon = 1e-12);
            assert_relative_eq!(op.gds, gds_fd, max_relative = 1e-4, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pmos_mirrors_nmos() {
        let n = nmos();
        let p = Mosfet {
            params: MosfetParams {
                mos_type: MosType::Pmos,
                ..n.params.clone()
            },
            ..n.clone()
        };
        let on = n.evaluate(1.5, 1.0);
        let op = p.evaluate(-1.5, -1.0);
        assert_relative_eq!(op.ids, -on.ids);
        assert_relative_eq!(op.gm, on.gm);
        assert_relative_eq!(op.gds, on.gds);
    }

    #[test]
    fn test_from_model_rejects_diode_model() {
        let model = ModelDef::new("d", ModelKind::Diode);
        let err = MosfetParams::from_model(&model, &DeviceDef::mosfet("M1", "d", "g", "0")).unwrap_err();
        assert!(matches!(err, SimError::InvalidDevice { .. }));
    }

    #[test]
    fn test_from_model_pmos_vto_sign() {
        let model = ModelDef::new("p", ModelKind::Pmos).with_param("VTO", -0.45);
        let instance = DeviceDef::mosfet("M2", "d", "g", "vdd").with_param("W", 4e-6);
        let params = MosfetParams::from_model(&model, &instance).unwrap();
        assert_eq!(params.mos_type, MosType::Pmos);
        assert_relative_eq!(params.vto, 0.45);
        assert_relative_eq!(params.beta(), 2e-5 * 4.0);
    }

    #[test]
    fn test_depletion_nmos_conducts_at_zero_vgs() {
        let model = ModelDef::new("dep", ModelKind::Nmos).with_param("vto", -1.0);
        let params = MosfetParams::from_model(&model, &DeviceDef::mosfet("M1", "d", "g", "0")).unwrap();
        assert_relative_eq!(params.vto, -1.0);

        let m = Mosfet { params, ..nmos() };
        let op = m.evaluate(0.0, 2.0);
        assert_eq!(op.region, MosRegion::Saturation);
        // β/2 · 1² with β = 2e-5
        assert_relative_eq!(op.ids, 1e-5, max_relative = 1e-12);
    }

    #[test]
    fn test_instance_geometry_ignores_case() {
        let instance = DeviceDef::mosfet("M1", "d", "g", "0")
            .with_param("W", 10e-6)
            .with_param("L", 2e-6);
        let params = MosfetParams::from_instance(&instance).unwrap();
        assert_relative_eq!(params.w, 10e-6);
        assert_relative_eq!(params.l, 2e-6);

        let model = ModelDef::new("n", ModelKind::Nmos);
        let params = MosfetParams::from_model(&model, &instance).unwrap();
        assert_relative_eq!(params.beta(), 2e-5 * 5.0);

        let bad = DeviceDef::mosfet("M1", "d", "g", "0").with_param("L", 0.0);
        assert!(MosfetParams::from_instance(&bad).is_err());
    }
}
