//! Linear passive devices: Resistor, Capacitor, Inductor.

use crate::circuit::{BranchId, DeviceId, NodeId};
use crate::solver::MnaMatrix;

use super::{StampContext, StampMode};

/// A resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(id: DeviceId, name: String, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            resistance,
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    pub fn stamp(&self, mna: &mut MnaMatrix) {
        mna.stamp_conductance(self.nodes[0].index(), self.nodes[1].index(), self.conductance());
    }
}

/// A capacitor.
///
/// Open circuit at DC. During transient analysis it is replaced by the
/// backward-Euler companion model:
///   i(n) = (C/h) * v(n) - (C/h) * v(n-1)
///
/// i.e. a conductance G_eq = C/h in parallel with a current source
/// I_eq = G_eq * v(n-1) driven into the positive node.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(id: DeviceId, name: String, nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            capacitance,
        }
    }

    /// Companion conductance for timestep `h`.
    pub fn conductance(&self, h: f64) -> f64 {
        self.capacitance / h
    }

    /// Companion history current for timestep `h`, given the previous voltage.
    pub fn history_current(&self, h: f64, v_prev: f64) -> f64 {
        self.conductance(h) * v_prev
    }

    pub fn stamp(&self, ctx: &StampContext, mna: &mut MnaMatrix) {
        let StampMode::Transient { step, .. } = ctx.mode else {
            return;
        };
        let n1 = self.nodes[0].index();
        let n2 = self.nodes[1].index();
        let v_prev = ctx.history(self.id);

        mna.stamp_conductance(n1, n2, self.conductance(step));
        // History current flows into n+
        mna.stamp_current_source(n2, n1, self.history_current(step, v_prev));
    }
}

/// An inductor.
///
/// Short circuit at DC (a 0 V branch constraint). During transient analysis
/// it becomes a resistance R_eq = L/h in series with a history voltage
/// source, from backward Euler:
///   v(n) = (L/h) * i(n) - (L/h) * i(n-1)
///
/// The branch current is an extra MNA unknown in both modes.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub branch: BranchId,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(
        id: DeviceId,
        name: String,
        nodes: [NodeId; 2],
        inductance: f64,
        branch: BranchId,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            inductance,
            branch,
        }
    }

    /// Companion series resistance for timestep `h`.
    pub fn resistance(&self, h: f64) -> f64 {
        self.inductance / h
    }

    /// Companion history voltage for timestep `h`, given the previous current.
    pub fn history_voltage(&self, h: f64, i_prev: f64) -> f64 {
        -self.resistance(h) * i_prev
    }

    pub fn stamp(&self, ctx: &StampContext, mna: &mut MnaMatrix) {
        let n1 = self.nodes[0].index();
        let n2 = self.nodes[1].index();
        let br = ctx.branch_row(self.branch);

        match ctx.mode {
            StampMode::Dc => mna.stamp_voltage_source(n1, n2, br, 0.0),
            StampMode::Transient { step, .. } => {
                let i_prev = ctx.history(self.id);
                mna.stamp_voltage_source(n1, n2, br, self.history_voltage(step, i_prev));
                mna.add(br, br, -self.resistance(step));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_resistor_stamp() {
        let r = Resistor::new(DeviceId(0), "R1".to_string(), [NodeId(1), NodeId(2)], 1000.0);
        let mut mna = MnaMatrix::new(2);
        r.stamp(&mut mna);
        assert_abs_diff_eq!(mna.get(0, 0), 1e-3);
        assert_abs_diff_eq!(mna.get(1, 1), 1e-3);
        assert_abs_diff_eq!(mna.get(0, 1), -1e-3);
        assert_abs_diff_eq!(mna.get(1, 0), -1e-3);
    }

    #[test]
    fn test_capacitor_open_at_dc() {
        let c = Capacitor::new(DeviceId(0), "C1".to_string(), [NodeId(1), NodeId(0)], 1e-6);
        let mut mna = MnaMatrix::new(1);
        c.stamp(&StampContext::dc(1), &mut mna);
        assert_eq!(mna.get(0, 0), 0.0);
        assert_eq!(mna.z[0], 0.0);
    }

    #[test]
    fn test_capacitor_companion_model() {
        let c = Capacitor::new(DeviceId(0), "C1".to_string(), [NodeId(1), NodeId(0)], 1e-6);
        let history = [0.5];
        let ctx = StampContext::transient(1, 1e-6, 1e-6, &history);
        let mut mna = MnaMatrix::new(1);
        c.stamp(&ctx, &mut mna);

        // G_eq = C/h = 1 S, I_eq = G_eq * 0.5 V into node 1
        assert_abs_diff_eq!(mna.get(0, 0), 1.0);
        assert_abs_diff_eq!(mna.z[0], 0.5);
    }

    #[test]
    fn test_inductor_short_at_dc() {
        let l = Inductor::new(
            DeviceId(0),
            "L1".to_string(),
            [NodeId(1), NodeId(0)],
            1e-3,
            BranchId(0),
        );
        let mut mna = MnaMatrix::new(2);
        l.stamp(&StampContext::dc(1), &mut mna);
        assert_eq!(mna.get(1, 0), 1.0);
        assert_eq!(mna.get(0, 1), 1.0);
        assert_eq!(mna.get(1, 1), 0.0);
        assert_eq!(mna.z[1], 0.0);
    }

    #[test]
    fn test_inductor_companion_model() {
        let l = Inductor::new(
            DeviceId(0),
            "L1".to_string(),
            [NodeId(1), NodeId(0)],
            1e-3,
            BranchId(0),
        );
        let history = [2e-3];
        let ctx = StampContext::transient(1, 1e-6, 1e-6, &history);
        let mut mna = MnaMatrix::new(2);
        l.stamp(&ctx, &mut mna);

        // R_eq = L/h = 1000 ohm, V_eq = -R_eq * i_prev = -2 V
        assert_abs_diff_eq!(mna.get(1, 1), -1000.0);
        assert_abs_diff_eq!(mna.z[1], -2.0);
    }
}
