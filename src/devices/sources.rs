//! Independent voltage and current sources.

use crate::circuit::{BranchId, DeviceId, NodeId};
use crate::solver::MnaMatrix;

use super::{StampContext, Waveform};

/// An independent voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = value
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub dc_value: f64,
    pub waveform: Option<Waveform>,
    pub branch: BranchId,
}

impl VoltageSource {
    /// Create a new DC voltage source.
    pub fn new(id: DeviceId, name: String, nodes: [NodeId; 2], dc_value: f64, branch: BranchId) -> Self {
        Self {
            id,
            name,
            nodes,
            dc_value,
            waveform: None,
            branch,
        }
    }

    /// Attach a time-varying waveform.
    pub fn with_waveform(mut self, waveform: Option<Waveform>) -> Self {
        self.waveform = waveform;
        self
    }

    /// Source voltage at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match &self.waveform {
            Some(w) => w.value_at(t),
            None => self.dc_value,
        }
    }

    pub fn stamp(&self, ctx: &StampContext, mna: &mut MnaMatrix) {
        let value = ctx
            .source_override(self.id)
            .unwrap_or_else(|| self.value_at(ctx.time()));
        mna.stamp_voltage_source(
            self.nodes[0].index(),
            self.nodes[1].index(),
            ctx.branch_row(self.branch),
            value,
        );
    }
}

/// An independent current source.
///
/// Current flows from n+ through the source to n-, so the source draws
/// current out of n+ and pushes it into n-.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub id: DeviceId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub dc_value: f64,
    pub waveform: Option<Waveform>,
}

impl CurrentSource {
    /// Create a new DC current source.
    pub fn new(id: DeviceId, name: String, nodes: [NodeId; 2], dc_value: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            dc_value,
            waveform: None,
        }
    }

    /// Attach a time-varying waveform.
    pub fn with_waveform(mut self, waveform: Option<Waveform>) -> Self {
        self.waveform = waveform;
        self
    }

    /// Source current at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match &self.waveform {
            Some(w) => w.value_at(t),
            None => self.dc_value,
        }
    }

    pub fn stamp(&self, ctx: &StampContext, mna: &mut MnaMatrix) {
        let value = ctx
            .source_override(self.id)
            .unwrap_or_else(|| self.value_at(ctx.time()));
        mna.stamp_current_source(self.nodes[0].index(), self.nodes[1].index(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Pulse, Waveform};

    #[test]
    fn test_voltage_source_stamp() {
        let v = VoltageSource::new(DeviceId(0), "V1".to_string(), [NodeId(1), NodeId(0)], 1.8, BranchId(0));
        let mut mna = MnaMatrix::new(2);
        v.stamp(&StampContext::dc(1), &mut mna);
        assert_eq!(mna.get(0, 1), 1.0);
        assert_eq!(mna.get(1, 0), 1.0);
        assert_eq!(mna.z[1], 1.8);
    }

    #[test]
    fn test_override_replaces_value() {
        let v = VoltageSource::new(DeviceId(3), "V1".to_string(), [NodeId(1), NodeId(0)], 1.8, BranchId(0));
        let ctx = StampContext::dc(1).with_override(DeviceId(3), 0.4);
        let mut mna = MnaMatrix::new(2);
        v.stamp(&ctx, &mut mna);
        assert_eq!(mna.z[1], 0.4);
    }

    #[test]
    fn test_waveform_evaluated_at_stamp_time() {
        let pulse = Waveform::Pulse(Pulse {
            v1: 0.0,
            v2: 5.0,
            delay: 1e-6,
            rise: 0.0,
            fall: 0.0,
            width: 1e-6,
            period: 0.0,
        });
        let v = VoltageSource::new(DeviceId(0), "V1".to_string(), [NodeId(1), NodeId(0)], 0.0, BranchId(0))
            .with_waveform(Some(pulse));
        assert_eq!(v.value_at(0.0), 0.0);

        let history = [0.0];
        let ctx = StampContext::transient(1, 1.5e-6, 1e-7, &history);
        let mut mna = MnaMatrix::new(2);
        v.stamp(&ctx, &mut mna);
        assert_eq!(mna.z[1], 5.0);
    }

    #[test]
    fn test_current_source_direction() {
        let i = CurrentSource::new(DeviceId(0), "I1".to_string(), [NodeId(1), NodeId(2)], 1e-3);
        let mut mna = MnaMatrix::new(2);
        i.stamp(&StampContext::dc(2), &mut mna);
        assert_eq!(mna.z[0], -1e-3);
        assert_eq!(mna.z[1], 1e-3);
    }
}
