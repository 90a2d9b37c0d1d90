//! Device models and their MNA stamps.
//!
//! Supported devices:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source (DC or time-varying)
//! - Nonlinear: Diode, MOSFET (level 1)
//!
//! Every device implements the same contract, [`Device::stamp`]: given the
//! current unknown vector and a [`StampContext`], add its contribution to the
//! system matrix and right-hand side in place. Nonlinear devices stamp their
//! Newton linearization at the current guess; reactive devices stamp their
//! backward-Euler companion model in transient mode.

mod diode;
mod linear;
mod mosfet;
mod sources;
mod waveform;

pub use diode::{Diode, DiodeParams};
pub use linear::{Capacitor, Inductor, Resistor};
pub use mosfet::{MosOperatingPoint, MosRegion, MosType, Mosfet, MosfetParams};
pub use sources::{CurrentSource, VoltageSource};
pub use waveform::{Pulse, Pwl, Sine, Waveform};

use crate::circuit::{BranchId, DeviceId, NodeId};
use crate::error::{Result, SimError};
use crate::netlist::{DeviceDef, DeviceKind, ModelDef, ModelKind};
use crate::solver::MnaMatrix;

/// How reactive devices and sources are treated while stamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StampMode {
    /// Operating point: capacitors open, inductors shorted, sources at t = 0.
    Dc,
    /// One backward-Euler step ending at `time`, of length `step`.
    Transient { time: f64, step: f64 },
}

/// Everything a stamp may read besides the unknown vector.
#[derive(Debug, Clone, Copy)]
pub struct StampContext<'a> {
    pub mode: StampMode,
    /// Number of non-ground nodes; branch rows start here.
    pub node_count: usize,
    /// Reactive history indexed by [`DeviceId`]: capacitor voltage or
    /// inductor current at the previous accepted timepoint.
    pub history: &'a [f64],
    /// Replacement value for one independent source (DC sweep).
    pub source_override: Option<(DeviceId, f64)>,
    /// Minimum junction conductance.
    pub gmin: f64,
}

impl<'a> StampContext<'a> {
    /// Context for an operating-point solve.
    pub fn dc(node_count: usize) -> Self {
        Self {
            mode: StampMode::Dc,
            node_count,
            history: &[],
            source_override: None,
            gmin: crate::solver::MIN_CONDUCTANCE,
        }
    }

    /// Context for one transient step ending at `time`.
    pub fn transient(node_count: usize, time: f64, step: f64, history: &'a [f64]) -> Self {
        Self {
            mode: StampMode::Transient { time, step },
            history,
            ..Self::dc(node_count)
        }
    }

    /// Force the value of one independent source.
    pub fn with_override(mut self, device: DeviceId, value: f64) -> Self {
        self.source_override = Some((device, value));
        self
    }

    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    /// Time at which sources are evaluated.
    pub fn time(&self) -> f64 {
        match self.mode {
            StampMode::Dc => 0.0,
            StampMode::Transient { time, .. } => time,
        }
    }

    /// MNA row of a branch-current unknown.
    pub fn branch_row(&self, branch: BranchId) -> usize {
        self.node_count + branch.0
    }

    pub fn history(&self, device: DeviceId) -> f64 {
        self.history.get(device.0).copied().unwrap_or(0.0)
    }

    pub fn source_override(&self, device: DeviceId) -> Option<f64> {
        match self.source_override {
            Some((id, value)) if id == device => Some(value),
            _ => None,
        }
    }
}

/// A circuit device.
#[derive(Debug, Clone)]
pub enum Device {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    Mosfet(Mosfet),
}

impl Device {
    /// Create a device from a netlist definition with resolved nodes.
    pub fn from_def(
        id: DeviceId,
        def: &DeviceDef,
        nodes: &[NodeId],
        model: Option<&ModelDef>,
        branch_counter: &mut usize,
    ) -> Result<Self> {
        let (min, max) = def.kind.terminal_count();
        if nodes.len() < min || nodes.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min}-{max}")
            };
            return Err(SimError::invalid_device(
                &def.name,
                format!("expected {} nodes, got {}", expected, nodes.len()),
            ));
        }
        if def.waveform.is_some()
            && !matches!(def.kind, DeviceKind::VoltageSource | DeviceKind::CurrentSource)
        {
            return Err(SimError::invalid_device(&def.name, "only sources accept a waveform"));
        }
        if let Some(waveform) = &def.waveform {
            waveform
                .validate()
                .map_err(|(param, message)| SimError::invalid_parameter(&def.name, param, message))?;
        }
        let name = def.name.clone();

        match def.kind {
            DeviceKind::Resistor => {
                let value = def
                    .value
                    .ok_or_else(|| SimError::missing_value(&def.name, "resistance"))?;
                if !(value > 0.0) || !value.is_finite() {
                    return Err(SimError::invalid_parameter(&def.name, "value", "resistance must be positive"));
                }
                Ok(Device::Resistor(Resistor::new(id, name, [nodes[0], nodes[1]], value)))
            }

            DeviceKind::Capacitor => {
                let value = def
                    .value
                    .ok_or_else(|| SimError::missing_value(&def.name, "capacitance"))?;
                if !(value >= 0.0) || !value.is_finite() {
                    return Err(SimError::invalid_parameter(&def.name, "value", "capacitance must be non-negative"));
                }
                Ok(Device::Capacitor(Capacitor::new(id, name, [nodes[0], nodes[1]], value)))
            }

            DeviceKind::Inductor => {
                let value = def
                    .value
                    .ok_or_else(|| SimError::missing_value(&def.name, "inductance"))?;
                if !(value > 0.0) || !value.is_finite() {
                    return Err(SimError::invalid_parameter(&def.name, "value", "inductance must be positive"));
                }
                let branch = next_branch(branch_counter);
                Ok(Device::Inductor(Inductor::new(id, name, [nodes[0], nodes[1]], value, branch)))
            }

            DeviceKind::VoltageSource => {
                let value = source_value(def)?;
                let branch = next_branch(branch_counter);
                Ok(Device::VoltageSource(
                    VoltageSource::new(id, name, [nodes[0], nodes[1]], value, branch)
                        .with_waveform(def.waveform.clone()),
                ))
            }

            DeviceKind::CurrentSource => {
                let value = source_value(def)?;
                Ok(Device::CurrentSource(
                    CurrentSource::new(id, name, [nodes[0], nodes[1]], value)
                        .with_waveform(def.waveform.clone()),
                ))
            }

            DeviceKind::Diode => {
                let area = def.param("area").unwrap_or(1.0);
                if !(area > 0.0) {
                    return Err(SimError::invalid_parameter(&def.name, "area", "must be positive"));
                }
                let params = match model {
                    Some(m) if m.kind == ModelKind::Diode => DiodeParams::from_model(m, &def.name, area)?,
                    Some(m) => {
                        return Err(SimError::invalid_device(
                            &def.name,
                            format!("model '{}' is not a diode model", m.name),
                        ));
                    }
                    None => DiodeParams {
                        is: DiodeParams::default().is * area,
                        ..DiodeParams::default()
                    },
                };
                Ok(Device::Diode(Diode::new(id, name, [nodes[0], nodes[1]], params)))
            }

            DeviceKind::Mosfet => {
                let params = match model {
                    Some(m) => MosfetParams::from_model(m, def)?,
                    None => MosfetParams::from_instance(def)?,
                };
                Ok(Device::Mosfet(Mosfet::new(
                    id,
                    name,
                    [nodes[0], nodes[1], nodes[2]], // D, G, S
                    nodes.get(3).copied(),
                    params,
                )))
            }
        }
    }

    /// Get the device ID.
    pub fn id(&self) -> DeviceId {
        match self {
            Device::Resistor(r) => r.id,
            Device::Capacitor(c) => c.id,
            Device::Inductor(l) => l.id,
            Device::VoltageSource(v) => v.id,
            Device::CurrentSource(i) => i.id,
            Device::Diode(d) => d.id,
            Device::Mosfet(m) => m.id,
        }
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        match self {
            Device::Resistor(r) => &r.name,
            Device::Capacitor(c) => &c.name,
            Device::Inductor(l) => &l.name,
            Device::VoltageSource(v) => &v.name,
            Device::CurrentSource(i) => &i.name,
            Device::Diode(d) => &d.name,
            Device::Mosfet(m) => &m.name,
        }
    }

    /// Terminal nodes in device order (MOSFET bulk last, if present).
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            Device::Resistor(r) => r.nodes.to_vec(),
            Device::Capacitor(c) => c.nodes.to_vec(),
            Device::Inductor(l) => l.nodes.to_vec(),
            Device::VoltageSource(v) => v.nodes.to_vec(),
            Device::CurrentSource(i) => i.nodes.to_vec(),
            Device::Diode(d) => d.nodes.to_vec(),
            Device::Mosfet(m) => m.nodes.iter().copied().chain(m.bulk).collect(),
        }
    }

    /// Branch-current unknown owned by this device, if any.
    pub fn branch(&self) -> Option<BranchId> {
        match self {
            Device::VoltageSource(v) => Some(v.branch),
            Device::Inductor(l) => Some(l.branch),
            _ => None,
        }
    }

    /// Check if this device is nonlinear (requires Newton-Raphson iteration).
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Device::Diode(_) | Device::Mosfet(_))
    }

    /// True for independent sources (the only devices a DC sweep may drive).
    pub fn is_independent_source(&self) -> bool {
        matches!(self, Device::VoltageSource(_) | Device::CurrentSource(_))
    }

    /// Add this device's contribution at `unknowns` to the MNA system.
    pub fn stamp(&self, ctx: &StampContext, unknowns: &[f64], mna: &mut MnaMatrix) {
        match self {
            Device::Resistor(r) => r.stamp(mna),
            Device::Capacitor(c) => c.stamp(ctx, mna),
            Device::Inductor(l) => l.stamp(ctx, mna),
            Device::VoltageSource(v) => v.stamp(ctx, mna),
            Device::CurrentSource(i) => i.stamp(ctx, mna),
            Device::Diode(d) => d.stamp(ctx, unknowns, mna),
            Device::Mosfet(m) => m.stamp(ctx, unknowns, mna),
        }
    }
}

fn next_branch(counter: &mut usize) -> BranchId {
    let branch = BranchId(*counter);
    *counter += 1;
    branch
}

/// DC value of a source; a waveform-only source defaults its DC value to the
/// waveform at t = 0.
fn source_value(def: &DeviceDef) -> Result<f64> {
    match (def.value, &def.waveform) {
        (Some(v), _) if v.is_finite() => Ok(v),
        (Some(_), _) => Err(SimError::invalid_parameter(&def.name, "value", "must be finite")),
        (None, Some(w)) => Ok(w.value_at(0.0)),
        (None, None) => Err(SimError::missing_value(&def.name, "source value or waveform")),
    }
}
