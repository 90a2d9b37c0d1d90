//! Parsed-netlist boundary types.
//!
//! A [`ParsedNetlist`] is what an external netlist parser hands to the
//! simulation core: a flat device list, the models those devices reference,
//! and the analysis/option directives found in the source text. Only node
//! names and numeric values are carried; [`Circuit::from_netlist`] resolves
//! and validates everything.
//!
//! The types derive `serde` so a netlist can arrive as JSON:
//!
//! ```json
//! {
//!   "devices": [
//!     { "kind": "voltage_source", "name": "V1", "nodes": ["in", "0"], "value": 1.8 },
//!     { "kind": "resistor", "name": "R1", "nodes": ["in", "out"], "value": 1000 },
//!     { "kind": "resistor", "name": "R2", "nodes": ["out", "0"], "value": 1000 }
//!   ],
//!   "directives": [{ "type": "op" }]
//! }
//! ```
//!
//! [`Circuit::from_netlist`]: crate::circuit::Circuit::from_netlist

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisConfig, DcSweepConfig, TranConfig};
use crate::devices::Waveform;

/// Complete parsed netlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedNetlist {
    /// Device instances, in source order
    #[serde(default)]
    pub devices: Vec<DeviceDef>,
    /// Model definitions referenced by diodes and MOSFETs
    #[serde(default)]
    pub models: Vec<ModelDef>,
    /// Analysis and option directives, in source order
    #[serde(default)]
    pub directives: Vec<Directive>,
}

impl ParsedNetlist {
    /// Create a new empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a device (builder style, mostly for tests and programmatic use).
    pub fn with_device(mut self, device: DeviceDef) -> Self {
        self.devices.push(device);
        self
    }

    /// Append a model definition.
    pub fn with_model(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }

    /// Append a directive.
    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// The first analysis directive, if any.
    pub fn analysis(&self) -> Option<AnalysisConfig> {
        self.directives.iter().find_map(|d| match d {
            Directive::Op => Some(AnalysisConfig::Op),
            Directive::Tran(t) => Some(AnalysisConfig::Tran(t.clone())),
            Directive::Dc(d) => Some(AnalysisConfig::DcSweep(d.clone())),
            Directive::Options(_) => None,
        })
    }

    /// All `.options` parameters merged in source order (later wins).
    pub fn options(&self) -> BTreeMap<String, f64> {
        let mut merged = BTreeMap::new();
        for directive in &self.directives {
            if let Directive::Options(params) = directive {
                merged.extend(params.iter().map(|(k, v)| (k.to_lowercase(), *v)));
            }
        }
        merged
    }
}

/// Device kinds understood by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    Diode,
    Mosfet,
}

impl DeviceKind {
    /// Accepted terminal counts (min, max).
    pub fn terminal_count(&self) -> (usize, usize) {
        match self {
            DeviceKind::Mosfet => (3, 4), // D G S [B]
            _ => (2, 2),
        }
    }
}

/// A device instance from the netlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDef {
    pub kind: DeviceKind,
    /// Unique instance name (`R1`, `M3`, ...)
    pub name: String,
    /// Connected node names, in the device's terminal order
    pub nodes: Vec<String>,
    /// Primary value (resistance, capacitance, inductance, DC source value)
    #[serde(default)]
    pub value: Option<f64>,
    /// Reference to a model definition
    #[serde(default)]
    pub model: Option<String>,
    /// Instance parameters (`w`, `l`, ...)
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Time-varying source waveform
    #[serde(default)]
    pub waveform: Option<Waveform>,
}

impl DeviceDef {
    /// Create a device definition with a primary value.
    pub fn new(kind: DeviceKind, name: impl Into<String>, nodes: &[&str], value: Option<f64>) -> Self {
        Self {
            kind,
            name: name.into(),
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            value,
            model: None,
            params: BTreeMap::new(),
            waveform: None,
        }
    }

    pub fn resistor(name: impl Into<String>, n1: &str, n2: &str, ohms: f64) -> Self {
        Self::new(DeviceKind::Resistor, name, &[n1, n2], Some(ohms))
    }

    pub fn capacitor(name: impl Into<String>, n1: &str, n2: &str, farads: f64) -> Self {
        Self::new(DeviceKind::Capacitor, name, &[n1, n2], Some(farads))
    }

    pub fn inductor(name: impl Into<String>, n1: &str, n2: &str, henries: f64) -> Self {
        Self::new(DeviceKind::Inductor, name, &[n1, n2], Some(henries))
    }

    pub fn voltage_source(name: impl Into<String>, pos: &str, neg: &str, volts: f64) -> Self {
        Self::new(DeviceKind::VoltageSource, name, &[pos, neg], Some(volts))
    }

    pub fn current_source(name: impl Into<String>, pos: &str, neg: &str, amps: f64) -> Self {
        Self::new(DeviceKind::CurrentSource, name, &[pos, neg], Some(amps))
    }

    pub fn diode(name: impl Into<String>, anode: &str, cathode: &str) -> Self {
        Self::new(DeviceKind::Diode, name, &[anode, cathode], None)
    }

    pub fn mosfet(name: impl Into<String>, drain: &str, gate: &str, source: &str) -> Self {
        Self::new(DeviceKind::Mosfet, name, &[drain, gate, source], None)
    }

    /// Attach a model reference.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set an instance parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Case-insensitive instance parameter lookup (`W`, `l`, `Area`, ...).
    pub fn param(&self, key: &str) -> Option<f64> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
    }

    /// Attach a source waveform.
    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = Some(waveform);
        self
    }
}

/// Model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Diode,
    Nmos,
    Pmos,
}

/// A `.model` definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub kind: ModelKind,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Case-insensitive parameter lookup.
    pub fn param(&self, key: &str) -> Option<f64> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
    }
}

/// Netlist directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    /// `.op`
    Op,
    /// `.tran step stop [start]`
    Tran(TranConfig),
    /// `.dc source start stop step`
    Dc(DcSweepConfig),
    /// `.options key=value ...`
    Options(BTreeMap<String, f64>),
}
