//! Circuit graph structure.

use std::collections::HashMap;

use tracing::debug;

use super::types::{DeviceId, NodeId, VarIndex};
use super::validate::validate_circuit;
use crate::devices::Device;
use crate::error::{Result, SimError};
use crate::netlist::{ModelDef, ParsedNetlist};

/// Node names that refer to the reference node.
pub const GROUND_ALIASES: [&str; 3] = ["0", "gnd", "GND"];

/// A complete circuit ready for simulation.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// All devices, indexed by [`DeviceId`]
    devices: Vec<Device>,

    /// Mapping from node names to node IDs
    node_map: HashMap<String, NodeId>,

    /// Reverse mapping from node IDs to names
    node_names: Vec<String>,

    /// Lower-cased device name to ID
    device_map: HashMap<String, DeviceId>,

    /// Number of branch current variables (voltage sources, inductors)
    num_branches: usize,
}

impl Circuit {
    /// Build a circuit from a parsed netlist.
    ///
    /// Node IDs are assigned in first-seen order with ground fixed at 0;
    /// branch unknowns are assigned to voltage sources and inductors in
    /// device order.
    pub fn from_netlist(netlist: &ParsedNetlist) -> Result<Self> {
        let mut node_map = HashMap::new();
        let mut node_names = Vec::new();

        // Ground is always node 0
        for alias in GROUND_ALIASES {
            node_map.insert(alias.to_string(), NodeId::GROUND);
        }
        node_names.push("0".to_string());

        let mut next_id = 1usize;
        for def in &netlist.devices {
            for node_name in &def.nodes {
                if !node_map.contains_key(node_name) {
                    node_map.insert(node_name.clone(), NodeId(next_id));
                    node_names.push(node_name.clone());
                    next_id += 1;
                }
            }
        }

        let models: HashMap<String, &ModelDef> = netlist
            .models
            .iter()
            .map(|m| (m.name.to_lowercase(), m))
            .collect();

        let mut devices = Vec::with_capacity(netlist.devices.len());
        let mut device_map = HashMap::new();
        let mut num_branches = 0usize;

        for (idx, def) in netlist.devices.iter().enumerate() {
            let id = DeviceId(idx);
            if device_map.insert(def.name.to_lowercase(), id).is_some() {
                return Err(SimError::DuplicateDevice {
                    name: def.name.clone(),
                });
            }

            // Resolve node names to IDs
            let nodes: Vec<NodeId> = def
                .nodes
                .iter()
                .map(|name| {
                    node_map
                        .get(name)
                        .copied()
                        .ok_or_else(|| SimError::NodeNotFound { node: name.clone() })
                })
                .collect::<Result<Vec<_>>>()?;

            // Look up model if referenced
            let model = match &def.model {
                Some(name) => Some(*models.get(&name.to_lowercase()).ok_or_else(|| {
                    SimError::UndefinedModel {
                        model: name.clone(),
                        device: def.name.clone(),
                    }
                })?),
                None => None,
            };

            devices.push(Device::from_def(id, def, &nodes, model, &mut num_branches)?);
        }

        let circuit = Circuit {
            devices,
            node_map,
            node_names,
            device_map,
            num_branches,
        };
        validate_circuit(&circuit)?;

        debug!(
            nodes = circuit.node_count(),
            branches = circuit.num_branches,
            devices = circuit.devices.len(),
            "circuit built"
        );
        Ok(circuit)
    }

    /// Number of non-ground nodes.
    pub fn node_count(&self) -> usize {
        self.node_names.len() - 1
    }

    /// Number of branch-current unknowns.
    pub fn branch_count(&self) -> usize {
        self.num_branches
    }

    /// Get the total size of the MNA solution vector.
    pub fn unknown_count(&self) -> usize {
        self.node_count() + self.num_branches
    }

    /// All devices in netlist order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// True if any device needs Newton-Raphson iteration.
    pub fn is_nonlinear(&self) -> bool {
        self.devices.iter().any(Device::is_nonlinear)
    }

    /// Find a node ID by name. Ground aliases resolve to [`NodeId::GROUND`].
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Get the name of a node (`"0"` for ground).
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.node_names[node.0]
    }

    /// Find a device by name, ignoring case.
    pub fn find_device(&self, name: &str) -> Option<&Device> {
        self.device_map
            .get(&name.to_lowercase())
            .map(|id| &self.devices[id.0])
    }

    /// What the unknown at `index` of the solution vector represents.
    pub fn unknown_var(&self, index: usize) -> Option<VarIndex> {
        let node_count = self.node_count();
        if index < node_count {
            return Some(VarIndex::Voltage(NodeId(index + 1)));
        }
        self.devices
            .iter()
            .filter_map(Device::branch)
            .find(|b| VarIndex::Current(*b).to_index(node_count) == index)
            .map(VarIndex::Current)
    }

    /// Label of one unknown: `V(node)` or `I(device)`.
    pub fn unknown_label(&self, index: usize) -> String {
        match self.unknown_var(index) {
            Some(VarIndex::Voltage(node)) => format!("V({})", self.node_name(node)),
            Some(VarIndex::Current(branch)) => self
                .devices
                .iter()
                .find(|d| d.branch() == Some(branch))
                .map_or_else(|| format!("x{index}"), |d| format!("I({})", d.name())),
            None => format!("x{index}"),
        }
    }

    /// Labels of every unknown, in solution-vector order.
    pub fn unknown_labels(&self) -> Vec<String> {
        let node_count = self.node_count();
        let mut labels: Vec<String> = self.node_names[1..]
            .iter()
            .map(|name| format!("V({name})"))
            .collect();
        labels.resize(node_count + self.num_branches, String::new());
        for device in &self.devices {
            if let Some(branch) = device.branch() {
                labels[node_count + branch.0] = format!("I({})", device.name());
            }
        }
        labels
    }

    /// Internal consistency check used by validation: does `node` exist?
    pub(crate) fn has_node(&self, node: NodeId) -> bool {
        node.0 < self.node_names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::BranchId;
    use crate::netlist::{DeviceDef, ModelDef, ModelKind};

    fn divider() -> ParsedNetlist {
        ParsedNetlist::new()
            .with_device(DeviceDef::voltage_source("V1", "in", "0", 1.8))
            .with_device(DeviceDef::resistor("R1", "in", "out", 1000.0))
            .with_device(DeviceDef::resistor("R2", "out", "GND", 1000.0))
    }

    #[test]
    fn test_node_assignment_order() {
        let circuit = Circuit::from_netlist(&divider()).unwrap();
        assert_eq!(circuit.node_count(), 2);
        assert_eq!(circuit.unknown_count(), 3);
        assert_eq!(circuit.find_node("in"), Some(NodeId(1)));
        assert_eq!(circuit.find_node("out"), Some(NodeId(2)));
        assert_eq!(circuit.find_node("gnd"), Some(NodeId::GROUND));
        assert_eq!(circuit.node_name(NodeId(2)), "out");
        assert!(!circuit.is_nonlinear());
    }

    #[test]
    fn test_unknown_labels() {
        let netlist = divider().with_device(DeviceDef::inductor("L1", "out", "x", 1e-3));
        let circuit = Circuit::from_netlist(&netlist).unwrap();
        assert_eq!(
            circuit.unknown_labels(),
            vec!["V(in)", "V(out)", "V(x)", "I(V1)", "I(L1)"]
        );
        assert_eq!(circuit.unknown_label(4), "I(L1)");
        assert_eq!(circuit.unknown_label(2), "V(x)");
        assert_eq!(circuit.unknown_label(9), "x9");
        for (i, label) in circuit.unknown_labels().iter().enumerate() {
            assert_eq!(&circuit.unknown_label(i), label);
        }
        assert_eq!(circuit.unknown_var(4), Some(VarIndex::Current(BranchId(1))));
        assert_eq!(circuit.unknown_var(0), Some(VarIndex::Voltage(NodeId(1))));
    }

    #[test]
    fn test_duplicate_device_name() {
        let netlist = divider().with_device(DeviceDef::resistor("r1", "in", "0", 10.0));
        let err = Circuit::from_netlist(&netlist).unwrap_err();
        assert!(matches!(err, SimError::DuplicateDevice { ref name } if name == "r1"));
    }

    #[test]
    fn test_undefined_model() {
        let netlist = divider().with_device(DeviceDef::diode("D1", "out", "0").with_model("d1n4148"));
        let err = Circuit::from_netlist(&netlist).unwrap_err();
        assert!(matches!(err, SimError::UndefinedModel { .. }));
    }

    #[test]
    fn test_model_lookup_ignores_case() {
        let netlist = divider()
            .with_device(DeviceDef::diode("D1", "out", "0").with_model("DMOD"))
            .with_model(ModelDef::new("dmod", ModelKind::Diode).with_param("is", 1e-15));
        let circuit = Circuit::from_netlist(&netlist).unwrap();
        assert!(circuit.is_nonlinear());
        assert!(circuit.find_device("d1").is_some());
    }

    #[test]
    fn test_empty_netlist() {
        let circuit = Circuit::from_netlist(&ParsedNetlist::new()).unwrap();
        assert_eq!(circuit.node_count(), 0);
        assert_eq!(circuit.unknown_count(), 0);
        assert!(circuit.unknown_labels().is_empty());
    }

    #[test]
    fn test_circuit_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Circuit>();
    }
}
