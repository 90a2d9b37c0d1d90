//! Circuit validation.

use tracing::warn;

use crate::error::{Result, SimError};

use super::{Circuit, NodeId};

/// Validate a circuit after construction.
///
/// Checks:
/// - Every device terminal refers to a node of this circuit
/// - Branch IDs are dense and unique
///
/// Nodes touched by a single terminal are legal but almost always a netlist
/// mistake; they are logged, and a floating one surfaces later as a singular
/// system.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    let mut terminal_counts = vec![0usize; circuit.node_count() + 1];

    for device in circuit.devices() {
        for node in device.nodes() {
            if !circuit.has_node(node) {
                return Err(SimError::NodeNotFound {
                    node: node.to_string(),
                });
            }
            terminal_counts[node.0] += 1;
        }
    }

    let mut seen = vec![false; circuit.branch_count()];
    for device in circuit.devices() {
        if let Some(branch) = device.branch() {
            match seen.get_mut(branch.0) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(SimError::invalid_device(
                        device.name(),
                        format!("branch {branch} is out of range or shared"),
                    ));
                }
            }
        }
    }

    for (id, &count) in terminal_counts.iter().enumerate().skip(1) {
        if count == 1 {
            warn!(node = circuit.node_name(NodeId(id)), "node has only one connection");
        }
    }

    Ok(())
}
