//! Index types for nodes, devices and branch unknowns.

use std::fmt;

/// A node in the circuit. Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }

    /// Row/column of this node's voltage in the MNA system, `None` for ground.
    pub fn index(&self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some(self.0 - 1)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// Position of a device in the circuit's device list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// Index of an extra branch-current unknown (voltage sources, inductors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Variable in the MNA solution vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarIndex {
    /// Node voltage variable
    Voltage(NodeId),
    /// Branch current variable
    Current(BranchId),
}

impl VarIndex {
    /// Raw index into the solution vector.
    /// Node voltages come first (excluding ground), then branch currents.
    pub fn to_index(&self, node_count: usize) -> usize {
        match self {
            VarIndex::Voltage(NodeId(n)) => {
                debug_assert!(*n > 0, "Ground node should not be in solution vector");
                n - 1
            }
            VarIndex::Current(BranchId(b)) => node_count + b,
        }
    }
}
