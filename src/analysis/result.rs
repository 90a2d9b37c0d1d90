//! Simulation output shared by every analysis mode.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::error::SimError;

/// One named trace: `(x, value)` pairs where `x` is time or the swept value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub unit: String,
    pub data: Vec<(f64, f64)>,
}

impl Signal {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            data: Vec::new(),
        }
    }

    /// Append a point. Returns `false` (and drops the point) if `x` would
    /// decrease.
    pub fn push(&mut self, x: f64, value: f64) -> bool {
        match self.data.last() {
            Some(&(last, _)) if x < last => false,
            _ => {
                self.data.push((x, value));
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Most recent value.
    pub fn last_value(&self) -> Option<f64> {
        self.data.last().map(|&(_, v)| v)
    }

    /// Linear interpolation at `x`, clamped to the recorded range.
    pub fn value_at(&self, x: f64) -> Option<f64> {
        let first = self.data.first()?;
        if x <= first.0 {
            return Some(first.1);
        }
        let i = self.data.partition_point(|&(px, _)| px <= x);
        if i >= self.data.len() {
            return self.last_value();
        }
        let (x0, y0) = self.data[i - 1];
        let (x1, y1) = self.data[i];
        if x1 == x0 {
            return Some(y1);
        }
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

/// The set of signals produced by a sweep or transient run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub signals: Vec<Signal>,
}

impl SignalSet {
    /// One empty signal per unknown, labelled `V(node)` / `I(device)`.
    pub fn for_circuit(circuit: &Circuit) -> Self {
        let signals = circuit
            .unknown_labels()
            .into_iter()
            .map(|label| {
                let unit = if label.starts_with("I(") { "A" } else { "V" };
                Signal::new(label, unit)
            })
            .collect();
        Self { signals }
    }

    /// Append one solution vector at `x` to every signal.
    pub(crate) fn record(&mut self, x: f64, unknowns: &[f64]) {
        for (signal, &value) in self.signals.iter_mut().zip(unknowns) {
            signal.push(x, value);
        }
    }

    /// Look up a signal by label, e.g. `"V(out)"`.
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Number of points (all signals have the same length).
    pub fn point_count(&self) -> usize {
        self.signals.first().map_or(0, Signal::len)
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}

/// Category of a per-point numerical problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Newton-Raphson hit its iteration cap; best-effort values were kept
    NonConvergence,
    /// The linearized system was singular; the point was skipped
    Singular,
    /// The solve produced a non-finite value; the point was skipped
    NumericalOverflow,
}

/// A numerical problem at one operating point, sweep point or timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverIssue {
    pub kind: IssueKind,
    /// Time or swept value; `None` for an operating point
    pub at: Option<f64>,
    pub message: String,
}

impl SolverIssue {
    pub fn non_convergence(at: Option<f64>, iterations: usize) -> Self {
        Self {
            kind: IssueKind::NonConvergence,
            at,
            message: format!("no convergence after {iterations} iterations"),
        }
    }

    /// Convert a numerical solver error. Returns `None` for input errors,
    /// which must be propagated instead.
    pub fn from_error(err: &SimError, at: Option<f64>) -> Option<Self> {
        let kind = match err {
            SimError::SingularMatrix => IssueKind::Singular,
            SimError::NumericalOverflow { .. } => IssueKind::NumericalOverflow,
            _ => return None,
        };
        Some(Self {
            kind,
            at,
            message: err.to_string(),
        })
    }
}

/// Output of any analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Every Newton solve that contributed passed its convergence test
    pub converged: bool,
    /// Newton iterations summed over all solves
    pub iterations: usize,
    /// Operating point by label (OP, and the t = 0 point of a transient)
    pub op_point: Option<BTreeMap<String, f64>>,
    /// Sweep or transient signals; empty for OP
    pub waveform: SignalSet,
    /// Wall-clock time spent in the analysis
    pub elapsed: Duration,
    /// Per-point numerical problems, in the order they occurred
    pub issues: Vec<SolverIssue>,
    /// The run was stopped through its cancel token
    pub cancelled: bool,
}

impl SimulationResult {
    /// Operating-point value by label, e.g. `"V(out)"` or `"I(V1)"`.
    pub fn op_value(&self, label: &str) -> Option<f64> {
        self.op_point.as_ref()?.get(label).copied()
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.waveform.signal(name)
    }
}

/// Pair every unknown with its label.
pub(crate) fn label_solution(circuit: &Circuit, unknowns: &[f64]) -> BTreeMap<String, f64> {
    circuit
        .unknown_labels()
        .into_iter()
        .zip(unknowns.iter().copied())
        .collect()
}
