//! MNA matrix assembly and dense LU solving.

use crate::error::{Result, SimError};

/// Pivots smaller than this are treated as zero.
pub const PIVOT_THRESHOLD: f64 = 1e-15;

/// MNA matrix system Ax = z.
#[derive(Debug, Clone)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Solution vector x
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of A
    pub lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pub pivots: Vec<usize>,
}

impl MnaMatrix {
    /// Create a zeroed system of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Clear the matrix and source vector to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a voltage source between two nodes with branch current at row br.
    /// V[n+] - V[n-] = E; the branch current flows from n+ through the source to n-.
    pub fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        br: usize,
        voltage: f64,
    ) {
        if let Some(i) = n_pos {
            self.add(br, i, 1.0);
            self.add(i, br, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(br, j, -1.0);
            self.add(j, br, -1.0);
        }
        self.add_source(br, voltage);
    }

    /// Stamp a current source between two nodes.
    /// Current flows from n+ to n- through the source.
    pub fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: f64) {
        if let Some(i) = n_pos {
            self.add_source(i, -current);
        }
        if let Some(j) = n_neg {
            self.add_source(j, current);
        }
    }

    /// Stamp a VCCS (Voltage-Controlled Current Source).
    /// I = gm * (V[ctrl+] - V[ctrl-]), flowing from out+ to out- through the device.
    pub fn stamp_vccs(
        &mut self,
        n_out_pos: Option<usize>,
        n_out_neg: Option<usize>,
        n_ctrl_pos: Option<usize>,
        n_ctrl_neg: Option<usize>,
        gm: f64,
    ) {
        if let (Some(i), Some(k)) = (n_out_pos, n_ctrl_pos) {
            self.add(i, k, gm);
        }
        if let (Some(i), Some(l)) = (n_out_pos, n_ctrl_neg) {
            self.add(i, l, -gm);
        }
        if let (Some(j), Some(k)) = (n_out_neg, n_ctrl_pos) {
            self.add(j, k, -gm);
        }
        if let (Some(j), Some(l)) = (n_out_neg, n_ctrl_neg) {
            self.add(j, l, gm);
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if !(max_val >= PIVOT_THRESHOLD) {
                return Err(SimError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) -> Result<()> {
        let n = self.size;

        // Apply pivot permutation to z
        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < PIVOT_THRESHOLD {
                return Err(SimError::SingularMatrix);
            }
            self.x[i] /= diag;
        }

        Ok(())
    }

    /// Factor and solve in one call.
    pub fn factor_and_solve(&mut self) -> Result<&[f64]> {
        self.factor()?;
        self.solve()?;
        Ok(&self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_with_pivoting() {
        // [0 1; 1 1] x = [1; 3]  ->  x = [2; 1]; needs a row swap
        let mut m = MnaMatrix::new(2);
        m.add(0, 1, 1.0);
        m.add(1, 0, 1.0);
        m.add(1, 1, 1.0);
        m.add_source(0, 1.0);
        m.add_source(1, 3.0);
        let x = m.factor_and_solve().unwrap();
        assert_relative_eq!(x[0], 2.0);
        assert_relative_eq!(x[1], 1.0);
    }

    #[test]
    fn test_voltage_divider_system() {
        // V1 = 1.8 at node 0 (branch row 2), R 1k from 0 to 1, R 1k from 1 to gnd
        let mut m = MnaMatrix::new(3);
        m.stamp_voltage_source(Some(0), None, 2, 1.8);
        m.stamp_conductance(Some(0), Some(1), 1e-3);
        m.stamp_conductance(Some(1), None, 1e-3);
        let x = m.factor_and_solve().unwrap();
        assert_relative_eq!(x[0], 1.8, max_relative = 1e-12);
        assert_relative_eq!(x[1], 0.9, max_relative = 1e-12);
        // Source supplies 0.9 mA, which flows into n+ from the source: negative branch current
        assert_relative_eq!(x[2], -0.9e-3, max_relative = 1e-12);
    }

    #[test]
    fn test_floating_node_is_singular() {
        // Node 1 has no connection at all
        let mut m = MnaMatrix::new(2);
        m.stamp_conductance(Some(0), None, 1e-3);
        assert!(matches!(m.factor(), Err(SimError::SingularMatrix)));
    }

    #[test]
    fn test_empty_system() {
        let mut m = MnaMatrix::new(0);
        assert!(m.factor_and_solve().unwrap().is_empty());
    }

    #[test]
    fn test_clear_keeps_dimension() {
        let mut m = MnaMatrix::new(2);
        m.stamp_conductance(Some(0), Some(1), 1.0);
        m.add_source(0, 1.0);
        m.clear();
        assert!(m.a.iter().all(|&v| v == 0.0));
        assert!(m.z.iter().all(|&v| v == 0.0));
        assert_eq!(m.size, 2);
    }
}
