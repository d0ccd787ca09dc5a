//! Sparse Y-bus (admittance) matrix for short-circuit analysis.
//!
//! The Y-bus matrix relates injected currents to node voltages:
//! ```text
//! I = Y × V
//!
//! where Y[i,j] = G[i,j] + jB[i,j] (conductance + j×susceptance)
//! ```
//!
//! Branches are stamped with their series admittance only; source
//! admittances (grid equivalents, locked-rotor machines) are stamped on the
//! diagonal. There is no slack bus: every source is an admittance to the
//! common reference, so Y is non-singular on each energized island.
//!
//! CSR storage keeps the real (G) and imaginary (B) parts separately.

use ikss_core::{BranchId, BusId, ScError};
use num_complex::Complex64;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from Y-bus matrix operations
#[derive(Debug, Error)]
pub enum YBusError {
    #[error("No buses found in network")]
    NoBuses,

    #[error("Branch {0} has zero impedance")]
    ZeroImpedance(String),

    #[error("Branch {0} has non-finite impedance")]
    NonFinite(String),

    #[error("Unknown bus ID: {0}")]
    UnknownBus(usize),

    #[error("Admittance matrix is not symmetric at [{row},{col}] (difference {diff:.3e})")]
    Asymmetric { row: usize, col: usize, diff: f64 },
}

impl From<YBusError> for ScError {
    fn from(err: YBusError) -> Self {
        match err {
            YBusError::NoBuses => ScError::Network(err.to_string()),
            YBusError::Asymmetric { .. } => ScError::NumericIllConditioning(err.to_string()),
            YBusError::ZeroImpedance(_) | YBusError::NonFinite(_) | YBusError::UnknownBus(_) => {
                ScError::Configuration(err.to_string())
            }
        }
    }
}

/// Series admittance of one stamped branch, in matrix indices.
#[derive(Debug, Clone, Copy)]
pub struct BranchAdmittance {
    pub branch: BranchId,
    pub from: usize,
    pub to: usize,
    /// y = 1/z in per-unit
    pub y: Complex64,
}

/// Accumulates branch and shunt stamps before compressing to CSR.
pub struct YBusBuilder {
    bus_map: HashMap<BusId, usize>,
    idx_to_bus: Vec<BusId>,
    g_triplet: TriMat<f64>,
    b_triplet: TriMat<f64>,
    branches: Vec<BranchAdmittance>,
}

impl YBusBuilder {
    /// Index buses in the given order.
    pub fn new(buses: &[BusId]) -> Self {
        let n_bus = buses.len();
        let bus_map = buses
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        Self {
            bus_map,
            idx_to_bus: buses.to_vec(),
            g_triplet: TriMat::new((n_bus, n_bus)),
            b_triplet: TriMat::new((n_bus, n_bus)),
            branches: Vec::new(),
        }
    }

    fn index(&self, bus: BusId) -> Result<usize, YBusError> {
        self.bus_map
            .get(&bus)
            .copied()
            .ok_or(YBusError::UnknownBus(bus.value()))
    }

    fn add(&mut self, row: usize, col: usize, y: Complex64) {
        self.g_triplet.add_triplet(row, col, y.re);
        self.b_triplet.add_triplet(row, col, y.im);
    }

    /// Stamp a series branch with per-unit impedance `z`.
    pub fn stamp_branch(
        &mut self,
        id: BranchId,
        from_bus: BusId,
        to_bus: BusId,
        z: Complex64,
    ) -> Result<(), YBusError> {
        if !z.is_finite() {
            return Err(YBusError::NonFinite(id.to_string()));
        }
        if z.norm() < 1e-12 {
            return Err(YBusError::ZeroImpedance(id.to_string()));
        }
        let from = self.index(from_bus)?;
        let to = self.index(to_bus)?;

        // Series admittance y = 1/(r + jx)
        let y = z.inv();

        self.add(from, from, y);
        self.add(to, to, y);
        self.add(from, to, -y);
        self.add(to, from, -y);

        self.branches.push(BranchAdmittance {
            branch: id,
            from,
            to,
            y,
        });
        Ok(())
    }

    /// Stamp an admittance from `bus` to the reference.
    pub fn stamp_shunt(&mut self, bus: BusId, y: Complex64) -> Result<(), YBusError> {
        let idx = self.index(bus)?;
        self.add(idx, idx, y);
        Ok(())
    }

    pub fn build(self) -> Result<SparseYBus, YBusError> {
        let n_bus = self.idx_to_bus.len();
        if n_bus == 0 {
            return Err(YBusError::NoBuses);
        }
        Ok(SparseYBus {
            n_bus,
            g_matrix: self.g_triplet.to_csr(),
            b_matrix: self.b_triplet.to_csr(),
            bus_map: self.bus_map,
            idx_to_bus: self.idx_to_bus,
            branches: self.branches,
        })
    }
}

/// Sparse Y-bus matrix in CSR format.
///
/// Stores G (conductance) and B (susceptance) matrices separately for
/// efficient access to real and imaginary parts.
#[derive(Debug, Clone)]
pub struct SparseYBus {
    /// Number of buses
    n_bus: usize,
    /// Real part (conductance G) in CSR format
    g_matrix: CsMat<f64>,
    /// Imaginary part (susceptance B) in CSR format
    b_matrix: CsMat<f64>,
    /// Bus ID to index mapping
    bus_map: HashMap<BusId, usize>,
    /// Index to Bus ID mapping
    idx_to_bus: Vec<BusId>,
    /// Stamped branches in insertion order
    branches: Vec<BranchAdmittance>,
}

impl SparseYBus {
    /// Number of buses
    pub fn n_bus(&self) -> usize {
        self.n_bus
    }

    /// Get G[i,j] (conductance)
    pub fn g(&self, i: usize, j: usize) -> f64 {
        self.g_matrix.get(i, j).copied().unwrap_or(0.0)
    }

    /// Get B[i,j] (susceptance)
    pub fn b(&self, i: usize, j: usize) -> f64 {
        self.b_matrix.get(i, j).copied().unwrap_or(0.0)
    }

    /// Get complex Y[i,j] = G[i,j] + jB[i,j]
    pub fn y(&self, i: usize, j: usize) -> Complex64 {
        Complex64::new(self.g(i, j), self.b(i, j))
    }

    /// Get bus index from ID
    pub fn bus_index(&self, id: BusId) -> Option<usize> {
        self.bus_map.get(&id).copied()
    }

    /// Get bus ID from index
    pub fn bus_id(&self, idx: usize) -> Option<BusId> {
        self.idx_to_bus.get(idx).copied()
    }

    pub fn bus_ids(&self) -> &[BusId] {
        &self.idx_to_bus
    }

    pub fn branches(&self) -> &[BranchAdmittance] {
        &self.branches
    }

    /// Total non-zeros (G + B)
    pub fn nnz(&self) -> usize {
        self.g_matrix.nnz() + self.b_matrix.nnz()
    }

    /// Verify Y[i,j] == Y[j,i] within `tolerance` (absolute, per part).
    pub fn check_symmetry(&self, tolerance: f64) -> Result<(), YBusError> {
        for matrix in [&self.g_matrix, &self.b_matrix] {
            for (row, vec) in matrix.outer_iterator().enumerate() {
                for (col, &value) in vec.iter() {
                    let mirror = matrix.get(col, row).copied().unwrap_or(0.0);
                    let diff = (value - mirror).abs();
                    if !(diff <= tolerance) {
                        return Err(YBusError::Asymmetric { row, col, diff });
                    }
                }
            }
        }
        Ok(())
    }

    /// Expand to a dense row-major matrix for factorization.
    pub fn to_dense(&self) -> Vec<Vec<Complex64>> {
        let mut dense = vec![vec![Complex64::new(0.0, 0.0); self.n_bus]; self.n_bus];
        for (row, vec) in self.g_matrix.outer_iterator().enumerate() {
            for (col, &value) in vec.iter() {
                dense[row][col].re += value;
            }
        }
        for (row, vec) in self.b_matrix.outer_iterator().enumerate() {
            for (col, &value) in vec.iter() {
                dense[row][col].im += value;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<BusId> {
        (1..=n).map(BusId::new).collect()
    }

    fn triangle() -> SparseYBus {
        let mut builder = YBusBuilder::new(&ids(3));
        let z = Complex64::new(0.01, 0.1);
        builder
            .stamp_branch(BranchId::new(1), BusId::new(1), BusId::new(2), z)
            .unwrap();
        builder
            .stamp_branch(BranchId::new(2), BusId::new(2), BusId::new(3), z)
            .unwrap();
        builder
            .stamp_branch(BranchId::new(3), BusId::new(1), BusId::new(3), z)
            .unwrap();
        builder
            .stamp_shunt(BusId::new(1), Complex64::new(0.5, -5.0))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_ybus_construction() {
        let ybus = triangle();
        assert_eq!(ybus.n_bus(), 3);
        assert_eq!(ybus.branches().len(), 3);

        let y = Complex64::new(0.01, 0.1).inv();
        assert!((ybus.y(1, 1) - 2.0 * y).norm() < 1e-9);
        assert!((ybus.y(0, 0) - (2.0 * y + Complex64::new(0.5, -5.0))).norm() < 1e-9);
        assert!((ybus.y(0, 1) + y).norm() < 1e-9);
    }

    #[test]
    fn test_ybus_symmetry() {
        let ybus = triangle();
        ybus.check_symmetry(1e-12).unwrap();
        for i in 0..ybus.n_bus() {
            for j in 0..ybus.n_bus() {
                assert!((ybus.y(i, j) - ybus.y(j, i)).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_ybus_bus_mapping() {
        let ybus = triangle();

        // Verify round-trip
        for idx in 0..ybus.n_bus() {
            let bus_id = ybus.bus_id(idx).unwrap();
            let back_idx = ybus.bus_index(bus_id).unwrap();
            assert_eq!(idx, back_idx);
        }
    }

    #[test]
    fn test_dense_matches_sparse() {
        let ybus = triangle();
        let dense = ybus.to_dense();
        for (i, row) in dense.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                assert_eq!(*value, ybus.y(i, j));
            }
        }
    }

    #[test]
    fn test_rejects_zero_impedance_and_unknown_bus() {
        let mut builder = YBusBuilder::new(&ids(2));
        let err = builder
            .stamp_branch(
                BranchId::new(7),
                BusId::new(1),
                BusId::new(2),
                Complex64::new(0.0, 0.0),
            )
            .unwrap_err();
        assert!(matches!(err, YBusError::ZeroImpedance(_)));

        let err = builder
            .stamp_shunt(BusId::new(9), Complex64::new(1.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, YBusError::UnknownBus(9)));

        assert!(matches!(
            YBusBuilder::new(&[]).build(),
            Err(YBusError::NoBuses)
        ));
    }
}
