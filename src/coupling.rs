//! Inter-dimensional couplings: block-matrix assembly tying grids of
//! adjacent dimension together across an interface.
//!
//! Two flavors exist, selected per interface at construction time:
//! a mortar formulation ([`mortar`]) where the interface flux is its own
//! unknown, and a direct formulation ([`dfn`]) for discrete fracture
//! networks where flux continuity is exact and no interface unknown exists.

pub mod dfn;
#[doc(inline)]
pub use dfn::{DfnInterface, DfnOperators};

pub mod mortar;
#[doc(inline)]
pub use mortar::{MortarInterface, MortarOperators};

//

use nalgebra_sparse as nas;

use crate::{grid::Grid, params::FlowData};

/// Errors in assembling an inter-dimensional coupling.
#[derive(thiserror::Error, Debug)]
pub enum CouplingError {
    /// The higher-dimensional grid record holds no discretization operators.
    #[error("the higher-dimensional grid has no discretization; discretize it first")]
    MissingDiscretization,
    /// A projection or incidence matrix does not match the grids it connects.
    #[error("`{name}` has shape {found:?}, expected {expected:?}")]
    ProjectionShape {
        /// Name of the offending matrix.
        name: &'static str,
        /// Shape implied by the grids.
        expected: (usize, usize),
        /// Shape actually supplied.
        found: (usize, usize),
    },
    /// A block does not match the dimensions of its variable groups.
    #[error("block ({row}, {col}) has shape {found:?}, expected {expected:?}")]
    BlockShape {
        /// Row variable group.
        row: usize,
        /// Column variable group.
        col: usize,
        /// Shape implied by the group dimensions.
        expected: (usize, usize),
        /// Shape actually supplied.
        found: (usize, usize),
    },
    /// A per-cell input array does not have one entry per cell.
    #[error("`{name}` has {found} entries, expected {expected}")]
    DataLength {
        /// Name of the offending input.
        name: &'static str,
        /// Expected entry count.
        expected: usize,
        /// Entry count actually supplied.
        found: usize,
    },
    /// A mortar cell projects onto no oriented higher-dimensional face,
    /// so its interface flux would silently drop out of the flux law.
    #[error("mortar cell {cell} has no oriented connection to the higher-dimensional grid")]
    DegenerateMortarProjection {
        /// Index of the offending mortar cell.
        cell: usize,
    },
    /// A coupled face has no adjacent cell in the higher-dimensional grid.
    #[error("coupled face {face} has no adjacent cell")]
    IsolatedFace {
        /// Index of the offending face.
        face: usize,
    },
    /// Degenerate geometry produced a non-finite interface transmissibility.
    #[error("non-finite transmissibility on coupled face {face}")]
    NonFiniteTransmissibility {
        /// Index of the degenerate face.
        face: usize,
    },
}

/// A square grid of sparse blocks keyed by variable-group index.
///
/// Couplings return their contributions in this form so the caller can
/// add them into a global block system and flatten once at the end.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockMatrix {
    dims: Vec<usize>,
    /// row-major, dims.len() x dims.len()
    blocks: Vec<nas::CsrMatrix<f64>>,
}

impl BlockMatrix {
    /// An all-zero block matrix with the given dimension per variable group.
    pub fn zeros(dims: &[usize]) -> Self {
        let n = dims.len();
        let blocks = (0..n * n)
            .map(|k| nas::CsrMatrix::zeros(dims[k / n], dims[k % n]))
            .collect();
        Self {
            dims: dims.to_vec(),
            blocks,
        }
    }

    /// Dimension of each variable group.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Get one block.
    #[inline]
    pub fn block(&self, row: usize, col: usize) -> &nas::CsrMatrix<f64> {
        &self.blocks[row * self.dims.len() + col]
    }

    /// Replace one block, checking its shape against the group dimensions.
    pub fn set_block(
        &mut self,
        row: usize,
        col: usize,
        block: nas::CsrMatrix<f64>,
    ) -> Result<(), CouplingError> {
        let expected = (self.dims[row], self.dims[col]);
        let found = (block.nrows(), block.ncols());
        if expected != found {
            return Err(CouplingError::BlockShape {
                row,
                col,
                expected,
                found,
            });
        }
        self.blocks[row * self.dims.len() + col] = block;
        Ok(())
    }

    /// Flatten the blocks into one sparse matrix
    /// with the variable groups stacked in order.
    pub fn to_csr(&self) -> nas::CsrMatrix<f64> {
        let offsets: Vec<usize> = self
            .dims
            .iter()
            .scan(0, |acc, d| {
                let offset = *acc;
                *acc += d;
                Some(offset)
            })
            .collect();
        let total: usize = self.dims.iter().sum();

        let mut coo = nas::CooMatrix::new(total, total);
        let n = self.dims.len();
        for (k, block) in self.blocks.iter().enumerate() {
            let (bi, bj) = (k / n, k % n);
            for (i, j, v) in block.triplet_iter() {
                coo.push(offsets[bi] + i, offsets[bj] + j, *v);
            }
        }
        nas::CsrMatrix::from(&coo)
    }
}

/// The coupling condition of one interface,
/// chosen at construction time based on whether a mortar grid exists.
#[derive(Clone, Debug)]
pub enum Coupling {
    /// Mortar formulation: the interface flux is a separate unknown.
    Mortar(MortarInterface),
    /// Direct formulation for discrete fracture networks:
    /// flux continuity is exact and no interface unknown exists.
    Dfn(DfnInterface),
}

impl Coupling {
    /// Assemble the coupling blocks for this interface.
    ///
    /// The higher-dimensional record must have been discretized for the
    /// mortar variant; see the concrete types for details.
    pub fn assemble(
        &mut self,
        grid_h: &Grid,
        data_h: &FlowData,
        grid_l: &Grid,
    ) -> Result<BlockMatrix, CouplingError> {
        match self {
            Coupling::Mortar(interface) => interface.assemble(grid_h, data_h, grid_l),
            Coupling::Dfn(interface) => interface.assemble(grid_h, data_h, grid_l),
        }
    }
}

/// Scale a matrix by -1 in place
/// (nalgebra-sparse has no unary negation for CSR matrices).
pub(crate) fn negated(mut m: nas::CsrMatrix<f64>) -> nas::CsrMatrix<f64> {
    m *= -1.0;
    m
}

/// Stack two matrices with equal row counts side by side.
pub(crate) fn hstack(
    left: &nas::CsrMatrix<f64>,
    right: &nas::CsrMatrix<f64>,
) -> nas::CsrMatrix<f64> {
    let mut coo = nas::CooMatrix::new(left.nrows(), left.ncols() + right.ncols());
    for (i, j, v) in left.triplet_iter() {
        coo.push(i, j, *v);
    }
    for (i, j, v) in right.triplet_iter() {
        coo.push(i, left.ncols() + j, *v);
    }
    nas::CsrMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(m: &nas::CsrMatrix<f64>, i: usize, j: usize) -> f64 {
        m.get_entry(i, j).map(|e| e.into_value()).unwrap()
    }

    #[test]
    fn block_shapes_are_enforced() {
        let mut cc = BlockMatrix::zeros(&[2, 3]);
        assert!(cc.set_block(0, 1, nas::CsrMatrix::zeros(2, 3)).is_ok());
        assert!(matches!(
            cc.set_block(1, 0, nas::CsrMatrix::zeros(2, 3)),
            Err(CouplingError::BlockShape { row: 1, col: 0, .. })
        ));
    }

    #[test]
    fn flattening_offsets_blocks() {
        let mut cc = BlockMatrix::zeros(&[2, 1]);
        let mut diag = nas::CooMatrix::new(2, 2);
        diag.push(0, 0, 5.0);
        diag.push(1, 1, 6.0);
        cc.set_block(0, 0, nas::CsrMatrix::from(&diag)).unwrap();
        let mut corner = nas::CooMatrix::new(1, 2);
        corner.push(0, 1, -2.0);
        cc.set_block(1, 0, nas::CsrMatrix::from(&corner)).unwrap();

        let flat = cc.to_csr();
        assert_eq!(flat.nrows(), 3);
        assert_eq!(flat.ncols(), 3);
        assert_eq!(entry(&flat, 0, 0), 5.0);
        assert_eq!(entry(&flat, 1, 1), 6.0);
        assert_eq!(entry(&flat, 2, 1), -2.0);
        assert_eq!(entry(&flat, 2, 2), 0.0);
    }

    #[test]
    fn hstack_concatenates_columns() {
        let mut left = nas::CooMatrix::new(2, 2);
        left.push(1, 0, 1.0);
        let mut right = nas::CooMatrix::new(2, 1);
        right.push(0, 0, 3.0);
        let stacked = hstack(
            &nas::CsrMatrix::from(&left),
            &nas::CsrMatrix::from(&right),
        );
        assert_eq!(stacked.nrows(), 2);
        assert_eq!(stacked.ncols(), 3);
        assert_eq!(entry(&stacked, 1, 0), 1.0);
        assert_eq!(entry(&stacked, 0, 2), 3.0);
    }
}
