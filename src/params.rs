//! Physical parameters and the per-grid data record
//! the discretization reads from and writes into.

use fixedbitset as fb;
use nalgebra as na;

use crate::{
    grid::{Grid, GridError},
    tpfa::TpfaDiscretization,
};

/// A symmetric second-order permeability tensor per cell.
///
/// Tensors are stored as full 3x3 matrices regardless of grid dimension;
/// the rows and columns beyond the grid dimension are simply never contracted
/// against a nonzero normal component.
#[derive(Clone, Debug)]
pub struct PermeabilityTensor {
    tensors: Vec<na::Matrix3<f64>>,
}

impl PermeabilityTensor {
    /// An identity tensor for every cell.
    pub fn identity(num_cells: usize) -> Self {
        Self {
            tensors: vec![na::Matrix3::identity(); num_cells],
        }
    }

    /// An isotropic tensor per cell from a slice of scalar permeabilities.
    pub fn isotropic(kxx: &[f64]) -> Self {
        Self {
            tensors: kxx.iter().map(|&k| na::Matrix3::identity() * k).collect(),
        }
    }

    /// Full tensors, one per cell. Each is assumed symmetric positive definite.
    pub fn from_tensors(tensors: Vec<na::Matrix3<f64>>) -> Self {
        Self { tensors }
    }

    /// Get the tensor of one cell.
    #[inline]
    pub fn cell(&self, cell: usize) -> &na::Matrix3<f64> {
        &self.tensors[cell]
    }

    /// Number of cells the tensor is defined on.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.tensors.len()
    }
}

/// Per-face classification of boundary faces into Dirichlet and Neumann.
///
/// Every boundary face carries exactly one label;
/// non-boundary faces carry none.
#[derive(Clone, Debug)]
pub struct BoundaryConditions {
    is_dir: fb::FixedBitSet,
    is_neu: fb::FixedBitSet,
}

impl BoundaryConditions {
    /// Label every boundary face Neumann (the no-flow default).
    pub fn all_neumann(grid: &Grid) -> Self {
        let mut is_neu = fb::FixedBitSet::with_capacity(grid.num_faces);
        is_neu.union_with(grid.boundary_faces());
        Self {
            is_dir: fb::FixedBitSet::with_capacity(grid.num_faces),
            is_neu,
        }
    }

    /// Label the given faces Dirichlet and every other boundary face Neumann.
    ///
    /// Fails if any of the given faces is not a boundary face.
    pub fn with_dirichlet(
        grid: &Grid,
        dirichlet_faces: impl IntoIterator<Item = usize>,
    ) -> Result<Self, GridError> {
        let mut bc = Self::all_neumann(grid);
        for face in dirichlet_faces {
            if !grid.boundary_faces().contains(face) {
                return Err(GridError::NotABoundaryFace { face });
            }
            bc.is_neu.set(face, false);
            bc.is_dir.insert(face);
        }
        Ok(bc)
    }

    /// Whether a face is labeled Dirichlet.
    #[inline]
    pub fn is_dirichlet(&self, face: usize) -> bool {
        self.is_dir.contains(face)
    }

    /// Whether a face is labeled Neumann.
    #[inline]
    pub fn is_neumann(&self, face: usize) -> bool {
        self.is_neu.contains(face)
    }
}

/// Configuration flags recognized by the transmissibility computation.
#[derive(Clone, Copy, Debug, Default)]
pub struct TpfaConfig {
    /// Use vector norms instead of the projection onto the face-to-cell
    /// displacement when computing half-transmissibilities.
    /// More robust for some skewed or anisotropic configurations; off by default.
    pub aavatsmark_transmissibilities: bool,
    /// Reserved: shift the face center half an aperture away from the interface
    /// for the matrix-side transmissibility. Currently not acted upon.
    pub aperture_correction: bool,
}

/// The mutable per-grid record: physical input data
/// plus the discretization operators written by the engine.
#[derive(Clone, Debug)]
pub struct FlowData {
    /// Permeability tensor per cell.
    /// If absent, an identity tensor is assumed and a warning is logged.
    pub permeability: Option<PermeabilityTensor>,
    /// Boundary condition labels.
    pub bc: BoundaryConditions,
    /// Boundary values, one per face
    /// (a prescribed pressure on Dirichlet faces, a prescribed flux on Neumann faces;
    /// entries on interior faces are ignored).
    pub bc_values: na::DVector<f64>,
    /// Optional per-cell apertures scaling the face normals,
    /// modeling the reduced cross-section of lower-dimensional cells
    /// embedded in a higher-dimensional medium. Absence means aperture 1.
    pub aperture: Option<na::DVector<f64>>,
    /// Configuration flags.
    pub config: TpfaConfig,
    /// Discretization operators, written by [`tpfa::discretize`][crate::tpfa::discretize].
    pub discretization: Option<TpfaDiscretization>,
}

impl FlowData {
    /// A record with no permeability, no-flow boundary conditions,
    /// zero boundary values and no aperture.
    pub fn new(grid: &Grid) -> Self {
        Self {
            permeability: None,
            bc: BoundaryConditions::all_neumann(grid),
            bc_values: na::DVector::zeros(grid.num_faces),
            aperture: None,
            config: TpfaConfig::default(),
            discretization: None,
        }
    }
}
