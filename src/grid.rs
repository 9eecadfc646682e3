//! Grids as consumed by the discretization:
//! immutable topology plus precomputed geometry.

/// Construction of simple structured grids and corresponding tests.
mod structured;

//

use fixedbitset as fb;
use nalgebra as na;
use nalgebra_sparse as nas;

use crate::Vec3;

/// Errors in assembling a grid from raw geometry arrays.
#[derive(thiserror::Error, Debug)]
pub enum GridError {
    /// A geometry array does not have one entry per face (or cell).
    #[error("geometry array `{name}` has {found} entries, expected {expected}")]
    GeometryLength {
        /// Name of the offending array.
        name: &'static str,
        /// Entry count implied by the incidence matrix.
        expected: usize,
        /// Entry count actually supplied.
        found: usize,
    },
    /// A boundary-condition label was requested on an interior face.
    #[error("face {face} is not on the grid boundary")]
    NotABoundaryFace {
        /// Index of the offending face.
        face: usize,
    },
}

/// Topology and geometry of one subdomain.
///
/// The geometry is supplied fully precomputed;
/// this crate never derives centers, normals or areas itself.
/// Mutation after creation is not supported.
#[derive(Clone, Debug)]
pub struct Grid {
    /// Topological dimension of the grid (0 for point grids).
    pub dim: usize,
    /// Number of cells.
    pub num_cells: usize,
    /// Number of faces.
    pub num_faces: usize,
    /// Signed cell-face incidence with one row per face and one column per cell.
    /// An entry is +1 where the face normal points out of the cell
    /// and -1 where it points into the cell.
    pub cell_faces: nas::CsrMatrix<i8>,
    /// Per-face normal vectors, scaled by face area.
    pub face_normals: Vec<Vec3>,
    /// Per-face centers.
    pub face_centers: Vec<Vec3>,
    /// Per-face areas.
    pub face_areas: Vec<f64>,
    /// Per-cell centers.
    pub cell_centers: Vec<Vec3>,
    /// faces with exactly one adjacent cell
    boundary: fb::FixedBitSet,
}

impl Grid {
    /// Construct a grid from a signed incidence matrix and geometry arrays.
    ///
    /// Cell and face counts are taken from the incidence matrix shape;
    /// the geometry arrays must match them.
    /// The boundary face set is derived from the incidence
    /// (faces with a single adjacent cell).
    pub fn new(
        dim: usize,
        cell_faces: nas::CsrMatrix<i8>,
        face_normals: Vec<Vec3>,
        face_centers: Vec<Vec3>,
        face_areas: Vec<f64>,
        cell_centers: Vec<Vec3>,
    ) -> Result<Self, GridError> {
        let num_faces = cell_faces.nrows();
        let num_cells = cell_faces.ncols();

        let check = |name: &'static str, expected: usize, found: usize| {
            if found != expected {
                Err(GridError::GeometryLength {
                    name,
                    expected,
                    found,
                })
            } else {
                Ok(())
            }
        };
        check("face_normals", num_faces, face_normals.len())?;
        check("face_centers", num_faces, face_centers.len())?;
        check("face_areas", num_faces, face_areas.len())?;
        check("cell_centers", num_cells, cell_centers.len())?;

        let mut boundary = fb::FixedBitSet::with_capacity(num_faces);
        for (face, row) in cell_faces.row_iter().enumerate() {
            if row.nnz() == 1 {
                boundary.insert(face);
            }
        }

        Ok(Self {
            dim,
            num_cells,
            num_faces,
            cell_faces,
            face_normals,
            face_centers,
            face_areas,
            cell_centers,
            boundary,
        })
    }

    /// Get the set of faces with exactly one adjacent cell.
    #[inline]
    pub fn boundary_faces(&self) -> &fb::FixedBitSet {
        &self.boundary
    }

    /// Iterate over the (face, cell, sign) entries of the incidence matrix.
    pub fn incidence(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cell_faces
            .triplet_iter()
            .map(|(face, cell, &sgn)| (face, cell, sgn as f64))
    }

    /// Get the first adjacent cell of a face and the incidence sign towards it.
    ///
    /// For boundary faces this is the unique adjacent cell.
    /// Returns None for a face with no adjacent cell at all.
    pub fn face_neighbor(&self, face: usize) -> Option<(usize, f64)> {
        let row = self.cell_faces.get_row(face)?;
        let cell = *row.col_indices().first()?;
        let sgn = row.values()[0] as f64;
        Some((cell, sgn))
    }

    /// Build the divergence operator mapping face fluxes to per-cell balances
    /// (one row per cell, one column per face, values the incidence signs).
    pub fn scalar_divergence(&self) -> nas::CsrMatrix<f64> {
        let div = self.cell_faces.transpose();
        // same matrix with the signs converted to floats for multiplication
        nas::CsrMatrix::try_from_pattern_and_values(
            div.pattern().clone(),
            div.values().iter().map(|s| *s as f64).collect(),
        )
        .unwrap()
    }
}

/// The intermediate grid carrying the interface flux unknowns
/// between a higher- and a lower-dimensional subdomain.
///
/// Constructed once per interface by the caller; read-only here.
#[derive(Clone, Debug)]
pub struct MortarGrid {
    /// Number of mortar cells (one interface flux unknown each).
    pub num_cells: usize,
    /// Per-mortar-cell volumes.
    pub cell_volumes: na::DVector<f64>,
    /// Averaging projection from higher-dimensional faces to mortar cells
    /// (mortar rows, face columns).
    pub high_to_mortar_avg: nas::CsrMatrix<f64>,
    /// Averaging projection from lower-dimensional cells to mortar cells
    /// (mortar rows, cell columns).
    pub low_to_mortar_avg: nas::CsrMatrix<f64>,
}

impl MortarGrid {
    /// Construct a mortar grid from its volumes and averaging projections.
    ///
    /// The cell count is taken from `cell_volumes`;
    /// both projections must have one row per mortar cell.
    pub fn new(
        cell_volumes: na::DVector<f64>,
        high_to_mortar_avg: nas::CsrMatrix<f64>,
        low_to_mortar_avg: nas::CsrMatrix<f64>,
    ) -> Result<Self, GridError> {
        let num_cells = cell_volumes.len();
        for (name, rows) in [
            ("high_to_mortar_avg", high_to_mortar_avg.nrows()),
            ("low_to_mortar_avg", low_to_mortar_avg.nrows()),
        ] {
            if rows != num_cells {
                return Err(GridError::GeometryLength {
                    name,
                    expected: num_cells,
                    found: rows,
                });
            }
        }
        Ok(Self {
            num_cells,
            cell_volumes,
            high_to_mortar_avg,
            low_to_mortar_avg,
        })
    }
}
