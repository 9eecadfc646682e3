//! Direct coupling for discrete fracture networks.
//!
//! When the interface between two grids carries no independent flow,
//! flux continuity is imposed exactly instead of through a mortar variable:
//! the pressures of the two grids couple directly through the
//! half-transmissibilities of the connecting faces.

use nalgebra_sparse as nas;

use super::{hstack, BlockMatrix, CouplingError};
use crate::{
    grid::Grid,
    params::{FlowData, PermeabilityTensor},
    tpfa::half_transmissibility,
};

use log::warn;

/// Operators derived during direct-coupling assembly,
/// written back to the interface for flux back-computation.
#[derive(Clone, Debug)]
pub struct DfnOperators {
    /// Map from the stacked cell pressures of both grids to the fluxes
    /// through the coupled higher-dimensional faces.
    pub coupling_flux: nas::CsrMatrix<f64>,
    /// The assembled coupling blocks themselves.
    pub coupling_discretization: BlockMatrix,
}

/// One interface between grids of adjacent dimension
/// connected by an explicit face-to-cell incidence, with no mortar grid.
#[derive(Clone, Debug)]
pub struct DfnInterface {
    /// Incidence marking which higher-dimensional face touches which
    /// lower-dimensional cell (lower cell rows, higher face columns).
    pub face_cells: nas::CsrMatrix<i8>,
    /// Operators written back by [`assemble`][Self::assemble].
    pub ops: Option<DfnOperators>,
}

impl DfnInterface {
    /// Construct an interface from its face-to-cell incidence.
    pub fn new(face_cells: nas::CsrMatrix<i8>) -> Self {
        Self {
            face_cells,
            ops: None,
        }
    }

    /// Assemble the coupling blocks over the two variable groups
    /// (higher-dimensional cells, lower-dimensional cells).
    ///
    /// Each coupled face contributes its one-sided transmissibility `t`,
    /// scaled by the aperture of the adjacent higher-dimensional cell:
    /// `-t` off-diagonal and `+t` on both diagonals,
    /// so the flux leaving one side exactly enters the other.
    pub fn assemble(
        &mut self,
        grid_h: &Grid,
        data_h: &FlowData,
        grid_l: &Grid,
    ) -> Result<BlockMatrix, CouplingError> {
        let num_cells_h = grid_h.num_cells;
        let num_cells_l = grid_l.num_cells;
        let expected = (num_cells_l, grid_h.num_faces);
        let found = (self.face_cells.nrows(), self.face_cells.ncols());
        if expected != found {
            return Err(CouplingError::ProjectionShape {
                name: "face_cells",
                expected,
                found,
            });
        }

        let default_permeability;
        let perm = match &data_h.permeability {
            Some(k) => k,
            None => {
                warn!("no permeability tensor given, assuming identity");
                default_permeability = PermeabilityTensor::identity(num_cells_h);
                &default_permeability
            }
        };
        if perm.cell_count() != num_cells_h {
            return Err(CouplingError::DataLength {
                name: "permeability",
                expected: num_cells_h,
                found: perm.cell_count(),
            });
        }
        if let Some(aperture) = &data_h.aperture {
            if aperture.len() != num_cells_h {
                return Err(CouplingError::DataLength {
                    name: "aperture",
                    expected: num_cells_h,
                    found: aperture.len(),
                });
            }
        }
        let aavatsmark = data_h.config.aavatsmark_transmissibilities;

        let mut off_diag = nas::CooMatrix::new(num_cells_l, num_cells_h);
        let mut diag_h = nas::CooMatrix::new(num_cells_h, num_cells_h);
        let mut diag_l = nas::CooMatrix::new(num_cells_l, num_cells_l);
        let mut cells_to_faces = nas::CooMatrix::new(grid_h.num_faces, num_cells_h);

        for (cell_l, face, _) in self.face_cells.triplet_iter() {
            let (cell_h, sgn) = grid_h
                .face_neighbor(face)
                .ok_or(CouplingError::IsolatedFace { face })?;

            // one-sided transmissibility of the coupled face,
            // computed exactly as in the single-grid discretization
            let n = grid_h.face_normals[face] * sgn;
            let fc_cc = grid_h.face_centers[face] - grid_h.cell_centers[cell_h];
            let aperture = data_h.aperture.as_ref().map_or(1.0, |a| a[cell_h]);
            let t = aperture * half_transmissibility(perm.cell(cell_h), &n, &fc_cc, aavatsmark);
            if !t.is_finite() {
                return Err(CouplingError::NonFiniteTransmissibility { face });
            }

            off_diag.push(cell_l, cell_h, -t);
            diag_h.push(cell_h, cell_h, t);
            diag_l.push(cell_l, cell_l, t);
            cells_to_faces.push(face, cell_h, sgn);
        }

        let mut cc = BlockMatrix::zeros(&[num_cells_h, num_cells_l]);
        let low_to_high = nas::CsrMatrix::from(&off_diag);
        cc.set_block(0, 1, low_to_high.transpose())?;
        cc.set_block(1, 0, low_to_high)?;
        cc.set_block(0, 0, nas::CsrMatrix::from(&diag_h))?;
        cc.set_block(1, 1, nas::CsrMatrix::from(&diag_l))?;

        // flux back-computation over the coupled faces,
        // acting on the stacked pressures of both grids
        let cells_to_faces = nas::CsrMatrix::from(&cells_to_faces);
        let coupling_flux = hstack(
            &(&cells_to_faces * cc.block(0, 0)),
            &(&cells_to_faces * cc.block(0, 1)),
        );
        self.ops = Some(DfnOperators {
            coupling_flux,
            coupling_discretization: cc.clone(),
        });
        Ok(cc)
    }
}
