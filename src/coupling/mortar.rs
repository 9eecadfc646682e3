//! Mortar coupling between a higher- and a lower-dimensional grid.
//!
//! The interface flux lives on a mortar grid as a first-class unknown,
//! one value per mortar cell. The assembled blocks enforce three conditions:
//! the mortar flux acts as a Neumann condition on the higher-dimensional
//! grid, as a source on the lower-dimensional grid, and satisfies the
//! interface flux law `lambda = kn * (p_high - p_low)`.

use itertools::izip;
use nalgebra as na;
use nalgebra_sparse as nas;

use super::{negated, BlockMatrix, CouplingError};
use crate::{
    grid::{Grid, MortarGrid},
    params::FlowData,
    tpfa::diag_csr,
};

/// Operators derived during mortar assembly, written back to the interface
/// for reuse by flux-reconstruction consumers.
#[derive(Clone, Debug)]
pub struct MortarOperators {
    /// Map from mortar fluxes to the induced higher-dimensional boundary fluxes.
    pub mortar_to_bc: nas::CsrMatrix<f64>,
    /// Map from mortar fluxes to lower-dimensional cell sources
    /// (the negative transposed low projection).
    pub jump: nas::CsrMatrix<f64>,
    /// Map from higher-dimensional cell pressures to their trace on the mortar grid.
    pub hat_p_to_mortar: nas::CsrMatrix<f64>,
    /// The averaging projection from lower-dimensional cells to the mortar grid.
    pub check_p_to_mortar: nas::CsrMatrix<f64>,
    /// The mortar self-weight: the full (mortar, mortar) block of the flux law.
    pub mortar_weight: nas::CsrMatrix<f64>,
}

/// One interface between grids of adjacent dimension, coupled through a
/// mortar grid and a normal permeability.
#[derive(Clone, Debug)]
pub struct MortarInterface {
    /// The mortar grid carrying the interface flux unknowns.
    pub mortar: MortarGrid,
    /// Normal permeability of the interface, one value per mortar cell.
    ///
    /// A vanishing value makes the flux-law self-term unbounded;
    /// guarding against non-physical input is the caller's responsibility.
    pub normal_permeability: na::DVector<f64>,
    /// Operators written back by [`assemble`][Self::assemble].
    pub ops: Option<MortarOperators>,
}

impl MortarInterface {
    /// Construct an interface from its mortar grid and normal permeability.
    pub fn new(
        mortar: MortarGrid,
        normal_permeability: na::DVector<f64>,
    ) -> Result<Self, CouplingError> {
        if normal_permeability.len() != mortar.num_cells {
            return Err(CouplingError::DataLength {
                name: "normal_permeability",
                expected: mortar.num_cells,
                found: normal_permeability.len(),
            });
        }
        Ok(Self {
            mortar,
            normal_permeability,
            ops: None,
        })
    }

    /// Assemble the coupling blocks over the three variable groups
    /// (higher-dimensional cells, lower-dimensional cells, mortar cells).
    ///
    /// The higher-dimensional record must already hold a discretization;
    /// the mortar faces of the higher-dimensional grid are expected to be
    /// labeled Neumann there, so the mortar flux passes through its
    /// boundary operators.
    pub fn assemble(
        &mut self,
        grid_h: &Grid,
        data_h: &FlowData,
        grid_l: &Grid,
    ) -> Result<BlockMatrix, CouplingError> {
        let discr_h = data_h
            .discretization
            .as_ref()
            .ok_or(CouplingError::MissingDiscretization)?;

        let mg = &self.mortar;
        let hat_p = &mg.high_to_mortar_avg;
        let check_p = &mg.low_to_mortar_avg;
        if hat_p.ncols() != grid_h.num_faces {
            return Err(CouplingError::ProjectionShape {
                name: "high_to_mortar_avg",
                expected: (mg.num_cells, grid_h.num_faces),
                found: (hat_p.nrows(), hat_p.ncols()),
            });
        }
        if check_p.ncols() != grid_l.num_cells {
            return Err(CouplingError::ProjectionShape {
                name: "low_to_mortar_avg",
                expected: (mg.num_cells, grid_l.num_cells),
                found: (check_p.nrows(), check_p.ncols()),
            });
        }
        if let Some(aperture) = &data_h.aperture {
            if aperture.len() != grid_h.num_cells {
                return Err(CouplingError::DataLength {
                    name: "aperture",
                    expected: grid_h.num_cells,
                    found: aperture.len(),
                });
            }
        }

        let div_h = grid_h.scalar_divergence();

        // The orientation of the mortar flux against the higher-dimensional
        // outward normal is recovered from the sign pattern of the projected
        // divergence, not assumed a priori. A zero row sum means the mortar
        // cell sees no oriented face at all.
        let oriented = hat_p * &div_h.transpose();
        for (cell, row) in oriented.row_iter().enumerate() {
            let sign: f64 = row.values().iter().sum();
            if sign == 0.0 {
                return Err(CouplingError::DegenerateMortarProjection { cell });
            }
        }

        // aperture of the adjacent higher-dimensional cell, seen per face
        // and averaged onto the mortar cells
        let mut face_aperture = na::DVector::from_element(grid_h.num_faces, 1.0);
        if let Some(aperture) = &data_h.aperture {
            for face in 0..grid_h.num_faces {
                if let Some((cell, _)) = grid_h.face_neighbor(face) {
                    face_aperture[face] = aperture[cell];
                }
            }
        }
        let mortar_aperture = hat_p * &face_aperture;

        // series resistance of the two half-gaps on either side of the interface
        let inv_k = na::DVector::from_iterator(
            mg.num_cells,
            izip!(self.normal_permeability.iter(), mortar_aperture.iter())
                .map(|(&kn, &aperture)| 1.0 / (2.0 * kn) / aperture),
        );
        let eta = diag_csr(&inv_k);
        let mortar_mass = diag_csr(&mg.cell_volumes.map(|v| 1.0 / v));

        let mut cc = BlockMatrix::zeros(&[grid_h.num_cells, grid_l.num_cells, mg.num_cells]);

        // the mortar flux enters the higher-dimensional balance as a boundary
        // condition, through the standard boundary discretization
        let mortar_to_bc = &discr_h.bound_flux * &hat_p.transpose();
        cc.set_block(0, 2, &div_h * &mortar_to_bc)?;
        // and the lower-dimensional balance as a source term
        let jump = negated(check_p.transpose());
        cc.set_block(1, 2, jump.clone())?;

        // the flux law: the higher-dimensional pressure trace is the cell
        // pressure plus the boundary contribution carried by the mortar flux
        let hat_p_to_mortar = hat_p * &discr_h.bound_pressure_cell;
        cc.set_block(2, 0, hat_p_to_mortar.clone())?;
        cc.set_block(2, 1, negated(check_p.clone()))?;

        let hat_p_t = hat_p.transpose();
        let trace_from_mortar = &(hat_p * &discr_h.bound_pressure_face) * &hat_p_t;
        let mortar_weight = &trace_from_mortar - &(&eta * &mortar_mass);
        cc.set_block(2, 2, mortar_weight.clone())?;

        self.ops = Some(MortarOperators {
            mortar_to_bc,
            jump,
            hat_p_to_mortar,
            check_p_to_mortar: check_p.clone(),
            mortar_weight,
        });
        Ok(cc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::PermeabilityTensor, tpfa};
    use approx::assert_relative_eq;

    fn entry(m: &nas::CsrMatrix<f64>, i: usize, j: usize) -> f64 {
        m.get_entry(i, j).map(|e| e.into_value()).unwrap()
    }

    /// A 2x1 matrix grid with a two-cell fracture along its bottom edge,
    /// coupled through a two-cell mortar grid.
    fn matrix_fracture_interface(kn: f64) -> (Grid, FlowData, Grid, MortarInterface) {
        let grid_h = Grid::cartesian_2d([2, 1], [2.0, 1.0]);
        let mut data_h = FlowData::new(&grid_h);
        data_h.permeability = Some(PermeabilityTensor::identity(2));
        tpfa::discretize(&grid_h, &mut data_h, None).unwrap();

        let grid_l = Grid::line_1d(2, 2.0);

        // bottom faces of the matrix grid are faces 3 and 4
        let mut hat_p = nas::CooMatrix::new(2, grid_h.num_faces);
        hat_p.push(0, 3, 1.0);
        hat_p.push(1, 4, 1.0);
        let check_p = nas::CsrMatrix::identity(2);

        let mortar = MortarGrid::new(
            na::DVector::from_element(2, 1.0),
            nas::CsrMatrix::from(&hat_p),
            check_p,
        )
        .unwrap();
        let interface =
            MortarInterface::new(mortar, na::DVector::from_element(2, kn)).unwrap();
        (grid_h, data_h, grid_l, interface)
    }

    #[test]
    fn mortar_blocks() {
        let (grid_h, data_h, grid_l, mut interface) = matrix_fracture_interface(1.0);
        let cc = interface.assemble(&grid_h, &data_h, &grid_l).unwrap();

        // the mortar flux drains cell 0 through face 3 and cell 1 through
        // face 4; the face orientation makes the induced flux an inflow
        assert_relative_eq!(entry(cc.block(0, 2), 0, 0), 1.0);
        assert_relative_eq!(entry(cc.block(0, 2), 1, 1), 1.0);
        assert_relative_eq!(entry(cc.block(0, 2), 0, 1), 0.0);

        // source on the fracture side
        assert_relative_eq!(entry(cc.block(1, 2), 0, 0), -1.0);
        assert_relative_eq!(entry(cc.block(1, 2), 1, 1), -1.0);

        // pressure trace of the matrix cells onto the mortar cells
        assert_relative_eq!(entry(cc.block(2, 0), 0, 0), 1.0);
        assert_relative_eq!(entry(cc.block(2, 0), 1, 1), 1.0);

        // fracture pressure enters the flux law with opposite sign
        assert_relative_eq!(entry(cc.block(2, 1), 0, 0), -1.0);
        assert_relative_eq!(entry(cc.block(2, 1), 1, 1), -1.0);

        // self-weight: trace contribution -1/t_half plus the gap resistance
        // 1/(2 kn) per unit mortar volume, both -1/2 here
        assert_relative_eq!(entry(cc.block(2, 2), 0, 0), -1.0);
        assert_relative_eq!(entry(cc.block(2, 2), 1, 1), -1.0);
        assert_relative_eq!(entry(cc.block(2, 2), 0, 1), 0.0);
    }

    #[test]
    fn coupling_blocks_are_transposes() {
        let (grid_h, data_h, grid_l, mut interface) = matrix_fracture_interface(3.0);
        let cc = interface.assemble(&grid_h, &data_h, &grid_l).unwrap();

        assert_eq!(cc.block(2, 0).transpose(), *cc.block(0, 2));
        assert_eq!(cc.block(2, 1).transpose(), *cc.block(1, 2));
    }

    /// A very large normal permeability removes the interface resistance,
    /// approximating pressure continuity across the interface.
    #[test]
    fn large_normal_permeability_limit() {
        let (grid_h, data_h, grid_l, mut interface) = matrix_fracture_interface(1e12);
        let cc = interface.assemble(&grid_h, &data_h, &grid_l).unwrap();

        // only the pressure-trace term remains
        assert_relative_eq!(entry(cc.block(2, 2), 0, 0), -0.5, epsilon = 1e-9);
    }

    #[test]
    fn aperture_scales_the_gap_resistance() {
        let (grid_h, mut data_h, grid_l, mut interface) = matrix_fracture_interface(1.0);
        data_h.aperture = Some(na::DVector::from_element(2, 2.0));
        tpfa::discretize(&grid_h, &mut data_h, None).unwrap();
        let cc = interface.assemble(&grid_h, &data_h, &grid_l).unwrap();

        // doubling the aperture doubles every half-transmissibility
        // (trace term -1/4) and halves the gap resistance (-1/4)
        assert_relative_eq!(entry(cc.block(2, 2), 0, 0), -0.5);
    }

    #[test]
    fn derived_operators_are_written_back() {
        let (grid_h, data_h, grid_l, mut interface) = matrix_fracture_interface(1.0);
        let cc = interface.assemble(&grid_h, &data_h, &grid_l).unwrap();

        let ops = interface.ops.as_ref().unwrap();
        assert_eq!(ops.mortar_weight, *cc.block(2, 2));
        assert_eq!(ops.jump, *cc.block(1, 2));
        assert_eq!(ops.hat_p_to_mortar, *cc.block(2, 0));
        assert_eq!(ops.mortar_to_bc.nrows(), grid_h.num_faces);
        assert_eq!(ops.check_p_to_mortar.ncols(), grid_l.num_cells);
    }

    #[test]
    fn empty_projection_row_is_rejected() {
        let (grid_h, data_h, grid_l, interface) = matrix_fracture_interface(1.0);
        // rebuild the interface with a projection that misses one mortar cell
        let mut hat_p = nas::CooMatrix::new(2, grid_h.num_faces);
        hat_p.push(0, 3, 1.0);
        let mortar = MortarGrid::new(
            interface.mortar.cell_volumes.clone(),
            nas::CsrMatrix::from(&hat_p),
            interface.mortar.low_to_mortar_avg.clone(),
        )
        .unwrap();
        let mut degenerate =
            MortarInterface::new(mortar, interface.normal_permeability.clone()).unwrap();

        assert!(matches!(
            degenerate.assemble(&grid_h, &data_h, &grid_l),
            Err(CouplingError::DegenerateMortarProjection { cell: 1 })
        ));
    }

    #[test]
    fn undiscretized_data_is_rejected() {
        let (grid_h, _, grid_l, mut interface) = matrix_fracture_interface(1.0);
        let blank = FlowData::new(&grid_h);
        assert!(matches!(
            interface.assemble(&grid_h, &blank, &grid_l),
            Err(CouplingError::MissingDiscretization)
        ));
    }
}
