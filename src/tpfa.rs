//! The two-point flux approximation:
//! face transmissibilities, the flux and boundary operators,
//! and the cell-centered system matrix and right-hand side for one grid.

use fixedbitset as fb;
use log::warn;
use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    grid::Grid,
    params::{FlowData, PermeabilityTensor},
    Vec3,
};

/// Errors in discretizing or assembling a single grid.
#[derive(thiserror::Error, Debug)]
pub enum TpfaError {
    /// Assembly was requested on a record that has not been discretized.
    #[error("the grid has no discretization; call discretize first")]
    MissingDiscretization,
    /// Degenerate geometry or a singular tensor contraction
    /// produced a non-finite transmissibility.
    #[error("non-finite transmissibility on face {face}")]
    NonFiniteTransmissibility {
        /// Index of the degenerate face.
        face: usize,
    },
    /// A per-cell input array does not have one entry per cell.
    #[error("`{name}` has {found} entries, expected one per cell ({expected})")]
    CellDataLength {
        /// Name of the offending input.
        name: &'static str,
        /// The grid's cell count.
        expected: usize,
        /// Entry count actually supplied.
        found: usize,
    },
    /// The boundary value vector does not have one entry per face.
    #[error("boundary values have {found} entries, expected one per face ({expected})")]
    BoundaryValueLength {
        /// The grid's face count.
        expected: usize,
        /// Entry count actually supplied.
        found: usize,
    },
}

/// The sparse operators produced by [`discretize`],
/// written into [`FlowData::discretization`].
#[derive(Clone, Debug, PartialEq)]
pub struct TpfaDiscretization {
    /// Map from cell pressures to face fluxes (face rows, cell columns).
    pub flux: nas::CsrMatrix<f64>,
    /// Diagonal map from boundary values to induced face fluxes.
    pub bound_flux: nas::CsrMatrix<f64>,
    /// Cell-pressure contribution to the pressure trace on faces
    /// (face rows, cell columns).
    pub bound_pressure_cell: nas::CsrMatrix<f64>,
    /// Boundary-value contribution to the pressure trace on faces (diagonal).
    ///
    /// The sum of this operator applied to the boundary values
    /// and [`bound_pressure_cell`][Self::bound_pressure_cell]
    /// applied to the cell pressures reconstructs the pressure on any face.
    pub bound_pressure_face: nas::CsrMatrix<f64>,
}

impl TpfaDiscretization {
    /// The trivial operators of a zero-dimensional point grid.
    fn trivial() -> Self {
        Self {
            flux: nas::CsrMatrix::zeros(1, 1),
            bound_flux: nas::CsrMatrix::zeros(1, 1),
            bound_pressure_cell: nas::CsrMatrix::zeros(1, 1),
            bound_pressure_face: nas::CsrMatrix::zeros(1, 1),
        }
    }
}

/// One-sided transmissibility contribution of a single adjacent cell,
/// before harmonic averaging.
///
/// `n` is the outward face normal scaled by area (and aperture, if any),
/// `fc_cc` the displacement from cell center to face center.
pub(crate) fn half_transmissibility(
    k: &na::Matrix3<f64>,
    n: &Vec3,
    fc_cc: &Vec3,
    aavatsmark: bool,
) -> f64 {
    let nk = k * n;
    if aavatsmark {
        nk.norm() / fc_cc.norm()
    } else {
        nk.dot(fc_cc) / fc_cc.norm_squared()
    }
}

/// Discretize the second-order elliptic equation on one grid with two-point flux.
///
/// Computes fluxes over faces in terms of the pressures in the one or two
/// adjacent cells and writes the resulting operators into
/// `data.discretization`; see [`TpfaDiscretization`] for their meaning.
///
/// A missing permeability tensor defaults to identity with a logged warning.
/// If `active_faces` is given, faces outside the set get zero transmissibility
/// and thus carry no flux; this is used to exclude faces from assembly
/// entirely, e.g. fracture intersections without flow.
///
/// A zero-dimensional grid short-circuits to trivial operators.
pub fn discretize(
    grid: &Grid,
    data: &mut FlowData,
    active_faces: Option<&fb::FixedBitSet>,
) -> Result<(), TpfaError> {
    let discr = if grid.dim == 0 {
        TpfaDiscretization::trivial()
    } else {
        compute_operators(grid, data, active_faces)?
    };
    data.discretization = Some(discr);
    Ok(())
}

fn compute_operators(
    grid: &Grid,
    data: &FlowData,
    active_faces: Option<&fb::FixedBitSet>,
) -> Result<TpfaDiscretization, TpfaError> {
    let num_faces = grid.num_faces;
    let num_cells = grid.num_cells;

    let default_permeability;
    let perm = match &data.permeability {
        Some(k) => k,
        None => {
            warn!("no permeability tensor given, assuming identity");
            default_permeability = PermeabilityTensor::identity(num_cells);
            &default_permeability
        }
    };
    if perm.cell_count() != num_cells {
        return Err(TpfaError::CellDataLength {
            name: "permeability",
            expected: num_cells,
            found: perm.cell_count(),
        });
    }
    if let Some(aperture) = &data.aperture {
        if aperture.len() != num_cells {
            return Err(TpfaError::CellDataLength {
                name: "aperture",
                expected: num_cells,
                found: aperture.len(),
            });
        }
    }
    let aavatsmark = data.config.aavatsmark_transmissibilities;

    // half-transmissibility per (face, cell) incidence,
    // accumulated into the harmonic average per face
    let entries: Vec<(usize, usize, f64)> = grid.incidence().collect();
    let mut recip_t = vec![0.0; num_faces];
    for &(face, cell, sgn) in &entries {
        let aperture = data.aperture.as_ref().map_or(1.0, |a| a[cell]);
        let n = grid.face_normals[face] * (sgn * aperture);
        let fc_cc = grid.face_centers[face] - grid.cell_centers[cell];
        recip_t[face] += 1.0 / half_transmissibility(perm.cell(cell), &n, &fc_cc, aavatsmark);
    }
    // full transmissibilities, kept for the pressure trace on boundary faces
    let t_full: Vec<f64> = recip_t.iter().map(|r| 1.0 / r).collect();

    // Neumann and inactive faces carry no pressure-driven flux
    let mut t = t_full.clone();
    for (face, t) in t.iter_mut().enumerate() {
        let inactive = active_faces.map_or(false, |set| !set.contains(face));
        if data.bc.is_neumann(face) || inactive {
            *t = 0.0;
        }
    }

    let mut flux = nas::CooMatrix::new(num_faces, num_cells);
    for &(face, cell, sgn) in &entries {
        let value = t[face] * sgn;
        if !value.is_finite() {
            return Err(TpfaError::NonFiniteTransmissibility { face });
        }
        flux.push(face, cell, value);
    }

    let mut bound_flux = nas::CooMatrix::new(num_faces, num_faces);
    let mut trace_weight = na::DVector::zeros(num_faces);
    for face in grid.boundary_faces().ones() {
        let (_, sgn) = grid
            .face_neighbor(face)
            .expect("boundary faces have exactly one adjacent cell");
        if data.bc.is_dirichlet(face) {
            if !t_full[face].is_finite() {
                return Err(TpfaError::NonFiniteTransmissibility { face });
            }
            bound_flux.push(face, face, -t_full[face] * sgn);
            // on Dirichlet faces the trace is the boundary value itself
            trace_weight[face] = 1.0;
        } else {
            // prescribed fluxes pass through unmodified
            bound_flux.push(face, face, sgn);
            // on Neumann faces the trace follows from the half-transmissibility
            let weight = -1.0 / t_full[face];
            if !weight.is_finite() {
                return Err(TpfaError::NonFiniteTransmissibility { face });
            }
            trace_weight[face] = weight;
        }
    }

    let mut bound_pressure_cell = nas::CooMatrix::new(num_faces, num_cells);
    for &(face, cell, _) in &entries {
        if data.bc.is_neumann(face) {
            bound_pressure_cell.push(face, cell, 1.0);
        }
    }

    Ok(TpfaDiscretization {
        flux: nas::CsrMatrix::from(&flux),
        bound_flux: nas::CsrMatrix::from(&bound_flux),
        bound_pressure_cell: nas::CsrMatrix::from(&bound_pressure_cell),
        bound_pressure_face: diag_csr(&trace_weight),
    })
}

/// Assemble the discretization matrix and right-hand side for one grid,
/// discretizing first if the record holds no operators yet.
///
/// The matrix is `divergence * flux` (one row per cell, touching only
/// face-sharing neighbors); the right-hand side carries the boundary
/// conditions. Source terms are the caller's concern.
pub fn matrix_rhs(
    grid: &Grid,
    data: &mut FlowData,
) -> Result<(nas::CsrMatrix<f64>, na::DVector<f64>), TpfaError> {
    if data.discretization.is_none() {
        discretize(grid, data, None)?;
    }
    assemble(grid, data)
}

/// Assemble the discretization matrix and right-hand side
/// from previously computed operators.
///
/// Fails with [`TpfaError::MissingDiscretization`] if [`discretize`]
/// has not been called on this record.
pub fn assemble(
    grid: &Grid,
    data: &FlowData,
) -> Result<(nas::CsrMatrix<f64>, na::DVector<f64>), TpfaError> {
    let discr = data
        .discretization
        .as_ref()
        .ok_or(TpfaError::MissingDiscretization)?;

    if grid.dim == 0 {
        return Ok((nas::CsrMatrix::zeros(1, 1), na::DVector::zeros(1)));
    }
    if data.bc_values.len() != grid.num_faces {
        return Err(TpfaError::BoundaryValueLength {
            expected: grid.num_faces,
            found: data.bc_values.len(),
        });
    }

    let div = grid.scalar_divergence();
    let matrix = &div * &discr.flux;
    let boundary_flux = &discr.bound_flux * &data.bc_values;
    let rhs = -(&div * &boundary_flux);
    Ok((matrix, rhs))
}

/// Build a diagonal CSR matrix from a dense diagonal.
pub(crate) fn diag_csr(diagonal: &na::DVector<f64>) -> nas::CsrMatrix<f64> {
    // construct an identity matrix to get the right sparsity pattern
    // and then replace the entries
    let mut csr = nas::CsrMatrix::identity(diagonal.len());
    for (&diag, mat_diag) in diagonal.iter().zip(csr.values_mut()) {
        *mat_diag = diag;
    }
    csr
}
