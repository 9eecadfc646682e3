//! Finite-volume discretization of second-order elliptic equations
//! (Darcy flow, or any analogous diffusion process)
//! on general polyhedral grids using the two-point flux approximation (TPFA),
//! including the couplings needed for mixed-dimensional domains
//! such as fractured porous media.
//!
//! The crate covers three pieces:
//! - the single-grid discretizer in [`tpfa`]:
//!   face transmissibilities from geometry and permeability,
//!   the flux and boundary-flux operators,
//!   operators reconstructing the pressure trace on faces,
//!   and the cell-centered system matrix and right-hand side;
//! - the mortar coupling in [`coupling::mortar`],
//!   which ties the flux balance of a higher-dimensional grid
//!   to the mass balance of a lower-dimensional one
//!   through an interface flux variable on a mortar grid;
//! - the direct coupling in [`coupling::dfn`]
//!   for discrete fracture networks,
//!   where flux continuity across the interface is exact
//!   and no mortar variable exists.
//!
//! Grid construction, the permeability and boundary-condition containers,
//! and the global assembly loop over a mixed-dimensional hierarchy
//! are the caller's concern; this crate consumes a [`Grid`]
//! with precomputed geometry and writes its results
//! into the mutable per-grid [`FlowData`] and per-interface records.

#![warn(missing_docs)]

pub mod grid;
#[doc(inline)]
pub use grid::{Grid, GridError, MortarGrid};

pub mod params;
#[doc(inline)]
pub use params::{BoundaryConditions, FlowData, PermeabilityTensor, TpfaConfig};

pub mod tpfa;
#[doc(inline)]
pub use tpfa::{TpfaDiscretization, TpfaError};

pub mod coupling;
#[doc(inline)]
pub use coupling::{
    BlockMatrix, Coupling, CouplingError, DfnInterface, DfnOperators, MortarInterface,
    MortarOperators,
};

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a 3D `nalgebra` vector.
///
/// Geometric quantities are stored as 3-vectors regardless of grid dimension;
/// lower-dimensional grids leave the trailing components at zero.
pub type Vec3 = na::Vector3<f64>;
