//! Kohn-Sham density functional theory over contracted cartesian gaussians.
//!
//! One electron integrals are evaluated analytically with the McMurchie-Davidson
//! scheme ([`integrals`]), contracted and normalized ([`contraction`]) and combined
//! with a density dependent potential integrated on a grid ([`hamiltonian`]). The
//! self consistent field is a fixed point of the density matrix, found by
//! [`equilibrium::EquilibriumSolver`], which can also differentiate the fixed point
//! implicitly.
pub mod atom;
pub mod basis;
pub mod config;
pub mod contraction;
pub mod equilibrium;
pub mod error;
pub mod functional;
pub mod grid;
pub mod hamiltonian;
pub mod integrals;
pub mod ks;
pub mod molecule;

pub use error::{DftError, Result};
