mod boys_function;
mod hermite;
mod mmd;

use nalgebra::DMatrix;

pub use boys_function::{boys_derivative, boys_function, boys_function_batch, BOYS_EPSILON};
pub use mmd::IntegralEngine;

pub(crate) use mmd::weighted_sum;

/// Primitive-indexed one electron integrals. Every matrix is square with one row per
/// primitive; `coulomb` holds one matrix per nucleus, for a unit charge.
#[derive(Clone, Debug)]
pub struct PrimitiveIntegrals {
    pub overlap: DMatrix<f64>,
    pub kinetic: DMatrix<f64>,
    pub coulomb: Vec<DMatrix<f64>>,
}
