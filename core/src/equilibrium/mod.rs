//! Fixed point iteration with implicit differentiation of the result.
//!
//! The forward pass is [`EquilibriumSolver::solve`]. Gradients of a loss at the fixed
//! point flow back through [`backward_through_fixed_point`], which solves one linear
//! fixed point equation on the transposed Jacobian instead of replaying the forward
//! iterations.

mod diis;
mod options;
mod solver;

pub use options::{Acceleration, SolverOptions};
pub use solver::{
    backward_through_fixed_point, DifferentiableMap, EquilibriumSolver, FixedPoint,
    FixedPointMap, ImplicitGradient, SolverState,
};
