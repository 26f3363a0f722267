use nalgebra::DVector;

use crate::error::{DftError, Result};

use super::{
    diis::Diis,
    options::{Acceleration, SolverOptions},
};

/// An update map y -> f(y) whose fixed point is sought.
pub trait FixedPointMap {
    fn apply(&self, state: &DVector<f64>) -> Result<DVector<f64>>;
}

/// A map f(y, theta) that can pull cotangents back through its two inputs.
pub trait DifferentiableMap: FixedPointMap {
    /// J_y^T v, with J_y = df/dy at `state`
    fn state_vjp(&self, state: &DVector<f64>, cotangent: &DVector<f64>) -> Result<DVector<f64>>;

    /// J_theta^T v, with J_theta = df/dtheta at `state`
    fn parameter_vjp(
        &self,
        state: &DVector<f64>,
        cotangent: &DVector<f64>,
    ) -> Result<DVector<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Iterating,
    Converged,
    /// The iteration budget ran out before the residual met the tolerance.
    Exhausted,
}

/// Terminal iterate of a fixed point iteration. Only the last state is kept.
#[derive(Debug, Clone)]
pub struct FixedPoint {
    pub state: DVector<f64>,
    pub solver_state: SolverState,
    pub iterations: u32,
    /// rms of f(y) - y at the last iteration
    pub residual: f64,
}

impl FixedPoint {
    pub fn is_converged(&self) -> bool {
        self.solver_state == SolverState::Converged
    }
}

/// Gradient of a scalar loss with respect to the map parameters, through the
/// fixed point.
#[derive(Debug, Clone)]
pub struct ImplicitGradient {
    /// dL/dtheta
    pub parameters: DVector<f64>,
    /// Solution u of u = g + J_y^T u
    pub adjoint: DVector<f64>,
    pub solver_state: SolverState,
    pub iterations: u32,
}

/// Drives a [`FixedPointMap`] to its fixed point and differentiates the result
/// implicitly.
///
/// ```
/// use dft_core::equilibrium::{EquilibriumSolver, FixedPointMap, SolverOptions};
/// use dft_core::error::Result;
/// use nalgebra::DVector;
///
/// struct Halve;
///
/// impl FixedPointMap for Halve {
///     fn apply(&self, state: &DVector<f64>) -> Result<DVector<f64>> {
///         Ok(state * 0.5 + DVector::from_element(state.len(), 1.0))
///     }
/// }
///
/// let solver = EquilibriumSolver::new().with_options(SolverOptions {
///     tolerance: 1e-12,
///     ..Default::default()
/// });
/// let result = solver.solve(&Halve, DVector::zeros(2)).unwrap();
/// assert!(result.is_converged());
/// assert!((result.state[0] - 2.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EquilibriumSolver {
    options: SolverOptions,
}

impl EquilibriumSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Iterates `map` from `initial` until the residual meets the tolerance or the
    /// iteration budget is spent.
    pub fn solve(&self, map: &impl FixedPointMap, initial: DVector<f64>) -> Result<FixedPoint> {
        self.options.validate()?;

        let SolverOptions {
            tolerance,
            max_iterations,
            damping,
            acceleration,
        } = self.options;

        let mut diis = match acceleration {
            Acceleration::None => None,
            Acceleration::Diis { history } => Some(Diis::new(history)),
        };

        let mut state = initial;
        let mut residual = f64::INFINITY;
        let mut solver_state = SolverState::Iterating;
        let mut iterations = 0;

        while solver_state == SolverState::Iterating {
            if iterations == max_iterations {
                solver_state = SolverState::Exhausted;
                break;
            }
            iterations += 1;

            let update = map.apply(&state)?;
            check_len(&update, &state)?;

            let difference = &update - &state;
            residual = rms(&difference);
            log::info!("iteration {iterations:<4} - residual {residual:1.4e}");

            if residual < tolerance {
                state = update;
                solver_state = SolverState::Converged;
                break;
            }

            let candidate = match diis.as_mut() {
                Some(diis) => diis.extrapolate(difference, update.clone()).unwrap_or(update),
                None => update,
            };

            state = if damping == 1.0 {
                candidate
            } else {
                state * (1.0 - damping) + candidate * damping
            };
        }

        if solver_state == SolverState::Exhausted {
            log::warn!(
                "fixed point iteration did not converge in {max_iterations} iterations, residual {residual:1.4e}"
            );
        }

        Ok(FixedPoint {
            state,
            solver_state,
            iterations,
            residual,
        })
    }

    /// Pulls `output_gradient` (dL/dy at the fixed point) back to the map
    /// parameters.
    pub fn backward(
        &self,
        map: &impl DifferentiableMap,
        fixed_point: &FixedPoint,
        output_gradient: &DVector<f64>,
    ) -> Result<ImplicitGradient> {
        backward_through_fixed_point(map, &fixed_point.state, output_gradient, &self.options)
    }
}

/// Implicit function gradient of a fixed point y* = f(y*, theta).
///
/// Differentiating y* = f(y*, theta) gives dL/dtheta = J_theta^T u with
/// u = (I - J_y^T)^-1 g, where g = dL/dy*. The adjoint u is found as the fixed point
/// of u -> g + J_y^T u, which contracts whenever the forward map does. No iterate of
/// the forward solve is needed.
pub fn backward_through_fixed_point(
    map: &impl DifferentiableMap,
    fixed_point: &DVector<f64>,
    output_gradient: &DVector<f64>,
    options: &SolverOptions,
) -> Result<ImplicitGradient> {
    options.validate()?;
    check_len(output_gradient, fixed_point)?;

    let mut adjoint = output_gradient.clone();
    let mut solver_state = SolverState::Iterating;
    let mut iterations = 0;

    while solver_state == SolverState::Iterating {
        if iterations == options.max_iterations {
            solver_state = SolverState::Exhausted;
            log::warn!(
                "adjoint iteration did not converge in {} iterations",
                options.max_iterations
            );
            break;
        }
        iterations += 1;

        let pulled = map.state_vjp(fixed_point, &adjoint)?;
        check_len(&pulled, &adjoint)?;
        let next = output_gradient + pulled;

        let residual = rms(&(&next - &adjoint));
        log::debug!("adjoint iteration {iterations:<4} - residual {residual:1.4e}");

        adjoint = next;
        if residual < options.tolerance {
            solver_state = SolverState::Converged;
        }
    }

    let parameters = map.parameter_vjp(fixed_point, &adjoint)?;

    Ok(ImplicitGradient {
        parameters,
        adjoint,
        solver_state,
        iterations,
    })
}

fn rms(vector: &DVector<f64>) -> f64 {
    if vector.is_empty() {
        return 0.0;
    }
    (vector.norm_squared() / vector.len() as f64).sqrt()
}

fn check_len(found: &DVector<f64>, expected: &DVector<f64>) -> Result<()> {
    if found.len() != expected.len() {
        return Err(DftError::LengthMismatch {
            what: "fixed point state",
            expected: expected.len(),
            found: found.len(),
        });
    }
    Ok(())
}
