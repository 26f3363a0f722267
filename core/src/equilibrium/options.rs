//! Configuration of the fixed point iteration.

use crate::error::{DftError, Result};

/// How successive iterates are combined before the next application of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceleration {
    /// y <- (1 - damping) y + damping f(y)
    None,
    /// Pulay extrapolation over the last `history` residuals
    Diis { history: usize },
}

/// Numerical settings of [`super::EquilibriumSolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// The iteration stops once the root mean square of f(y) - y falls below this.
    pub tolerance: f64,
    /// Upper bound on map applications. Reaching it is not an error, the solver
    /// reports [`super::SolverState::Exhausted`] with the last iterate.
    pub max_iterations: u32,
    /// Mixing factor in (0, 1]. One means plain fixed point iteration.
    pub damping: f64,
    pub acceleration: Acceleration,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-8,
            max_iterations: 200,
            damping: 1.0,
            acceleration: Acceleration::None,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DftError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }

        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(DftError::InvalidConfig(format!(
                "damping must lie in (0, 1], got {}",
                self.damping
            )));
        }

        if let Acceleration::Diis { history } = self.acceleration {
            if history < 2 {
                return Err(DftError::InvalidConfig(format!(
                    "diis needs a history of at least 2, got {history}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Acceleration, SolverOptions};

    #[test]
    fn defaults_are_valid() {
        let options = SolverOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.max_iterations, 200);
        assert_eq!(options.acceleration, Acceleration::None);
    }

    #[test]
    fn invalid_options_rejected() {
        let invalid = [
            SolverOptions {
                tolerance: 0.0,
                ..Default::default()
            },
            SolverOptions {
                damping: 1.5,
                ..Default::default()
            },
            SolverOptions {
                damping: 0.0,
                ..Default::default()
            },
            SolverOptions {
                acceleration: Acceleration::Diis { history: 1 },
                ..Default::default()
            },
        ];

        for options in invalid {
            assert!(options.validate().is_err(), "{options:?} should be rejected");
        }
    }
}
