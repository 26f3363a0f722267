use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::PrimitiveGaussian;

/// Function of the form K*x^i*y^j*z^k*exp(-alpha*r^2), relative to the center of
/// the basis function it belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub exponent: f64,
    /// The coefficient of this gaussian and optionally the normalization constant
    pub coefficient: f64,
    /// (i, j, k) exponents of polynomial terms
    pub angular: (i32, i32, i32),
}

impl Gaussian {
    /// Normalization constant of a single cartesian gaussian, such that its self
    /// overlap is one.
    pub fn norm(exponent: f64, angular: (i32, i32, i32)) -> f64 {
        let (i, j, k) = angular;

        (std::f64::consts::FRAC_2_PI * exponent)
            .powi(3)
            .sqrt()
            .sqrt()
            * f64::sqrt(
                (8.0 * exponent).powi(i + j + k)
                    * factorial_ratio(i)
                    * factorial_ratio(j)
                    * factorial_ratio(k),
            )
    }
}

/// i! / (2i)!
fn factorial_ratio(i: i32) -> f64 {
    (i + 1..=2 * i).map(|x| x as f64).product::<f64>().recip()
}

/// Linear combination of many [`Gaussian`]s
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractedGaussian(pub SmallVec<[Gaussian; 6]>);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasisFunction {
    pub contracted_gaussian: ContractedGaussian,
    /// The position of this basis function, in natural units
    pub position: Vector3<f64>,
}

impl BasisFunction {
    /// The primitives of this function, placed at its position
    pub fn primitives(&self) -> impl Iterator<Item = PrimitiveGaussian> + '_ {
        let ContractedGaussian(gaussians) = &self.contracted_gaussian;
        gaussians
            .iter()
            .map(|&gaussian| PrimitiveGaussian::from_gaussian(gaussian, self.position))
    }

    pub fn n_primitives(&self) -> usize {
        self.contracted_gaussian.0.len()
    }

    /// Evaluate this basis function at a given position. The value is not
    /// renormalized; see [`crate::contraction::Contraction`] for that.
    pub fn evaluate(&self, at: Vector3<f64>) -> f64 {
        self.primitives()
            .map(|primitive| primitive.coefficient * primitive.evaluate(at))
            .sum()
    }
}
