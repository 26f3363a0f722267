use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    contraction::ContractionGrouping,
    error::{DftError, Result},
};

use super::{BasisFunction, Gaussian};

/// Largest total angular momentum i + j + k of a primitive the integral engine
/// accepts. A pair of primitives then needs Boys orders up to twice this.
pub const MAX_ANGULAR: i32 = 7;

/// A single positioned cartesian gaussian x^i*y^j*z^k*exp(-alpha*r^2) with its
/// contraction coefficient.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveGaussian {
    pub angular: (i32, i32, i32),
    pub exponent: f64,
    pub center: Vector3<f64>,
    pub coefficient: f64,
}

impl PrimitiveGaussian {
    pub fn new(
        angular: (i32, i32, i32),
        exponent: f64,
        center: Vector3<f64>,
        coefficient: f64,
    ) -> Self {
        Self {
            angular,
            exponent,
            center,
            coefficient,
        }
    }

    pub(crate) fn from_gaussian(gaussian: Gaussian, center: Vector3<f64>) -> Self {
        let Gaussian {
            exponent,
            coefficient,
            angular,
        } = gaussian;

        Self {
            angular,
            exponent,
            center,
            coefficient,
        }
    }

    /// Value of the bare primitive (without its coefficient) at a point.
    pub fn evaluate(&self, at: Vector3<f64>) -> f64 {
        let (i, j, k) = self.angular;
        let r = at - self.center;

        r.x.powi(i) * r.y.powi(j) * r.z.powi(k) * (-self.exponent * r.norm_squared()).exp()
    }

    pub(crate) fn angular_array(&self) -> [i32; 3] {
        let (i, j, k) = self.angular;
        [i, j, k]
    }
}

/// All primitives of a basis, flattened, together with how they group into
/// contracted basis functions.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveSet {
    primitives: Vec<PrimitiveGaussian>,
    grouping: ContractionGrouping,
}

impl PrimitiveSet {
    /// Validates and bundles a flat primitive list with its grouping.
    pub fn new(primitives: Vec<PrimitiveGaussian>, grouping: ContractionGrouping) -> Result<Self> {
        grouping.validate(primitives.len())?;

        for (index, primitive) in primitives.iter().enumerate() {
            if !(primitive.exponent.is_finite() && primitive.exponent > 0.0) {
                return Err(DftError::InvalidExponent {
                    index,
                    value: primitive.exponent,
                });
            }

            let [i, j, k] = primitive.angular_array();
            if i < 0 || j < 0 || k < 0 {
                return Err(DftError::InvalidConfig(format!(
                    "primitive {index} has negative cartesian powers ({i}, {j}, {k})"
                )));
            }
            if i + j + k > MAX_ANGULAR {
                return Err(DftError::AngularMomentumTooHigh {
                    found: i + j + k,
                    max: MAX_ANGULAR,
                });
            }
        }

        Ok(Self {
            primitives,
            grouping,
        })
    }

    /// Flattens a list of contracted basis functions. If every function has the same
    /// number of primitives the grouping is uniform, otherwise it is ragged.
    pub fn from_basis(basis: &[BasisFunction]) -> Result<Self> {
        let sizes = basis
            .iter()
            .map(BasisFunction::n_primitives)
            .collect::<Vec<_>>();

        let grouping = match sizes.first() {
            Some(&first) if sizes.iter().all(|&size| size == first) => {
                ContractionGrouping::Uniform(first)
            }
            _ => ContractionGrouping::Ragged(sizes),
        };

        let primitives = basis
            .iter()
            .flat_map(BasisFunction::primitives)
            .collect::<Vec<_>>();

        Self::new(primitives, grouping)
    }

    pub fn primitives(&self) -> &[PrimitiveGaussian] {
        &self.primitives
    }

    pub fn grouping(&self) -> &ContractionGrouping {
        &self.grouping
    }

    pub fn coefficients(&self) -> impl Iterator<Item = f64> + '_ {
        self.primitives.iter().map(|primitive| primitive.coefficient)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn n_basis(&self) -> usize {
        self.grouping.n_groups(self.primitives.len())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use smallvec::smallvec;

    use super::{PrimitiveGaussian, PrimitiveSet};
    use crate::{
        basis::{BasisFunction, ContractedGaussian, Gaussian},
        contraction::ContractionGrouping,
        error::DftError,
    };

    fn s_function(exponents: &[f64]) -> BasisFunction {
        BasisFunction {
            contracted_gaussian: ContractedGaussian(
                exponents
                    .iter()
                    .map(|&exponent| Gaussian {
                        exponent,
                        coefficient: 1.0,
                        angular: (0, 0, 0),
                    })
                    .collect(),
            ),
            position: Vector3::zeros(),
        }
    }

    #[test]
    fn uniform_grouping_detected() {
        let set = PrimitiveSet::from_basis(&[s_function(&[1.0, 2.0]), s_function(&[3.0, 4.0])])
            .unwrap();
        assert_eq!(set.grouping(), &ContractionGrouping::Uniform(2));
        assert_eq!(set.n_basis(), 2);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn ragged_grouping_detected() {
        let set =
            PrimitiveSet::from_basis(&[s_function(&[1.0, 2.0, 3.0]), s_function(&[4.0])]).unwrap();
        assert_eq!(set.grouping(), &ContractionGrouping::Ragged(vec![3, 1]));
        assert_eq!(set.n_basis(), 2);
    }

    #[test]
    fn rejects_bad_exponent() {
        let primitives = vec![PrimitiveGaussian::new((0, 0, 0), -1.0, Vector3::zeros(), 1.0)];
        assert!(matches!(
            PrimitiveSet::new(primitives, ContractionGrouping::Uniform(1)),
            Err(DftError::InvalidExponent { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_high_angular_momentum() {
        let primitives = vec![PrimitiveGaussian::new((8, 0, 0), 1.0, Vector3::zeros(), 1.0)];
        assert!(matches!(
            PrimitiveSet::new(primitives, ContractionGrouping::Uniform(1)),
            Err(DftError::AngularMomentumTooHigh { found: 8, .. })
        ));

        // the cap is on i + j + k, not on each power
        let primitives = vec![PrimitiveGaussian::new((7, 7, 7), 1.0, Vector3::zeros(), 1.0)];
        assert!(matches!(
            PrimitiveSet::new(primitives, ContractionGrouping::Uniform(1)),
            Err(DftError::AngularMomentumTooHigh { found: 21, max: 7 })
        ));

        let primitives = vec![PrimitiveGaussian::new((3, 2, 2), 1.0, Vector3::zeros(), 1.0)];
        assert!(PrimitiveSet::new(primitives, ContractionGrouping::Uniform(1)).is_ok());
    }

    #[test]
    fn rejects_negative_powers() {
        let primitives = vec![PrimitiveGaussian::new((1, -1, 0), 1.0, Vector3::zeros(), 1.0)];
        assert!(matches!(
            PrimitiveSet::new(primitives, ContractionGrouping::Uniform(1)),
            Err(DftError::InvalidConfig(_))
        ));
    }

    #[test]
    fn grouping_must_cover_all_primitives() {
        let function = BasisFunction {
            contracted_gaussian: ContractedGaussian(smallvec![Gaussian {
                exponent: 1.0,
                coefficient: 1.0,
                angular: (0, 0, 0),
            }]),
            position: Vector3::zeros(),
        };
        let primitives = function.primitives().collect::<Vec<_>>();

        assert!(matches!(
            PrimitiveSet::new(primitives, ContractionGrouping::Ragged(vec![2])),
            Err(DftError::GroupingMismatch {
                expected: 1,
                found: 2
            })
        ));
    }
}
