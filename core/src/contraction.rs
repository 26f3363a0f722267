//! Contraction of primitive-indexed arrays into basis-function-indexed arrays.
//!
//! A basis function is a fixed linear combination of a group of consecutive
//! primitives. Groups either all have the same size ([`ContractionGrouping::Uniform`])
//! or have individual sizes ([`ContractionGrouping::Ragged`]).
use nalgebra::{DMatrix, DVector};

use crate::{
    error::{DftError, Result},
    integrals::PrimitiveIntegrals,
};

/// Smallest contracted self overlap that is still used for normalization.
const MIN_SELF_OVERLAP: f64 = 1e-14;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractionGrouping {
    /// every basis function has this many primitives
    Uniform(usize),
    /// primitive count of each basis function, in order
    Ragged(Vec<usize>),
}

impl ContractionGrouping {
    /// Checks that the grouping partitions exactly `n_primitives` primitives into
    /// non-empty groups.
    pub fn validate(&self, n_primitives: usize) -> Result<()> {
        match self {
            &Self::Uniform(0) => {
                if n_primitives == 0 {
                    Ok(())
                } else {
                    Err(DftError::EmptyGroup { index: 0 })
                }
            }
            &Self::Uniform(size) if n_primitives % size != 0 => Err(DftError::GroupingMismatch {
                expected: n_primitives,
                found: (n_primitives / size + 1) * size,
            }),
            Self::Uniform(_) => Ok(()),
            Self::Ragged(sizes) => {
                if let Some(index) = sizes.iter().position(|&size| size == 0) {
                    return Err(DftError::EmptyGroup { index });
                }

                let found = sizes.iter().sum::<usize>();
                if found != n_primitives {
                    return Err(DftError::GroupingMismatch {
                        expected: n_primitives,
                        found,
                    });
                }
                Ok(())
            }
        }
    }

    /// Number of basis functions the grouping produces from `n_primitives` primitives.
    pub fn n_groups(&self, n_primitives: usize) -> usize {
        match self {
            Self::Uniform(0) => 0,
            Self::Uniform(size) => n_primitives / size,
            Self::Ragged(sizes) => sizes.len(),
        }
    }

    /// The group each of `n_primitives` primitives belongs to.
    pub fn group_indices(&self, n_primitives: usize) -> Vec<usize> {
        match self {
            Self::Uniform(0) => Vec::new(),
            &Self::Uniform(size) => (0..n_primitives).map(|p| p / size).collect(),
            Self::Ragged(sizes) => sizes
                .iter()
                .enumerate()
                .flat_map(|(group, &size)| std::iter::repeat(group).take(size))
                .collect(),
        }
    }

    /// Sums the rows of `array` within each group. The array has one row per
    /// primitive and any number of columns; the result has one row per group.
    pub fn contract_rows(&self, array: &DMatrix<f64>) -> DMatrix<f64> {
        let ncols = array.ncols();

        match self {
            Self::Uniform(0) => DMatrix::zeros(0, ncols),
            &Self::Uniform(size) => {
                let n_groups = array.nrows() / size;
                DMatrix::from_fn(n_groups, ncols, |group, col| {
                    array.view((group * size, col), (size, 1)).sum()
                })
            }
            Self::Ragged(sizes) => {
                // cumulative sum over rows, differenced at the group boundaries
                let mut cumulative = array.clone();
                for row in 1..cumulative.nrows() {
                    for col in 0..ncols {
                        cumulative[(row, col)] += cumulative[(row - 1, col)];
                    }
                }

                let mut output = DMatrix::zeros(sizes.len(), ncols);
                let mut end = 0;
                for (group, &size) in sizes.iter().enumerate() {
                    let start = end;
                    end += size;

                    for col in 0..ncols {
                        let upper = cumulative[(end - 1, col)];
                        let lower = if start == 0 {
                            0.0
                        } else {
                            cumulative[(start - 1, col)]
                        };
                        output[(group, col)] = upper - lower;
                    }
                }
                output
            }
        }
    }

    /// Contracts both indices of a primitive-pair matrix.
    pub fn contract_matrix(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        let rows = self.contract_rows(matrix);
        self.contract_rows(&rows.transpose()).transpose()
    }
}

/// Contraction coefficients, grouping and the normalization of the resulting
/// basis functions.
#[derive(Clone, Debug)]
pub struct Contraction {
    coefficients: DVector<f64>,
    grouping: ContractionGrouping,
    /// 1/sqrt(S_bb) of the unnormalized contracted functions
    norm: DVector<f64>,
}

impl Contraction {
    /// Builds the contraction and derives the normalization of each basis function
    /// from the primitive overlap matrix.
    pub fn new(
        coefficients: DVector<f64>,
        grouping: ContractionGrouping,
        primitive_overlap: &DMatrix<f64>,
    ) -> Result<Self> {
        let n_primitives = coefficients.len();
        grouping.validate(n_primitives)?;

        if primitive_overlap.shape() != (n_primitives, n_primitives) {
            return Err(DftError::LengthMismatch {
                what: "primitive overlap matrix",
                expected: n_primitives,
                found: primitive_overlap.nrows(),
            });
        }

        let mut contraction = Self {
            norm: DVector::from_element(grouping.n_groups(n_primitives), 1.0),
            coefficients,
            grouping,
        };

        let overlap = contraction.contract_unnormalized(primitive_overlap);
        contraction.norm = DVector::from_fn(overlap.nrows(), |b, _| {
            let self_overlap = overlap[(b, b)];
            if self_overlap < MIN_SELF_OVERLAP {
                log::warn!(
                    "basis function {b} has a near singular self overlap {self_overlap:e}, clamping"
                );
            }
            self_overlap.max(MIN_SELF_OVERLAP).sqrt().recip()
        });

        Ok(contraction)
    }

    pub fn norm(&self) -> &DVector<f64> {
        &self.norm
    }

    pub fn grouping(&self) -> &ContractionGrouping {
        &self.grouping
    }

    pub fn n_basis(&self) -> usize {
        self.norm.len()
    }

    /// For every primitive, the basis function it belongs to and its coefficient in
    /// the normalized function.
    pub fn primitive_weights(&self) -> Vec<(usize, f64)> {
        self.grouping
            .group_indices(self.coefficients.len())
            .into_iter()
            .zip(self.coefficients.iter())
            .map(|(group, &coefficient)| (group, coefficient * self.norm[group]))
            .collect()
    }

    fn contract_unnormalized(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        let weighted = DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
            matrix[(i, j)] * self.coefficients[i] * self.coefficients[j]
        });
        self.grouping.contract_matrix(&weighted)
    }

    /// Contracts a primitive-pair matrix into a normalized, symmetric basis-function
    /// matrix.
    pub fn contract(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        let contracted = self.contract_unnormalized(matrix);
        let normalized = DMatrix::from_fn(contracted.nrows(), contracted.ncols(), |i, j| {
            contracted[(i, j)] * self.norm[i] * self.norm[j]
        });
        symmetrize(&normalized)
    }

    /// Contracts primitive values sampled at points (one row per primitive, one column
    /// per point) into normalized basis-function values.
    pub fn contract_values(&self, values: &DMatrix<f64>) -> DMatrix<f64> {
        let weighted = DMatrix::from_fn(values.nrows(), values.ncols(), |p, r| {
            values[(p, r)] * self.coefficients[p]
        });
        let mut contracted = self.grouping.contract_rows(&weighted);
        for (mut row, &norm) in contracted.row_iter_mut().zip(self.norm.iter()) {
            row *= norm;
        }
        contracted
    }

    /// Contracts every matrix of a primitive integral set.
    pub fn contract_integrals(&self, primitive: &PrimitiveIntegrals) -> ContractedIntegrals {
        ContractedIntegrals {
            overlap: self.contract(&primitive.overlap),
            kinetic: self.contract(&primitive.kinetic),
            coulomb: primitive
                .coulomb
                .iter()
                .map(|matrix| self.contract(matrix))
                .collect(),
        }
    }
}

/// Basis-function-indexed one electron integrals. The coulomb matrices do not
/// include the nuclear charges.
#[derive(Clone, Debug)]
pub struct ContractedIntegrals {
    pub overlap: DMatrix<f64>,
    pub kinetic: DMatrix<f64>,
    pub coulomb: Vec<DMatrix<f64>>,
}

/// (M + M^T) / 2
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()) * 0.5
}
