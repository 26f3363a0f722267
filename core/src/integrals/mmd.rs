//! McMurchie Davidson integration scheme over primitive cartesian gaussians.
//! Reference:
//!
//! [1] Goings, J. Integrals. https://joshuagoings.com/2017/04/28/integrals/
use std::f64::consts::PI;

use nalgebra::{DMatrix, Vector3};

use crate::{
    atom::AtomCenter,
    basis::{PrimitiveGaussian, PrimitiveSet},
    error::Result,
};

use super::{
    hermite::{HermiteCoulomb, HermiteExpansion},
    PrimitiveIntegrals,
};

/// Computes one electron integrals for every pair of primitives of a basis.
///
/// All hermite caches are created per primitive pair inside a single call and
/// dropped before the call returns, so an engine can be reused freely.
#[derive(Debug, Clone)]
pub struct IntegralEngine {
    primitives: Vec<PrimitiveGaussian>,
    nuclei: Vec<AtomCenter>,
}

impl IntegralEngine {
    /// The primitive set is validated on construction, so an engine never sees
    /// malformed input.
    pub fn new(primitives: &PrimitiveSet, nuclei: &[AtomCenter]) -> Self {
        Self {
            primitives: primitives.primitives().to_vec(),
            nuclei: nuclei.to_vec(),
        }
    }

    /// Like [`IntegralEngine::new`], with the nuclei given as separate position and
    /// charge arrays.
    pub fn from_arrays(
        primitives: &PrimitiveSet,
        positions: &[Vector3<f64>],
        charges: &[f64],
    ) -> Result<Self> {
        let nuclei = AtomCenter::from_arrays(positions, charges)?;
        Ok(Self::new(primitives, &nuclei))
    }

    pub fn n_primitives(&self) -> usize {
        self.primitives.len()
    }

    pub fn nuclei(&self) -> &[AtomCenter] {
        &self.nuclei
    }

    /// Primitive overlap matrix.
    pub fn overlap(&self) -> DMatrix<f64> {
        let [overlap] = self.pair_matrices::<1>(|a, b, expansion| {
            [primitive_overlap(expansion, a.angular_array(), b.angular_array())]
        });
        overlap
    }

    /// Primitive kinetic energy matrix.
    pub fn kinetics(&self) -> DMatrix<f64> {
        let [kinetic] = self.pair_matrices::<1>(|a, b, expansion| {
            [primitive_kinetic(expansion, a.angular_array(), b.angular_array())]
        });
        kinetic
    }

    /// One primitive nuclear attraction matrix per nucleus, for a unit positive
    /// charge at the nucleus position.
    pub fn coulomb(&self) -> Vec<DMatrix<f64>> {
        let n = self.primitives.len();
        let mut matrices = vec![DMatrix::zeros(n, n); self.nuclei.len()];
        let centers = self.nuclear_positions();

        for (a, b, values) in self.pair_rows(|a, b, expansion| {
            primitive_coulomb(expansion, a.angular_array(), b.angular_array(), &centers)
        }) {
            for (matrix, value) in matrices.iter_mut().zip(values) {
                matrix[(a, b)] = value;
                matrix[(b, a)] = value;
            }
        }

        matrices
    }

    /// Total nuclear attraction matrix, sum of the coulomb matrices weighted by the
    /// nuclear charges.
    pub fn nuclear_attraction(&self) -> DMatrix<f64> {
        weighted_sum(&self.coulomb(), &self.nuclei, self.primitives.len())
    }

    /// Overlap, kinetic and coulomb matrices in one pass, sharing the hermite
    /// expansion of each pair between the three.
    pub fn compute(&self) -> PrimitiveIntegrals {
        let n = self.primitives.len();
        let mut overlap = DMatrix::zeros(n, n);
        let mut kinetic = DMatrix::zeros(n, n);
        let mut coulomb = vec![DMatrix::zeros(n, n); self.nuclei.len()];
        let centers = self.nuclear_positions();

        for (a, b, (s, t, v)) in self.pair_rows(|a, b, expansion| {
            let (angular_a, angular_b) = (a.angular_array(), b.angular_array());
            (
                primitive_overlap(expansion, angular_a, angular_b),
                primitive_kinetic(expansion, angular_a, angular_b),
                primitive_coulomb(expansion, angular_a, angular_b, &centers),
            )
        }) {
            overlap[(a, b)] = s;
            overlap[(b, a)] = s;
            kinetic[(a, b)] = t;
            kinetic[(b, a)] = t;
            for (matrix, value) in coulomb.iter_mut().zip(v) {
                matrix[(a, b)] = value;
                matrix[(b, a)] = value;
            }
        }

        log::debug!(
            "computed primitive integrals for {n} primitives and {} nuclei",
            self.nuclei.len()
        );

        PrimitiveIntegrals {
            overlap,
            kinetic,
            coulomb,
        }
    }

    /// Electrostatic potential `int g_a(r) g_b(r) / |r - point| dr` of every pair
    /// product a <= b at each of `points`, handed to `sink` one pair at a time.
    pub fn pair_potentials(
        &self,
        points: &[Vector3<f64>],
        mut sink: impl FnMut(usize, usize, &[f64]),
    ) {
        for (a, primitive_a) in self.primitives.iter().enumerate() {
            for (b, primitive_b) in self.primitives.iter().enumerate().skip(a) {
                let mut expansion = HermiteExpansion::new(
                    primitive_a.exponent,
                    primitive_a.center,
                    primitive_b.exponent,
                    primitive_b.center,
                );
                let mut values = primitive_coulomb(
                    &mut expansion,
                    primitive_a.angular_array(),
                    primitive_b.angular_array(),
                    points,
                );
                values.iter_mut().for_each(|value| *value = -*value);
                sink(a, b, &values);
            }
        }
    }

    fn nuclear_positions(&self) -> Vec<Vector3<f64>> {
        self.nuclei.iter().map(|nucleus| nucleus.position).collect()
    }

    fn pair_matrices<const N: usize>(
        &self,
        func: impl Fn(&PrimitiveGaussian, &PrimitiveGaussian, &mut HermiteExpansion) -> [f64; N]
            + Sync,
    ) -> [DMatrix<f64>; N] {
        let n = self.primitives.len();
        let mut matrices = std::array::from_fn(|_| DMatrix::zeros(n, n));

        for (a, b, values) in self.pair_rows(func) {
            for (matrix, value) in matrices.iter_mut().zip(values) {
                matrix[(a, b)] = value;
                matrix[(b, a)] = value;
            }
        }

        matrices
    }

    /// Evaluates `func` for every pair a <= b. The other triangle follows from the
    /// exchange symmetry of the integrals.
    fn pair_rows<T: Send>(
        &self,
        func: impl Fn(&PrimitiveGaussian, &PrimitiveGaussian, &mut HermiteExpansion) -> T + Sync,
    ) -> Vec<(usize, usize, T)> {
        let n = self.primitives.len();
        let row = |a: usize| {
            let primitive_a = &self.primitives[a];
            (a..n)
                .map(|b| {
                    let primitive_b = &self.primitives[b];
                    let mut expansion = HermiteExpansion::new(
                        primitive_a.exponent,
                        primitive_a.center,
                        primitive_b.exponent,
                        primitive_b.center,
                    );
                    (a, b, func(primitive_a, primitive_b, &mut expansion))
                })
                .collect::<Vec<_>>()
        };

        #[cfg(feature = "rayon")]
        let pairs: Vec<_> = {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            (0..n).into_par_iter().flat_map_iter(row).collect()
        };

        #[cfg(not(feature = "rayon"))]
        let pairs: Vec<_> = (0..n).flat_map(row).collect();

        pairs
    }
}

pub(crate) fn weighted_sum(
    coulomb: &[DMatrix<f64>],
    nuclei: &[AtomCenter],
    n: usize,
) -> DMatrix<f64> {
    coulomb
        .iter()
        .zip(nuclei)
        .fold(DMatrix::zeros(n, n), |sum, (matrix, nucleus)| {
            sum + matrix * nucleus.charge
        })
}

fn primitive_overlap(expansion: &mut HermiteExpansion, a: [i32; 3], b: [i32; 3]) -> f64 {
    let p = expansion.exponent_sum();

    expansion.coefficient(a[0], b[0], 0, 0)
        * expansion.coefficient(a[1], b[1], 0, 1)
        * expansion.coefficient(a[2], b[2], 0, 2)
        * (PI / p).powi(3).sqrt()
}

fn primitive_kinetic(expansion: &mut HermiteExpansion, a: [i32; 3], b: [i32; 3]) -> f64 {
    let b_exp = expansion.exponent_b();
    let [l, m, n] = b;

    let mut angular_step = |[i, j, k]: [i32; 3]| {
        primitive_overlap(expansion, a, [l + i, m + j, n + k])
    };

    let term_0 = b_exp * (2 * (l + m + n) + 3) as f64 * angular_step([0, 0, 0]);
    let term_1 = -2.0
        * b_exp.powi(2)
        * (angular_step([2, 0, 0]) + angular_step([0, 2, 0]) + angular_step([0, 0, 2]));
    let term_2 = -0.5
        * ((l * (l - 1)) as f64 * angular_step([-2, 0, 0])
            + (m * (m - 1)) as f64 * angular_step([0, -2, 0])
            + (n * (n - 1)) as f64 * angular_step([0, 0, -2]));
    term_0 + term_1 + term_2
}

/// Attraction of one primitive pair towards a unit positive charge at each center.
fn primitive_coulomb(
    expansion: &mut HermiteExpansion,
    a: [i32; 3],
    b: [i32; 3],
    centers: &[Vector3<f64>],
) -> Vec<f64> {
    let p = expansion.exponent_sum();
    let product_center = expansion.product_center();
    let [max_r, max_s, max_t] = [a[0] + b[0], a[1] + b[1], a[2] + b[2]];

    // the expansion products only depend on the pair, gather them once for all centers
    let mut terms = Vec::with_capacity(((max_r + 1) * (max_s + 1) * (max_t + 1)) as usize);
    for r in 0..=max_r {
        let e_r = expansion.coefficient(a[0], b[0], r, 0);
        for s in 0..=max_s {
            let e_rs = e_r * expansion.coefficient(a[1], b[1], s, 1);
            for t in 0..=max_t {
                let e_rst = e_rs * expansion.coefficient(a[2], b[2], t, 2);
                terms.push((r, s, t, e_rst));
            }
        }
    }

    centers
        .iter()
        .map(|center| {
            let mut coulomb = HermiteCoulomb::new(
                p,
                product_center - center,
                (max_r + max_s + max_t) as u32,
            );
            let sum = terms
                .iter()
                .map(|&(r, s, t, e)| e * coulomb.coefficient(r, s, t, 0))
                .sum::<f64>();
            -std::f64::consts::TAU / p * sum
        })
        .collect()
}
