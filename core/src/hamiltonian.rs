use std::sync::OnceLock;

use nalgebra::{DMatrix, DVector};

use crate::{
    atom::AtomCenter,
    basis::{BasisSet, PrimitiveSet},
    contraction::{symmetrize, ContractedIntegrals, Contraction},
    error::{DftError, Result},
    grid::Grid,
    integrals::{weighted_sum, IntegralEngine},
    molecule::Molecule,
};

/// One electron Hamiltonian in a contracted cartesian gaussian basis, with the
/// density dependent part integrated numerically on a grid.
///
/// Everything that does not depend on the density (contracted integrals, basis
/// values on the grid) is computed once on construction. [`Self::hamiltonian`] and
/// [`Self::density_to_field`] are pure functions of their argument and this
/// precomputed data.
#[derive(Clone, Debug)]
pub struct GaussianHamiltonian<G> {
    grid: G,
    nuclei: Vec<AtomCenter>,
    contraction: Contraction,
    integrals: ContractedIntegrals,
    /// kinetic + nuclear attraction
    static_matrix: DMatrix<f64>,
    /// normalized basis values, one row per basis function, one column per point
    basis: DMatrix<f64>,
    /// basis values times the quadrature weights
    basis_dvolume: DMatrix<f64>,
    primitives: PrimitiveSet,
    /// int phi_b phi_c / |r - r_i| for every grid point i and basis pair b <= c,
    /// built on first use
    hartree_kernel: OnceLock<DMatrix<f64>>,
}

impl<G: Grid> GaussianHamiltonian<G> {
    /// Builds the Hamiltonian of the given primitives in the field of `nuclei`.
    ///
    /// With `normalize_primitives` every primitive coefficient is first divided by
    /// the norm of its bare primitive, i.e. the basis functions are
    /// `sum c N(alpha) x^i y^j z^k exp(-alpha r^2)`. The contracted functions are
    /// normalized either way.
    pub fn new(
        grid: G,
        primitives: &PrimitiveSet,
        nuclei: &[AtomCenter],
        normalize_primitives: bool,
    ) -> Result<Self> {
        let engine = IntegralEngine::new(primitives, nuclei);
        let primitive_integrals = engine.compute();

        let mut coefficients = DVector::from_iterator(primitives.len(), primitives.coefficients());
        if normalize_primitives {
            for (coefficient, self_overlap) in coefficients
                .iter_mut()
                .zip(primitive_integrals.overlap.diagonal().iter())
            {
                *coefficient /= self_overlap.sqrt();
            }
        }

        let contraction = Contraction::new(
            coefficients,
            primitives.grouping().clone(),
            &primitive_integrals.overlap,
        )?;
        let integrals = contraction.contract_integrals(&primitive_integrals);
        let n_basis = contraction.n_basis();

        let static_matrix =
            symmetrize(&(&integrals.kinetic + weighted_sum(&integrals.coulomb, nuclei, n_basis)));

        let points = grid.points();
        let primitive_values = DMatrix::from_fn(primitives.len(), points.len(), |p, r| {
            primitives.primitives()[p].evaluate(points[r])
        });
        let basis = contraction.contract_values(&primitive_values);

        let mut basis_dvolume = basis.clone();
        for (mut column, &weight) in basis_dvolume.column_iter_mut().zip(grid.weights().iter()) {
            column *= weight;
        }

        log::debug!(
            "hamiltonian with {n_basis} basis functions, {} primitives, {} grid points",
            primitives.len(),
            points.len()
        );

        Ok(Self {
            grid,
            nuclei: nuclei.to_vec(),
            contraction,
            integrals,
            static_matrix,
            basis,
            basis_dvolume,
            primitives: primitives.clone(),
            hartree_kernel: OnceLock::new(),
        })
    }

    /// Places `basis_set` on every atom of `molecule` and uses the atoms as nuclei.
    /// Basis sets loaded from configuration already carry primitive normalization.
    pub fn from_molecule(grid: G, basis_set: &BasisSet, molecule: &Molecule) -> Result<Self> {
        let basis = basis_set.basis_for_molecule(molecule)?;
        let primitives = PrimitiveSet::from_basis(&basis)?;
        Self::new(grid, &primitives, molecule.atoms(), false)
    }

    /// Hamiltonian matrix for a potential sampled on the grid:
    /// `H_bc = sum_r v(r) w(r) phi_b(r) phi_c(r) + T_bc + V_bc`.
    pub fn hamiltonian(&self, potential: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.check_field(potential)?;

        let mut weighted = self.basis_dvolume.clone();
        for (mut column, &value) in weighted.column_iter_mut().zip(potential.iter()) {
            column *= value;
        }

        let matrix = weighted * self.basis.transpose() + &self.static_matrix;
        Ok(symmetrize(&matrix))
    }

    /// Electron density on the grid, `rho(r) = sum_jk D_jk phi_j(r) phi_k(r)`.
    pub fn density_to_field(&self, density_matrix: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.check_density_matrix(density_matrix)?;

        let projected = density_matrix * &self.basis;
        Ok(DVector::from_iterator(
            self.basis.ncols(),
            self.basis
                .column_iter()
                .zip(projected.column_iter())
                .map(|(phi, projected)| phi.dot(&projected)),
        ))
    }

    /// Hartree potential of a density matrix on the grid,
    /// `v_H(r) = int rho(r') / |r - r'| dr'`.
    ///
    /// The potential of every gaussian product is integrated analytically, so only
    /// the sampling is discrete. The kernel costs one coulomb integral per primitive
    /// pair and grid point and is built on the first call.
    pub fn hartree_potential(&self, density_matrix: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.check_density_matrix(density_matrix)?;

        let n = self.n_basis();
        let mut packed = DVector::zeros(n * (n + 1) / 2);
        for b in 0..n {
            for c in b..n {
                packed[pair_index(b, c, n)] = if b == c {
                    density_matrix[(b, b)]
                } else {
                    density_matrix[(b, c)] + density_matrix[(c, b)]
                };
            }
        }

        Ok(self.hartree_kernel() * packed)
    }

    fn hartree_kernel(&self) -> &DMatrix<f64> {
        self.hartree_kernel.get_or_init(|| {
            let n = self.n_basis();
            let points = self.grid.points();
            let weights = self.contraction.primitive_weights();
            let mut kernel = DMatrix::zeros(points.len(), n * (n + 1) / 2);

            IntegralEngine::new(&self.primitives, &[]).pair_potentials(points, |a, b, values| {
                let (group_a, weight_a) = weights[a];
                let (group_b, weight_b) = weights[b];
                // a < b inside one group also stands for the mirrored pair b, a
                let multiplicity = if a != b && group_a == group_b { 2.0 } else { 1.0 };
                let scale = multiplicity * weight_a * weight_b;

                let mut column = kernel.column_mut(pair_index(group_a, group_b, n));
                for (entry, value) in column.iter_mut().zip(values) {
                    *entry += scale * value;
                }
            });

            log::debug!(
                "hartree kernel for {} basis pairs on {} grid points",
                n * (n + 1) / 2,
                points.len()
            );
            kernel
        })
    }

    /// Names of the precomputed arrays a method reads.
    pub fn parameter_names(&self, method: &str) -> Result<&'static [&'static str]> {
        match method {
            "hamiltonian" => Ok(&["basis_dvolume", "basis", "static_matrix"]),
            "overlap" => Ok(&["overlap"]),
            "density_to_field" => Ok(&["basis"]),
            "hartree_potential" => Ok(&["hartree_kernel"]),
            other => Err(DftError::UnsupportedOperation(format!(
                "no parameters recorded for method '{other}'"
            ))),
        }
    }

    fn check_density_matrix(&self, density_matrix: &DMatrix<f64>) -> Result<()> {
        let n = self.n_basis();
        if density_matrix.shape() != (n, n) {
            return Err(DftError::LengthMismatch {
                what: "density matrix",
                expected: n,
                found: density_matrix.nrows(),
            });
        }
        Ok(())
    }

    fn check_field(&self, field: &DVector<f64>) -> Result<()> {
        if field.len() != self.grid.len() {
            return Err(DftError::LengthMismatch {
                what: "potential field",
                expected: self.grid.len(),
                found: field.len(),
            });
        }
        Ok(())
    }

    pub fn overlap(&self) -> &DMatrix<f64> {
        &self.integrals.overlap
    }

    pub fn kinetic(&self) -> &DMatrix<f64> {
        &self.integrals.kinetic
    }

    /// Contracted attraction matrix of each nucleus, for a unit charge
    pub fn coulomb(&self) -> &[DMatrix<f64>] {
        &self.integrals.coulomb
    }

    pub fn nuclear_attraction(&self) -> DMatrix<f64> {
        weighted_sum(&self.integrals.coulomb, &self.nuclei, self.n_basis())
    }

    pub fn static_matrix(&self) -> &DMatrix<f64> {
        &self.static_matrix
    }

    pub fn basis(&self) -> &DMatrix<f64> {
        &self.basis
    }

    pub fn basis_dvolume(&self) -> &DMatrix<f64> {
        &self.basis_dvolume
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn nuclei(&self) -> &[AtomCenter] {
        &self.nuclei
    }

    pub fn contraction(&self) -> &Contraction {
        &self.contraction
    }

    pub fn n_basis(&self) -> usize {
        self.contraction.n_basis()
    }
}

/// Position of the basis pair b <= c in the packed upper triangle.
fn pair_index(b: usize, c: usize, n: usize) -> usize {
    b * (2 * n - b + 1) / 2 + (c - b)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector, Vector3};

    use super::GaussianHamiltonian;
    use crate::{
        atom::AtomCenter,
        basis::{PrimitiveGaussian, PrimitiveSet},
        contraction::ContractionGrouping,
        error::DftError,
        grid::{Grid, QuadratureGrid},
    };

    const STO_3G_H: [(f64, f64); 3] = [
        (3.42525091, 0.15432897),
        (0.62391373, 0.53532814),
        (0.16885540, 0.44463454),
    ];

    fn box_grid(half_width: f64, spacing: f64) -> QuadratureGrid {
        QuadratureGrid::uniform_box(
            Vector3::repeat(-half_width),
            Vector3::repeat(half_width),
            spacing,
        )
        .unwrap()
    }

    fn single_s(alpha: f64) -> (PrimitiveSet, Vec<AtomCenter>) {
        let primitives = vec![PrimitiveGaussian::new((0, 0, 0), alpha, Vector3::zeros(), 1.0)];
        (
            PrimitiveSet::new(primitives, ContractionGrouping::Uniform(1)).unwrap(),
            vec![AtomCenter::new(1, Vector3::zeros())],
        )
    }

    fn hydrogen_molecule() -> (PrimitiveSet, Vec<AtomCenter>) {
        let nuclei = vec![
            AtomCenter::new(1, Vector3::zeros()),
            AtomCenter::new(1, Vector3::new(0.0, 0.0, 1.4)),
        ];
        let primitives = nuclei
            .iter()
            .flat_map(|nucleus| {
                STO_3G_H.iter().map(|&(exponent, coefficient)| {
                    PrimitiveGaussian::new((0, 0, 0), exponent, nucleus.position, coefficient)
                })
            })
            .collect();

        (
            PrimitiveSet::new(primitives, ContractionGrouping::Uniform(3)).unwrap(),
            nuclei,
        )
    }

    #[test]
    fn single_s_function_matrix_elements() {
        let alpha = 1.0;
        let (primitives, nuclei) = single_s(alpha);
        let hamiltonian =
            GaussianHamiltonian::new(box_grid(4.0, 1.0), &primitives, &nuclei, false).unwrap();

        assert_relative_eq!(hamiltonian.overlap()[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(hamiltonian.kinetic()[(0, 0)], 1.5 * alpha, max_relative = 1e-10);
        assert_relative_eq!(
            hamiltonian.nuclear_attraction()[(0, 0)],
            -2.0 * (2.0 * alpha / PI).sqrt(),
            max_relative = 1e-6
        );
    }

    #[test]
    fn primitive_normalization_does_not_change_single_primitive() {
        let (primitives, nuclei) = single_s(0.8);
        let plain =
            GaussianHamiltonian::new(box_grid(4.0, 1.0), &primitives, &nuclei, false).unwrap();
        let normalized =
            GaussianHamiltonian::new(box_grid(4.0, 1.0), &primitives, &nuclei, true).unwrap();

        assert_relative_eq!(plain.static_matrix(), normalized.static_matrix(), epsilon = 1e-12);
        assert_relative_eq!(plain.basis(), normalized.basis(), epsilon = 1e-12);
    }

    #[test]
    fn hydrogen_molecule_core_hamiltonian() {
        // Szabo and Ostlund, minimal basis H2 at R = 1.4 bohr
        let (primitives, nuclei) = hydrogen_molecule();
        let hamiltonian =
            GaussianHamiltonian::new(box_grid(4.0, 1.0), &primitives, &nuclei, true).unwrap();

        let overlap = hamiltonian.overlap();
        assert_relative_eq!(overlap[(0, 0)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(overlap[(0, 1)], 0.6593, epsilon = 1e-4);

        let kinetic = hamiltonian.kinetic();
        assert_relative_eq!(kinetic[(0, 0)], 0.7600, epsilon = 1e-4);
        assert_relative_eq!(kinetic[(0, 1)], 0.2365, epsilon = 1e-4);

        let core = hamiltonian.static_matrix();
        assert_relative_eq!(core[(0, 0)], -1.1204, epsilon = 1e-4);
        assert_relative_eq!(core[(0, 1)], -0.9584, epsilon = 1e-4);
        assert_eq!(core, &core.transpose());
    }

    #[test]
    fn constant_potential_adds_overlap() {
        let (primitives, nuclei) = single_s(1.0);
        let hamiltonian =
            GaussianHamiltonian::new(box_grid(6.0, 0.25), &primitives, &nuclei, false).unwrap();
        let shift = 0.3;
        let potential = DVector::from_element(hamiltonian.grid().len(), shift);

        let matrix = hamiltonian.hamiltonian(&potential).unwrap();
        let expected = hamiltonian.static_matrix() + hamiltonian.overlap() * shift;
        assert_relative_eq!(matrix, expected, epsilon = 1e-8);
    }

    #[test]
    fn density_integrates_to_trace() {
        let primitives = vec![
            PrimitiveGaussian::new((0, 0, 0), 0.9, Vector3::zeros(), 1.0),
            PrimitiveGaussian::new((0, 0, 1), 0.7, Vector3::new(0.0, 0.0, 0.5), 1.0),
            PrimitiveGaussian::new((0, 0, 0), 1.1, Vector3::new(0.0, 0.4, 0.0), 1.0),
        ];
        let primitives =
            PrimitiveSet::new(primitives, ContractionGrouping::Ragged(vec![1, 2])).unwrap();
        let nuclei = vec![AtomCenter::new(1, Vector3::zeros())];
        let hamiltonian =
            GaussianHamiltonian::new(box_grid(7.0, 0.25), &primitives, &nuclei, true).unwrap();

        let density_matrix = DMatrix::from_row_slice(2, 2, &[1.2, 0.3, 0.3, 0.8]);
        let density = hamiltonian.density_to_field(&density_matrix).unwrap();
        let electrons = hamiltonian.grid().integrate(&density).unwrap();

        assert_relative_eq!(
            electrons,
            (density_matrix * hamiltonian.overlap()).trace(),
            max_relative = 1e-6
        );
    }

    #[test]
    fn parameter_names_per_method() {
        let (primitives, nuclei) = single_s(1.0);
        let hamiltonian =
            GaussianHamiltonian::new(box_grid(2.0, 1.0), &primitives, &nuclei, false).unwrap();

        assert_eq!(
            hamiltonian.parameter_names("hamiltonian").unwrap(),
            &["basis_dvolume", "basis", "static_matrix"]
        );
        assert_eq!(hamiltonian.parameter_names("overlap").unwrap(), &["overlap"]);
        assert_eq!(hamiltonian.parameter_names("density_to_field").unwrap(), &["basis"]);
        assert_eq!(
            hamiltonian.parameter_names("hartree_potential").unwrap(),
            &["hartree_kernel"]
        );
        assert!(matches!(
            hamiltonian.parameter_names("diagonalize"),
            Err(DftError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn field_shapes_checked() {
        let (primitives, nuclei) = single_s(1.0);
        let hamiltonian =
            GaussianHamiltonian::new(box_grid(2.0, 1.0), &primitives, &nuclei, false).unwrap();

        assert!(matches!(
            hamiltonian.hamiltonian(&DVector::zeros(3)),
            Err(DftError::LengthMismatch { .. })
        ));
        assert!(matches!(
            hamiltonian.density_to_field(&DMatrix::zeros(2, 2)),
            Err(DftError::LengthMismatch { expected: 1, .. })
        ));
        assert!(matches!(
            hamiltonian.hartree_potential(&DMatrix::zeros(2, 2)),
            Err(DftError::LengthMismatch { expected: 1, .. })
        ));
    }

    #[test]
    fn hartree_potential_of_single_gaussian() {
        let alpha = 1.0;
        let (primitives, nuclei) = single_s(alpha);
        let points = vec![Vector3::zeros(), Vector3::new(0.0, 3.0, 4.0)];
        let grid = QuadratureGrid::new(points, DVector::from_element(2, 1.0)).unwrap();
        let hamiltonian = GaussianHamiltonian::new(grid, &primitives, &nuclei, true).unwrap();

        // two electrons in a normalized s function: a gaussian charge of exponent 2 alpha
        let potential = hamiltonian
            .hartree_potential(&DMatrix::from_element(1, 1, 2.0))
            .unwrap();

        assert_relative_eq!(potential[0], 4.0 * (2.0 * alpha / PI).sqrt(), max_relative = 1e-10);
        assert_relative_eq!(potential[1], 2.0 / 5.0, max_relative = 1e-10);
    }

    #[test]
    fn hartree_potential_matches_attraction_of_unit_charge() {
        let primitives = vec![
            PrimitiveGaussian::new((0, 0, 0), 0.9, Vector3::zeros(), 0.6),
            PrimitiveGaussian::new((0, 0, 0), 0.3, Vector3::zeros(), 0.5),
            PrimitiveGaussian::new((1, 0, 0), 0.7, Vector3::new(0.0, 0.0, 0.5), 1.0),
            PrimitiveGaussian::new((0, 1, 1), 1.1, Vector3::new(0.0, 0.4, 0.0), 1.0),
        ];
        let primitives =
            PrimitiveSet::new(primitives, ContractionGrouping::Ragged(vec![2, 1, 1])).unwrap();
        let point = Vector3::new(0.3, -0.2, 0.8);
        let grid = QuadratureGrid::new(vec![point], DVector::from_element(1, 1.0)).unwrap();
        let nuclei = vec![AtomCenter::new(1, Vector3::zeros())];
        let hamiltonian = GaussianHamiltonian::new(grid, &primitives, &nuclei, true).unwrap();

        let charge = vec![AtomCenter::new(1, point)];
        let reference =
            GaussianHamiltonian::new(box_grid(1.0, 1.0), &primitives, &charge, true).unwrap();

        // deliberately not symmetric, only D_bc + D_cb enters
        let density_matrix = DMatrix::from_row_slice(
            3,
            3,
            &[1.2, 0.3, -0.1, 0.5, 0.8, 0.2, 0.0, 0.4, 0.6],
        );
        let potential = hamiltonian.hartree_potential(&density_matrix).unwrap();
        let expected = -density_matrix.dot(&reference.nuclear_attraction());

        assert_relative_eq!(potential[0], expected, max_relative = 1e-10);
    }

    #[test]
    fn hydrogen_molecule_hartree_energy() {
        let (primitives, nuclei) = hydrogen_molecule();
        let grid = QuadratureGrid::enclosing(
            &nuclei.iter().map(|nucleus| nucleus.position).collect::<Vec<_>>(),
            6.0,
            0.3,
        )
        .unwrap();
        let hamiltonian = GaussianHamiltonian::new(grid, &primitives, &nuclei, true).unwrap();

        // doubly occupied bonding orbital (phi_1 + phi_2) / sqrt(2 (1 + S))
        let s12 = hamiltonian.overlap()[(0, 1)];
        let density_matrix = DMatrix::from_element(2, 2, 1.0 / (1.0 + s12));

        let density = hamiltonian.density_to_field(&density_matrix).unwrap();
        let potential = hamiltonian.hartree_potential(&density_matrix).unwrap();
        let energy = 0.5 * hamiltonian.grid().integrate(&potential.component_mul(&density)).unwrap();

        // 2 J_11 with J_11 = 0.6746 for STO-3G at R = 1.4
        assert_relative_eq!(energy, 1.3492, epsilon = 2e-3);
    }
}
