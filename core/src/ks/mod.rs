//! Restricted Kohn-Sham self consistent field, expressed as a fixed point of the
//! density matrix.
mod utils;

use nalgebra::{DMatrix, DVector};

use crate::{
    equilibrium::{EquilibriumSolver, FixedPointMap, SolverOptions, SolverState},
    error::{DftError, Result},
    functional::PotentialExpr,
    grid::Grid,
    hamiltonian::GaussianHamiltonian,
    molecule::nuclear_repulsion,
};

/// The output of a Kohn-Sham calculation
#[derive(Debug)]
#[non_exhaustive]
pub struct KohnShamOutput {
    /// orbital energies of the final density, sorted in ascending order
    pub orbital_energies: Vec<f64>,
    pub density_matrix: DMatrix<f64>,
    /// sum of the energy components
    pub electronic_energy: f64,
    pub energy_components: EnergyComponents,
    pub nuclear_repulsion: f64,
    pub iterations: u32,
    pub solver_state: SolverState,
}

/// Electronic energy of a density matrix, split by origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnergyComponents {
    /// tr(D (T + V_nuclear))
    pub one_electron: f64,
    /// `1/2 int v_H rho`, zero when the Hartree term is switched off
    pub hartree: f64,
    /// energy of the density functional, if the potential has one
    pub functional: Option<f64>,
}

impl EnergyComponents {
    pub fn electronic(&self) -> f64 {
        self.one_electron + self.hartree + self.functional.unwrap_or(0.0)
    }
}

impl KohnShamOutput {
    pub fn total_energy(&self) -> f64 {
        self.electronic_energy + self.nuclear_repulsion
    }

    pub fn is_converged(&self) -> bool {
        self.solver_state == SolverState::Converged
    }
}

pub struct KohnSham<'a, G> {
    hamiltonian: &'a GaussianHamiltonian<G>,
    functional: PotentialExpr,
    n_electrons: usize,
    hartree: bool,
    /// S^(-1/2)
    transform: DMatrix<f64>,
}

impl<'a, G: Grid> KohnSham<'a, G> {
    pub fn new(
        hamiltonian: &'a GaussianHamiltonian<G>,
        functional: impl Into<PotentialExpr>,
        n_electrons: usize,
    ) -> Result<Self> {
        let n_basis = hamiltonian.n_basis();
        let n_orbitals = n_electrons.div_ceil(2);
        if n_orbitals > n_basis {
            return Err(DftError::InvalidConfig(format!(
                "{n_electrons} electrons need {n_orbitals} orbitals, but the basis has only {n_basis} functions"
            )));
        }

        Ok(Self {
            hamiltonian,
            functional: functional.into(),
            n_electrons,
            hartree: true,
            transform: utils::compute_transformation_matrix(hamiltonian.overlap())?,
        })
    }

    /// Drops the Hartree potential, leaving the core Hamiltonian plus the functional.
    pub fn without_hartree(mut self) -> Self {
        self.hartree = false;
        self
    }

    /// Extended Hückel density of the static Hamiltonian.
    pub fn initial_density(&self) -> DMatrix<f64> {
        utils::compute_hückel_density(
            self.hamiltonian.static_matrix(),
            self.hamiltonian.overlap(),
            &self.transform,
            self.n_electrons,
        )
    }

    /// Iterates the density matrix to self consistency, starting from
    /// [`Self::initial_density`].
    pub fn run(&self, options: &SolverOptions) -> Result<KohnShamOutput> {
        let initial = self.initial_density();
        let n_basis = initial.nrows();

        let solver = EquilibriumSolver::new().with_options(*options);
        let fixed_point = solver.solve(self, flatten(&initial))?;
        let density_matrix =
            DMatrix::from_column_slice(n_basis, n_basis, fixed_point.state.as_slice());

        let (_, orbital_energies) = self.diagonalize(&density_matrix)?;
        let energy_components = self.energy(&density_matrix)?;
        let electronic_energy = energy_components.electronic();
        let nuclear_repulsion = nuclear_repulsion(self.hamiltonian.nuclei());

        log::info!(
            "kohn-sham finished after {} iterations ({:?}), total energy {:1.8}",
            fixed_point.iterations,
            fixed_point.solver_state,
            electronic_energy + nuclear_repulsion
        );

        Ok(KohnShamOutput {
            orbital_energies: orbital_energies.as_slice().to_vec(),
            density_matrix,
            electronic_energy,
            energy_components,
            nuclear_repulsion,
            iterations: fixed_point.iterations,
            solver_state: fixed_point.solver_state,
        })
    }

    /// Builds and diagonalizes the Hamiltonian of a density matrix. Returns the
    /// orbital coefficients and orbital energies.
    fn diagonalize(&self, density_matrix: &DMatrix<f64>) -> Result<(DMatrix<f64>, DVector<f64>)> {
        let density = self.hamiltonian.density_to_field(density_matrix)?;
        let mut potential = self.functional.evaluate(&density)?;
        if self.hartree {
            potential += self.hamiltonian.hartree_potential(density_matrix)?;
        }
        let hamiltonian = self.hamiltonian.hamiltonian(&potential)?;

        Ok(utils::solve_generalized(&hamiltonian, &self.transform))
    }

    /// Energy components of a density matrix.
    pub fn energy(&self, density_matrix: &DMatrix<f64>) -> Result<EnergyComponents> {
        let one_electron = (density_matrix * self.hamiltonian.static_matrix()).trace();

        let density = self.hamiltonian.density_to_field(density_matrix)?;
        let hartree = if self.hartree {
            let potential = self.hamiltonian.hartree_potential(density_matrix)?;
            0.5 * self.hamiltonian.grid().integrate(&potential.component_mul(&density))?
        } else {
            0.0
        };
        let functional = match self.functional.energy_density(&density)? {
            Some(energy_density) => Some(self.hamiltonian.grid().integrate(&energy_density)?),
            None => None,
        };

        Ok(EnergyComponents {
            one_electron,
            hartree,
            functional,
        })
    }
}

impl<G: Grid> FixedPointMap for KohnSham<'_, G> {
    fn apply(&self, state: &DVector<f64>) -> Result<DVector<f64>> {
        let n_basis = self.hamiltonian.n_basis();
        if state.len() != n_basis * n_basis {
            return Err(DftError::LengthMismatch {
                what: "flattened density matrix",
                expected: n_basis * n_basis,
                found: state.len(),
            });
        }

        let density_matrix = DMatrix::from_column_slice(n_basis, n_basis, state.as_slice());
        let (coefficients, _) = self.diagonalize(&density_matrix)?;

        Ok(flatten(&utils::compute_updated_density(
            &coefficients,
            n_basis,
            self.n_electrons,
        )))
    }
}

/// Column major flattening of a density matrix into a solver state
fn flatten(matrix: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(matrix.as_slice())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::KohnSham;
    use crate::{
        atom::AtomCenter,
        basis::{PrimitiveGaussian, PrimitiveSet},
        contraction::ContractionGrouping,
        equilibrium::{Acceleration, SolverOptions, SolverState},
        error::DftError,
        functional::{PotentialExpr, PowerLda},
        grid::QuadratureGrid,
        hamiltonian::GaussianHamiltonian,
    };

    const STO_3G_H: [(f64, f64); 3] = [
        (3.42525091, 0.15432897),
        (0.62391373, 0.53532814),
        (0.16885540, 0.44463454),
    ];

    fn hydrogen_molecule(spacing: f64) -> GaussianHamiltonian<QuadratureGrid> {
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
        let primitives = PrimitiveSet::new(primitives, ContractionGrouping::Uniform(3)).unwrap();
        let grid = QuadratureGrid::enclosing(
            &nuclei.iter().map(|nucleus| nucleus.position).collect::<Vec<_>>(),
            5.0,
            spacing,
        )
        .unwrap();

        GaussianHamiltonian::new(grid, &primitives, &nuclei, true).unwrap()
    }

    #[test]
    fn without_potential_reduces_to_core_hamiltonian() {
        // H2 minimal basis: the bonding orbital of the core hamiltonian, e = H11 + H12 over 1 + S12
        let hamiltonian = hydrogen_molecule(1.0);
        let ks = KohnSham::new(&hamiltonian, 0.0, 2).unwrap().without_hartree();
        let output = ks.run(&SolverOptions::default()).unwrap();

        assert!(output.is_converged());
        assert!(output.iterations <= 3);

        let core = hamiltonian.static_matrix();
        let overlap = hamiltonian.overlap();
        let bonding = (core[(0, 0)] + core[(0, 1)]) / (1.0 + overlap[(0, 1)]);
        assert_relative_eq!(output.orbital_energies[0], bonding, epsilon = 1e-10);
        assert_relative_eq!(output.electronic_energy, 2.0 * bonding, epsilon = 1e-10);
        assert_relative_eq!(output.nuclear_repulsion, 1.0 / 1.4, epsilon = 1e-12);
        assert_eq!(output.energy_components.functional, Some(0.0));
        assert_eq!(output.energy_components.hartree, 0.0);
    }

    #[test]
    fn hartree_raises_orbital_energy_by_its_energy() {
        // one doubly occupied orbital: e = h + 2 J and E_H = 2 J
        let hamiltonian = hydrogen_molecule(0.5);
        let ks = KohnSham::new(&hamiltonian, 0.0, 2).unwrap();
        let output = ks.run(&SolverOptions::default()).unwrap();
        assert!(output.is_converged());

        let core = hamiltonian.static_matrix();
        let overlap = hamiltonian.overlap();
        let bonding = (core[(0, 0)] + core[(0, 1)]) / (1.0 + overlap[(0, 1)]);
        let components = output.energy_components;

        assert!(components.hartree > 1.0);
        assert_relative_eq!(components.one_electron, 2.0 * bonding, epsilon = 1e-10);
        assert_relative_eq!(
            output.orbital_energies[0],
            bonding + components.hartree,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            output.electronic_energy,
            2.0 * bonding + components.hartree,
            epsilon = 1e-10
        );
    }

    #[test]
    fn density_holds_all_electrons() {
        let hamiltonian = hydrogen_molecule(1.0);
        for n_electrons in 1..=3 {
            let ks = KohnSham::new(&hamiltonian, 0.0, n_electrons).unwrap();
            let density = ks.initial_density();
            assert_relative_eq!(
                (density * hamiltonian.overlap()).trace(),
                n_electrons as f64,
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn slater_exchange_converges() {
        let hamiltonian = hydrogen_molecule(0.2);
        let functional = PotentialExpr::from(PowerLda::slater_exchange());
        let ks = KohnSham::new(&hamiltonian, functional, 2).unwrap();
        let options = SolverOptions {
            tolerance: 1e-9,
            ..Default::default()
        };

        let plain = ks.run(&options).unwrap();
        assert_eq!(plain.solver_state, SolverState::Converged);

        // exchange lowers the energy below the Hartree one
        let hartree_only = KohnSham::new(&hamiltonian, 0.0, 2)
            .unwrap()
            .energy(&plain.density_matrix)
            .unwrap();
        let exchange = plain.energy_components.functional.unwrap();
        assert!(exchange < 0.0);
        assert_eq!(plain.energy_components.hartree, hartree_only.hartree);
        assert_relative_eq!(
            plain.electronic_energy,
            hartree_only.electronic() + exchange,
            epsilon = 1e-12
        );
        // exact exchange of a two electron singlet cancels half the Hartree energy
        assert!(-exchange < hartree_only.hartree);

        let accelerated = ks
            .run(&SolverOptions {
                acceleration: Acceleration::Diis { history: 6 },
                ..options
            })
            .unwrap();
        assert!(accelerated.is_converged());
        assert_relative_eq!(accelerated.total_energy(), plain.total_energy(), epsilon = 1e-7);
    }

    #[test]
    fn self_consistent_density_is_fixed_point() {
        use crate::equilibrium::FixedPointMap;

        // HeH+ at 1.4632 bohr, STO-3G with zeta = 2.0925 on helium
        let nuclei = vec![
            AtomCenter::new(2, Vector3::zeros()),
            AtomCenter::new(1, Vector3::new(0.0, 0.0, 1.4632)),
        ];
        let helium = [
            (6.36242139, 0.15432897),
            (1.15892300, 0.53532814),
            (0.31364979, 0.44463454),
        ];
        let primitives = helium
            .iter()
            .map(|&(exponent, coefficient)| (exponent, coefficient, nuclei[0].position))
            .chain(
                STO_3G_H
                    .iter()
                    .map(|&(exponent, coefficient)| (exponent, coefficient, nuclei[1].position)),
            )
            .map(|(exponent, coefficient, center)| {
                PrimitiveGaussian::new((0, 0, 0), exponent, center, coefficient)
            })
            .collect();
        let primitives = PrimitiveSet::new(primitives, ContractionGrouping::Uniform(3)).unwrap();
        let grid = QuadratureGrid::enclosing(
            &nuclei.iter().map(|nucleus| nucleus.position).collect::<Vec<_>>(),
            4.0,
            0.3,
        )
        .unwrap();
        let hamiltonian = GaussianHamiltonian::new(grid, &primitives, &nuclei, true).unwrap();

        let ks = KohnSham::new(&hamiltonian, PowerLda::slater_exchange(), 2).unwrap();
        let output = ks
            .run(&SolverOptions {
                tolerance: 1e-11,
                max_iterations: 500,
                damping: 0.5,
                ..Default::default()
            })
            .unwrap();
        assert!(output.is_converged());

        let state = super::flatten(&output.density_matrix);
        let updated = ks.apply(&state).unwrap();
        assert_relative_eq!(updated, state, epsilon = 1e-8);
        assert_relative_eq!(
            (&output.density_matrix * hamiltonian.overlap()).trace(),
            2.0,
            epsilon = 1e-9
        );
        assert!(output.orbital_energies[0] < output.orbital_energies[1]);
    }

    #[test]
    fn too_many_electrons_rejected() {
        let hamiltonian = hydrogen_molecule(1.0);
        assert!(matches!(
            KohnSham::new(&hamiltonian, 0.0, 5),
            Err(DftError::InvalidConfig(_))
        ));
    }
}
