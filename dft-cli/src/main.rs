use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dft_core::{
    basis::{BasisSet, PrimitiveSet},
    config::{load_json, ConfigBasisSet, ConfigMolecule},
    contraction::Contraction,
    equilibrium::{Acceleration, SolverOptions},
    functional::PowerLda,
    grid::{Grid, QuadratureGrid},
    hamiltonian::GaussianHamiltonian,
    integrals::IntegralEngine,
    ks::{KohnSham, KohnShamOutput},
    molecule::Molecule,
};
use nalgebra::DVector;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: DftCommand,
}

#[derive(Subcommand, Debug)]
enum DftCommand {
    /// Print the contracted overlap, kinetic and nuclear attraction matrices
    #[command(name = "integrals")]
    Integrals {
        /// Basis set in the Basis Set Exchange JSON format
        #[arg(long, short)]
        basis_set: PathBuf,
        /// A path to the molecule to compute the integrals for
        #[arg(long, short)]
        molecule: PathBuf,
    },
    /// Run a restricted Kohn-Sham calculation with Slater exchange
    #[command(name = "ks")]
    KohnSham {
        /// Basis set in the Basis Set Exchange JSON format
        #[arg(long, short)]
        basis_set: PathBuf,
        /// A path to the molecule to perform the calculation on
        #[arg(long, short)]
        molecule: PathBuf,
        /// The charge of the molecule
        #[arg(long, short, default_value_t = 0, allow_hyphen_values = true)]
        charge: i32,
        /// The maximum number of SCF iterations
        #[arg(long, default_value_t = 200)]
        max_iterations: u32,
        /// if the rms of the density matrix change drops below this, the system is
        /// considered converged
        #[arg(long, default_value_t = 1e-8)]
        tolerance: f64,
        /// Fraction of the new density mixed into the old one
        #[arg(long, default_value_t = 1.0)]
        damping: f64,
        /// Largest step of the integration grid, in bohr
        #[arg(long, default_value_t = 0.25)]
        grid_spacing: f64,
        /// Distance between the outermost nuclei and the grid boundary, in bohr
        #[arg(long, default_value_t = 5.0)]
        grid_margin: f64,
        /// Enable DIIS with the given history length
        #[arg(long)]
        diis: Option<usize>,
    },
}

fn load_inputs(basis_set: &PathBuf, molecule: &PathBuf) -> anyhow::Result<(BasisSet, Molecule)> {
    let basis_set: BasisSet = load_json::<ConfigBasisSet>(basis_set)
        .and_then(BasisSet::try_from)
        .with_context(|| format!("failed to load basis set {}", basis_set.display()))?;
    let molecule: Molecule = load_json::<ConfigMolecule>(molecule)
        .and_then(Molecule::try_from)
        .with_context(|| format!("failed to load molecule {}", molecule.display()))?;

    Ok((basis_set, molecule))
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args: Args = Args::parse();

    match args.command {
        DftCommand::Integrals {
            basis_set,
            molecule,
        } => {
            let (basis_set, molecule) = load_inputs(&basis_set, &molecule)?;
            let primitives = PrimitiveSet::from_basis(&basis_set.basis_for_molecule(&molecule)?)?;

            let start = Instant::now();
            let engine = IntegralEngine::new(&primitives, molecule.atoms());
            let integrals = engine.compute();
            let contraction = Contraction::new(
                DVector::from_iterator(primitives.len(), primitives.coefficients()),
                primitives.grouping().clone(),
                &integrals.overlap,
            )?;
            let contracted = contraction.contract_integrals(&integrals);
            let nuclear = contracted
                .coulomb
                .iter()
                .zip(molecule.atoms())
                .map(|(matrix, atom)| matrix * atom.charge)
                .fold(
                    nalgebra::DMatrix::zeros(contraction.n_basis(), contraction.n_basis()),
                    |sum, matrix| sum + matrix,
                );

            println!(
                "{} basis functions from {} primitives in {:0.2?}",
                contraction.n_basis(),
                primitives.len(),
                start.elapsed()
            );
            println!("overlap matrix: {:0.6}", contracted.overlap);
            println!("kinetic matrix: {:0.6}", contracted.kinetic);
            println!("nuclear attraction matrix: {nuclear:0.6}");
        }

        DftCommand::KohnSham {
            basis_set,
            molecule,
            charge,
            max_iterations,
            tolerance,
            damping,
            grid_spacing,
            grid_margin,
            diis,
        } => {
            let (basis_set, molecule) = load_inputs(&basis_set, &molecule)?;
            let molecule = molecule.with_charge(charge);

            let centers = molecule
                .atoms()
                .iter()
                .map(|atom| atom.position)
                .collect::<Vec<_>>();
            let grid = QuadratureGrid::enclosing(&centers, grid_margin, grid_spacing)?;
            log::info!("integration grid with {} points", grid.len());

            let start = Instant::now();
            let hamiltonian = GaussianHamiltonian::from_molecule(grid, &basis_set, &molecule)?;
            let ks = KohnSham::new(
                &hamiltonian,
                PowerLda::slater_exchange(),
                molecule.n_electrons(),
            )?;

            let options = SolverOptions {
                tolerance,
                max_iterations,
                damping,
                acceleration: match diis {
                    Some(history) => Acceleration::Diis { history },
                    None => Acceleration::None,
                },
            };

            let output = ks.run(&options)?;
            let KohnShamOutput {
                ref orbital_energies,
                electronic_energy,
                energy_components,
                nuclear_repulsion,
                iterations,
                ..
            } = output;

            if output.is_converged() {
                println!(
                    "kohn-sham converged after {iterations} iterations and {:0.2?}",
                    start.elapsed()
                );
            } else {
                println!(
                    "kohn-sham did not converge within {iterations} iterations, reporting the last iterate"
                );
            }
            println!("one electron energy: {:3.6}", energy_components.one_electron);
            println!("hartree energy: {:3.6}", energy_components.hartree);
            if let Some(exchange) = energy_components.functional {
                println!("slater exchange energy: {exchange:3.6}");
            }
            println!("electronic energy: {electronic_energy:3.6}");
            println!("nuclear repulsion energy: {nuclear_repulsion:3.6}");
            println!("total energy: {:3.6}", output.total_energy());
            println!("orbital energies: {orbital_energies:3.4?}");
        }
    }

    Ok(())
}
