use dft_core::{
    basis::{BasisSet, PrimitiveSet},
    config::{ConfigBasisSet, ConfigMolecule},
    contraction::Contraction,
    integrals::IntegralEngine,
    molecule::Molecule,
};
use std::error::Error;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::DVector;

const STO_3G: &str = r#"{"elements":{"1":{"electron_shells":[{"function_type":"gto","region":"","angular_momentum":[0],"exponents":["0.3425250914E+01","0.6239137298E+00","0.1688554040E+00"],"coefficients":[["0.1543289673E+00","0.5353281423E+00","0.4446345422E+00"]]}]},"8":{"electron_shells":[{"function_type":"gto","region":"","angular_momentum":[0],"exponents":["0.1307093214E+03","0.2380886605E+02","0.6443608313E+01"],"coefficients":[["0.1543289673E+00","0.5353281423E+00","0.4446345422E+00"]]},{"function_type":"gto","region":"","angular_momentum":[0,1],"exponents":["0.5033151319E+01","0.1169596125E+01","0.3803889600E+00"],"coefficients":[["-0.9996722919E-01","0.3995128261E+00","0.7001154689E+00"],["0.1559162750E+00","0.6076837186E+00","0.3919573931E+00"]]}]}}}"#;

const WATER: &str = r#"[
    {"atomic_number": 8, "position": [0.0, -0.143225816552, 0.0]},
    {"atomic_number": 1, "position": [1.638036840407, 1.136548822547, 0.0]},
    {"atomic_number": 1, "position": [-1.638036840407, 1.136548822547, 0.0]}
]"#;

struct Instance {
    name: &'static str,
    primitives: PrimitiveSet,
    molecule: Molecule,
}

fn water_sto3g() -> Result<Instance, Box<dyn Error>> {
    let basis_set: BasisSet = serde_json::from_str::<ConfigBasisSet>(STO_3G)?.try_into()?;
    let molecule: Molecule = serde_json::from_str::<ConfigMolecule>(WATER)?.try_into()?;
    let primitives = PrimitiveSet::from_basis(&basis_set.basis_for_molecule(&molecule)?)?;

    Ok(Instance {
        name: "water STO-3G",
        primitives,
        molecule,
    })
}

fn bench_one_electron(c: &mut Criterion, instance: &Instance) {
    let engine = IntegralEngine::new(&instance.primitives, instance.molecule.atoms());

    c.bench_function(&format!("Overlap {}", instance.name), |b| {
        b.iter(|| engine.overlap())
    });
    c.bench_function(&format!("Kinetic {}", instance.name), |b| {
        b.iter(|| engine.kinetics())
    });
    c.bench_function(&format!("Coulomb {}", instance.name), |b| {
        b.iter(|| engine.coulomb())
    });
    c.bench_function(&format!("All one electron {}", instance.name), |b| {
        b.iter(|| engine.compute())
    });
}

fn bench_contraction(c: &mut Criterion, instance: &Instance) -> Result<(), Box<dyn Error>> {
    let engine = IntegralEngine::new(&instance.primitives, instance.molecule.atoms());
    let integrals = engine.compute();
    let coefficients = DVector::from_iterator(
        instance.primitives.len(),
        instance.primitives.coefficients(),
    );
    let contraction = Contraction::new(
        coefficients,
        instance.primitives.grouping().clone(),
        &integrals.overlap,
    )?;

    c.bench_function(&format!("Contraction {}", instance.name), |b| {
        b.iter(|| contraction.contract_integrals(&integrals))
    });

    Ok(())
}

fn bench_integrals(c: &mut Criterion) {
    let water = water_sto3g().expect("failed to build water STO-3G instance");

    bench_one_electron(c, &water);
    bench_contraction(c, &water).expect("failed to build contraction");
}

criterion_group!(benches, bench_integrals);
criterion_main!(benches);
