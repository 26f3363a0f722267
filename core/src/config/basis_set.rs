use std::collections::HashMap;

use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    basis::{AtomicBasis, BasisSet, ContractedGaussian, ElectronShell, Gaussian, MAX_ANGULAR},
    error::{DftError, Result},
};

/// A basis set in the JSON schema of the Basis Set Exchange.
#[derive(Deserialize)]
pub struct ConfigBasisSet {
    elements: HashMap<String, ConfigElectronicConfiguration>,
}

#[derive(Deserialize)]
struct ConfigElectronicConfiguration {
    electron_shells: Vec<ConfigElectronShell>,
}

#[derive(Deserialize)]
struct ConfigElectronShell {
    function_type: String,
    angular_momentum: Vec<i32>,
    exponents: Vec<String>,
    coefficients: Vec<Vec<String>>,
}

impl TryFrom<ConfigBasisSet> for BasisSet {
    type Error = DftError;

    fn try_from(value: ConfigBasisSet) -> Result<Self> {
        let mut atomic_mapping = HashMap::with_capacity(value.elements.len());

        for (element, configuration) in value.elements {
            let atomic_number = element.trim().parse::<u32>().map_err(|_| {
                DftError::InvalidConfig(format!("element key '{element}' is not an atomic number"))
            })?;

            let mut element_atomic_basis = AtomicBasis::empty();
            for electron_shell in &configuration.electron_shells {
                element_atomic_basis
                    .shells
                    .extend(parse_shell(electron_shell)?);
            }

            log::debug!(
                "element {atomic_number}: {} shells, angular momentum up to {}",
                element_atomic_basis.shells.len(),
                element_atomic_basis.max_angular_momentum()
            );
            atomic_mapping.insert(atomic_number, element_atomic_basis);
        }

        Ok(Self::new(atomic_mapping))
    }
}

fn parse_shell(electron_shell: &ConfigElectronShell) -> Result<Vec<ElectronShell>> {
    if !electron_shell.function_type.starts_with("gto") {
        return Err(DftError::InvalidConfig(format!(
            "unsupported function type '{}'",
            electron_shell.function_type
        )));
    }

    // one angular momentum with several rows is a general contraction, one shell per row
    let angular_momenta = match electron_shell.angular_momentum.as_slice() {
        &[angular_magnitude] => vec![angular_magnitude; electron_shell.coefficients.len()],
        angular_momenta if angular_momenta.len() == electron_shell.coefficients.len() => {
            angular_momenta.to_vec()
        }
        angular_momenta => {
            return Err(DftError::LengthMismatch {
                what: "coefficient sets per angular momentum",
                expected: angular_momenta.len(),
                found: electron_shell.coefficients.len(),
            });
        }
    };

    let exponents = electron_shell
        .exponents
        .iter()
        .map(|exponent| exponent.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut shells = Vec::with_capacity(angular_momenta.len());
    for (coefficients, angular_magnitude) in electron_shell.coefficients.iter().zip(angular_momenta) {
        if !(0..=MAX_ANGULAR).contains(&angular_magnitude) {
            return Err(DftError::AngularMomentumTooHigh {
                found: angular_magnitude,
                max: MAX_ANGULAR,
            });
        }

        if coefficients.len() != exponents.len() {
            return Err(DftError::LengthMismatch {
                what: "contraction coefficients",
                expected: exponents.len(),
                found: coefficients.len(),
            });
        }

        let coefficients = coefficients
            .iter()
            .map(|coefficient| coefficient.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut shell = ElectronShell::new(angular_magnitude);
        for angular in generate_angular_vectors(angular_magnitude) {
            let primitives = exponents
                .iter()
                .zip(&coefficients)
                .map(|(&exponent, &coefficient)| Gaussian {
                    exponent,
                    coefficient: coefficient * Gaussian::norm(exponent, angular),
                    angular,
                })
                .collect::<SmallVec<_>>();

            shell.basis_functions.push(ContractedGaussian(primitives));
        }

        shells.push(shell);
    }

    Ok(shells)
}

// generate all (i, j, k) such that i + j + k = angular
fn generate_angular_vectors(angular_magnitude: i32) -> Vec<(i32, i32, i32)> {
    let mut angular_vectors = Vec::with_capacity(8);

    for (i, j, k) in itertools::iproduct!(
        (0..=angular_magnitude).rev(),
        (0..=angular_magnitude).rev(),
        0..=angular_magnitude
    ) {
        if i + j + k == angular_magnitude {
            angular_vectors.push((i, j, k));
        }
    }

    angular_vectors
}
