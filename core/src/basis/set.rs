use std::collections::HashMap;

use crate::{
    atom::AtomCenter,
    error::{DftError, Result},
    molecule::Molecule,
};

use super::{BasisFunction, ContractedGaussian};

#[derive(Debug, Clone)]
pub struct BasisSet {
    atomic_mapping: HashMap<u32, AtomicBasis>,
}

impl BasisSet {
    /// Returns the basis of a given atom, if it exists.
    pub fn for_atom(&self, atom: &AtomCenter) -> Option<&AtomicBasis> {
        self.atomic_mapping.get(&atom.atomic_number)
    }

    /// Places the atomic basis of every atom of the molecule at that atom.
    pub fn basis_for_molecule(&self, molecule: &Molecule) -> Result<Vec<BasisFunction>> {
        let mut basis = Vec::new();

        for atom in molecule.atoms() {
            let atomic_basis = self.for_atom(atom).ok_or(DftError::MissingBasis {
                atomic_number: atom.atomic_number,
            })?;
            basis.extend(atomic_basis.basis_for(atom));
        }

        log::debug!(
            "placed {} basis functions on {} atoms",
            basis.len(),
            molecule.atoms().len()
        );
        Ok(basis)
    }

    /// Create a new basis set given mappings from atomic number to the basis of that element
    pub(crate) fn new(atomic_mapping: HashMap<u32, AtomicBasis>) -> Self {
        Self { atomic_mapping }
    }
}

/// Represents the basis functions for a single atom.
#[derive(Debug, Clone)]
pub struct AtomicBasis {
    pub(crate) shells: Vec<ElectronShell>,
}

impl AtomicBasis {
    pub(crate) fn empty() -> Self {
        Self { shells: Vec::new() }
    }

    /// Highest angular momentum of any shell, 0 for an empty basis
    pub fn max_angular_momentum(&self) -> i32 {
        self.shells
            .iter()
            .map(|shell| shell.angular_magnitude)
            .max()
            .unwrap_or(0)
    }

    pub fn basis_functions(&self) -> impl Iterator<Item = &ContractedGaussian> {
        self.shells.iter().flat_map(|shell| &shell.basis_functions)
    }

    pub fn basis_for<'a>(
        &'a self,
        atom: &'a AtomCenter,
    ) -> impl Iterator<Item = BasisFunction> + 'a {
        self.basis_functions()
            .map(|contracted_gaussian| BasisFunction {
                contracted_gaussian: contracted_gaussian.clone(),
                position: atom.position,
            })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ElectronShell {
    pub(crate) angular_magnitude: i32,
    pub(crate) basis_functions: Vec<ContractedGaussian>,
}

impl ElectronShell {
    pub(crate) fn new(angular_magnitude: i32) -> Self {
        Self {
            angular_magnitude,
            basis_functions: Vec::new(),
        }
    }
}
