use nalgebra::Vector3;
use serde::Deserialize;

use crate::{
    atom::AtomCenter,
    error::{DftError, Result},
    molecule::Molecule,
};

/// Represents a full molecule in a config file.
/// A molecule is just a list of positioned atoms, in bohr.
#[derive(Deserialize)]
pub struct ConfigMolecule(Vec<ConfigAtom>);

#[derive(Deserialize)]
struct ConfigAtom {
    atomic_number: u32,
    position: Vec<f64>,
}

impl TryFrom<ConfigMolecule> for Molecule {
    type Error = DftError;

    fn try_from(value: ConfigMolecule) -> Result<Self> {
        let ConfigMolecule(config_atoms) = value;

        let mut atoms = Vec::with_capacity(config_atoms.len());

        for atom in config_atoms {
            let &[x, y, z] = atom.position.as_slice() else {
                return Err(DftError::LengthMismatch {
                    what: "atom coordinates",
                    expected: 3,
                    found: atom.position.len(),
                });
            };

            atoms.push(AtomCenter::new(atom.atomic_number, Vector3::new(x, y, z)));
        }

        Ok(Molecule::new(atoms))
    }
}
