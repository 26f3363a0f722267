use crate::atom::AtomCenter;

/// Represents a molecule
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    pub(crate) atoms: Vec<AtomCenter>,
    /// net charge of the molecule, positive for cations
    pub(crate) charge: i32,
}

impl Molecule {
    pub fn new(atoms: Vec<AtomCenter>) -> Self {
        Self { atoms, charge: 0 }
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    pub fn atoms(&self) -> &[AtomCenter] {
        &self.atoms
    }

    /// Returns the number of total electrons in the system
    pub fn n_electrons(&self) -> usize {
        let base_electron_count = self
            .atoms
            .iter()
            .map(|atom| atom.atomic_number as usize)
            .sum::<usize>();

        base_electron_count.saturating_add_signed(-self.charge as isize)
    }

    pub fn nuclear_repulsion(&self) -> f64 {
        nuclear_repulsion(&self.atoms)
    }
}

/// Classical repulsion energy between point nuclei.
pub fn nuclear_repulsion(atoms: &[AtomCenter]) -> f64 {
    let n_atoms = atoms.len();

    let mut potential = 0.0;
    for atom_a in 0..n_atoms {
        for atom_b in atom_a + 1..n_atoms {
            potential += atoms[atom_a].charge * atoms[atom_b].charge
                / (atoms[atom_b].position - atoms[atom_a].position).norm()
        }
    }
    log::debug!("nuclear repulsion energy: {potential}");
    potential
}
