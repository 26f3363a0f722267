use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{DftError, Result};

/// A nucleus: a position (bohr) and the charge it exerts on the electrons.
///
/// The same array of centers places basis functions and sources the nuclear
/// attraction, but the two roles are independent: a ghost center carries basis
/// functions with zero charge.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtomCenter {
    pub position: Vector3<f64>,
    pub charge: f64,
    pub atomic_number: u32,
}

impl AtomCenter {
    pub fn new(atomic_number: u32, position: Vector3<f64>) -> Self {
        Self {
            position,
            charge: atomic_number as f64,
            atomic_number,
        }
    }

    /// Zips separate position and charge arrays into centers. The atomic number of
    /// each center is its charge rounded to the nearest integer.
    pub fn from_arrays(positions: &[Vector3<f64>], charges: &[f64]) -> Result<Vec<Self>> {
        if positions.len() != charges.len() {
            return Err(DftError::LengthMismatch {
                what: "nuclear charges",
                expected: positions.len(),
                found: charges.len(),
            });
        }

        Ok(positions
            .iter()
            .zip(charges)
            .map(|(&position, &charge)| Self {
                position,
                charge,
                atomic_number: charge.round().max(0.0) as u32,
            })
            .collect())
    }

    /// Returns the charge of this nucleus
    pub fn nuclear_charge(&self) -> f64 {
        self.charge
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }
}
