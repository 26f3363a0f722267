mod basis_set;
mod molecule;

use std::{fs::File, io::BufReader, path::Path};

use serde::de::DeserializeOwned;

pub use basis_set::ConfigBasisSet;
pub use molecule::ConfigMolecule;

use crate::error::{DftError, Result};

/// Reads and deserializes a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DftError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_json::from_reader(BufReader::new(file))?)
}
