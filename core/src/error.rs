use std::{num::ParseFloatError, path::PathBuf};

use thiserror::Error;

/// The error type of every fallible operation in this crate.
///
/// Shape and configuration problems are detected eagerly, when engines, grids and
/// Hamiltonians are constructed. Once construction succeeded, the numeric paths
/// (recursions, contraction, assembly) cannot fail.
#[derive(Error, Debug)]
pub enum DftError {
    /// Two arrays that describe the same objects have different lengths, e.g. the
    /// number of nuclear positions and nuclear charges.
    #[error("length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// The contraction grouping does not partition the primitive set.
    #[error("contraction grouping covers {found} primitives, but {expected} were supplied")]
    GroupingMismatch { expected: usize, found: usize },

    /// A basis function without any primitive.
    #[error("basis function {index} has no primitives")]
    EmptyGroup { index: usize },

    #[error("angular momentum {found} exceeds the supported maximum of {max}")]
    AngularMomentumTooHigh { found: i32, max: i32 },

    #[error("primitive {index} has an invalid exponent {value}")]
    InvalidExponent { index: usize, value: f64 },

    #[error("no basis functions defined for atomic number {atomic_number}")]
    MissingBasis { atomic_number: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Parameter introspection was requested for a method the component does not have.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("linear algebra failure: {0}")]
    Linalg(String),

    #[error("I/O error at path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize input: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("failed to parse number: {0}")]
    ParseFloat(#[from] ParseFloatError),
}

pub type Result<T, E = DftError> = std::result::Result<T, E>;
