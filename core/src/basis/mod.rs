mod functions;
mod primitives;
mod set;

pub use functions::{BasisFunction, ContractedGaussian, Gaussian};
pub use primitives::{PrimitiveGaussian, PrimitiveSet, MAX_ANGULAR};
pub use set::{AtomicBasis, BasisSet};
pub(crate) use set::ElectronShell;
