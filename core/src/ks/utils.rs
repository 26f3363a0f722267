use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::{
    contraction::symmetrize,
    error::{DftError, Result},
};

/// Overlap eigenvalues below this mark a linearly dependent basis.
const MIN_OVERLAP_EIGENVALUE: f64 = 1e-10;

/// Eigenpairs of a symmetric matrix with the eigenvalues in ascending order,
/// eigenvectors as the matching columns.
pub(super) fn ascending_eigenpairs(matrix: DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let SymmetricEigen {
        eigenvectors,
        eigenvalues,
    } = SymmetricEigen::new(matrix);

    let mut order = (0..eigenvalues.len()).collect::<Vec<_>>();
    order.sort_unstable_by(|&a, &b| eigenvalues[a].total_cmp(&eigenvalues[b]));

    (
        eigenvectors.select_columns(&order),
        DVector::from_iterator(order.len(), order.iter().map(|&k| eigenvalues[k])),
    )
}

/// Symmetric orthogonalization X = S^(-1/2), so that X^T S X = I.
pub(super) fn compute_transformation_matrix(overlap: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (u, eigenvalues) = ascending_eigenpairs(overlap.clone());

    if let Some(&smallest) = eigenvalues.iter().next() {
        if smallest < MIN_OVERLAP_EIGENVALUE {
            return Err(DftError::Linalg(format!(
                "overlap matrix is numerically singular, smallest eigenvalue {smallest:e}"
            )));
        }
    }

    let diagonal_inv_sqrt = DMatrix::from_diagonal(&eigenvalues.map(|f| f.sqrt().recip()));
    Ok(&u * (diagonal_inv_sqrt * &u.transpose()))
}

/// Solves H C = S C e through the orthogonalized basis. Returns the coefficients
/// and orbital energies in ascending order.
pub(super) fn solve_generalized(
    hamiltonian: &DMatrix<f64>,
    transform: &DMatrix<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let transformed = &transform.transpose() * (hamiltonian * transform);
    let (coefficients_prime, orbital_energies) = ascending_eigenpairs(transformed);
    (transform * coefficients_prime, orbital_energies)
}

/// D = sum_k n_k C_k C_k^T, two electrons per orbital from the lowest, and a single
/// electron in the last occupied orbital when the count is odd.
pub(super) fn compute_updated_density(
    coefficients: &DMatrix<f64>,
    n_basis: usize,
    n_electrons: usize,
) -> DMatrix<f64> {
    let n_occupied = n_electrons.div_ceil(2);
    let occupied = coefficients.columns(0, n_occupied);
    let occupations = DVector::from_fn(n_occupied, |k, _| {
        if 2 * k + 1 == n_electrons {
            1.0
        } else {
            2.0
        }
    });

    let weighted = &occupied * DMatrix::from_diagonal(&occupations);
    let density = weighted * occupied.transpose();
    debug_assert_eq!(density.nrows(), n_basis);
    symmetrize(&density)
}

/// Initial density of the extended Hückel (generalized Wolfsberg-Helmholz)
/// Hamiltonian built from the diagonal of the core Hamiltonian.
pub(super) fn compute_hückel_density(
    hamiltonian: &DMatrix<f64>,
    overlap: &DMatrix<f64>,
    transform: &DMatrix<f64>,
    n_electrons: usize,
) -> DMatrix<f64> {
    const WOLFSBERG_HELMHOLTZ: f64 = 1.75;
    let n_basis = hamiltonian.nrows();
    let diagonal = hamiltonian.diagonal();

    let hamiltonian_eht = DMatrix::from_fn(n_basis, n_basis, |i, j| {
        if i == j {
            diagonal[i]
        } else {
            WOLFSBERG_HELMHOLTZ * overlap[(i, j)] * (diagonal[i] + diagonal[j]) / 2.0
        }
    });

    let (coefficients, _orbital_energies) =
        solve_generalized(&symmetrize(&hamiltonian_eht), transform);
    compute_updated_density(&coefficients, n_basis, n_electrons)
}
