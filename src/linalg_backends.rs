// src/linalg_backends.rs

use ndarray::{Array1, Array2};
use std::error::Error;

/// A thread-safe wrapper for standard dynamic errors,
/// so they implement `Send` and `Sync`.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput {
    /// Eigenvalues in ascending order.
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors as columns of the matrix.
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<f64>,
}

/// Trait for symmetric eigendecomposition (similar to LAPACK's DSYEVD).
/// Implementers read only the upper triangle of `matrix`.
///
/// Implementations must be deterministic: the same input yields the same output
/// on every call, with no hidden random state.
pub trait BackendEigh {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, ThreadSafeStdError>;
}

fn check_square(matrix: &Array2<f64>) -> Result<(), ThreadSafeStdError> {
    if matrix.nrows() != matrix.ncols() {
        return Err(format!(
            "Matrix must be square for eigendecomposition, got {}x{}.",
            matrix.nrows(),
            matrix.ncols()
        )
        .into());
    }
    Ok(())
}

// --- NdarrayLinAlgBackend (LAPACK through ndarray-linalg) ---

#[cfg(feature = "lapack")]
pub use lapack_backend::NdarrayLinAlgBackend;

#[cfg(feature = "lapack")]
mod lapack_backend {
    use super::{check_square, BackendEigh, EighOutput, ThreadSafeStdError};
    use ndarray::{Array1, Array2};
    use ndarray_linalg::{Eigh as NdLinalgEigh, UPLO};

    #[derive(Debug, Default, Copy, Clone)]
    pub struct NdarrayLinAlgBackend;

    impl BackendEigh for NdarrayLinAlgBackend {
        fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, ThreadSafeStdError> {
            check_square(matrix)?;
            if matrix.is_empty() {
                return Ok(EighOutput {
                    eigenvalues: Array1::zeros(0),
                    eigenvectors: Array2::zeros((0, 0)),
                });
            }
            let (eigenvalues, eigenvectors) = matrix
                .eigh(UPLO::Upper)
                .map_err(|e| -> ThreadSafeStdError { Box::new(e) })?;
            Ok(EighOutput {
                eigenvalues,
                eigenvectors,
            })
        }
    }
}

// --- JacobiEigenBackend (pure Rust) ---

/// Cyclic Jacobi eigensolver for small dense symmetric matrices.
///
/// Sweeps the upper triangle in a fixed row-major order, so results are bit-for-bit
/// reproducible. Cost is O(p^3) per sweep; correlation matrices of tabular data are
/// small enough that this is not a concern.
#[derive(Debug, Clone, Copy)]
pub struct JacobiEigenBackend {
    pub max_sweeps: usize,
}

impl Default for JacobiEigenBackend {
    fn default() -> Self {
        Self { max_sweeps: 100 }
    }
}

impl BackendEigh for JacobiEigenBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, ThreadSafeStdError> {
        check_square(matrix)?;
        let n = matrix.nrows();

        // Mirror the upper triangle so the working copy is exactly symmetric.
        let mut a = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                a[[i, j]] = matrix[[i, j]];
                a[[j, i]] = matrix[[i, j]];
            }
        }
        if a.iter().any(|v| !v.is_finite()) {
            return Err("Matrix contains non-finite entries.".into());
        }
        let mut v = Array2::<f64>::eye(n);

        let frobenius = a.iter().map(|x| x * x).sum::<f64>().sqrt();
        let target = f64::EPSILON * frobenius.max(f64::MIN_POSITIVE);

        let mut converged = false;
        for _sweep in 0..self.max_sweeps {
            if off_diagonal_norm(&a) <= target {
                converged = true;
                break;
            }
            for p in 0..n {
                for q in (p + 1)..n {
                    let apq = a[[p, q]];
                    if apq == 0.0 {
                        continue;
                    }
                    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                    let t = if theta.abs() > 1e150 {
                        0.5 / theta
                    } else {
                        theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
                    };
                    let c = 1.0 / (t * t + 1.0).sqrt();
                    let s = t * c;

                    for k in 0..n {
                        let akp = a[[k, p]];
                        let akq = a[[k, q]];
                        a[[k, p]] = c * akp - s * akq;
                        a[[k, q]] = s * akp + c * akq;
                    }
                    for k in 0..n {
                        let apk = a[[p, k]];
                        let aqk = a[[q, k]];
                        a[[p, k]] = c * apk - s * aqk;
                        a[[q, k]] = s * apk + c * aqk;
                    }
                    a[[p, q]] = 0.0;
                    a[[q, p]] = 0.0;

                    for k in 0..n {
                        let vkp = v[[k, p]];
                        let vkq = v[[k, q]];
                        v[[k, p]] = c * vkp - s * vkq;
                        v[[k, q]] = s * vkp + c * vkq;
                    }
                }
            }
        }
        if !converged && off_diagonal_norm(&a) > target {
            return Err(format!(
                "Jacobi eigensolver did not converge within {} sweeps.",
                self.max_sweeps
            )
            .into());
        }

        // Ascending order, matching LAPACK; the sort is stable so equal values keep
        // their diagonal position.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| a[[i, i]].total_cmp(&a[[j, j]]));
        let eigenvalues = Array1::from_iter(order.iter().map(|&i| a[[i, i]]));
        let mut eigenvectors = Array2::<f64>::zeros((n, n));
        for (dst, &src) in order.iter().enumerate() {
            eigenvectors.column_mut(dst).assign(&v.column(src));
        }
        Ok(EighOutput {
            eigenvalues,
            eigenvectors,
        })
    }
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += 2.0 * a[[i, j]] * a[[i, j]];
        }
    }
    sum.sqrt()
}

// --- LinAlgBackendProvider Dispatch ---

/// A provider struct that dispatches to the selected linear algebra backend
/// based on compile-time feature flags: LAPACK when a `backend_*` feature is
/// enabled, the Jacobi solver otherwise.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider;

impl LinAlgBackendProvider {
    pub fn new() -> Self {
        Self
    }
}

impl BackendEigh for LinAlgBackendProvider {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, ThreadSafeStdError> {
        #[cfg(feature = "lapack")]
        {
            NdarrayLinAlgBackend.eigh_upper(matrix)
        }
        #[cfg(not(feature = "lapack"))]
        {
            JacobiEigenBackend::default().eigh_upper(matrix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_decomposition_reconstructs(matrix: &Array2<f64>, out: &EighOutput, tol: f64) {
        let n = matrix.nrows();
        let lambda = Array2::from_diag(&out.eigenvalues);
        let rebuilt = out.eigenvectors.dot(&lambda).dot(&out.eigenvectors.t());
        for i in 0..n {
            for j in 0..n {
                assert_abs_diff_eq!(rebuilt[[i, j]], matrix[[i, j]], epsilon = tol);
            }
        }
        let gram = out.eigenvectors.t().dot(&out.eigenvectors);
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = tol);
            }
        }
    }

    #[test]
    fn jacobi_known_2x2() {
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let out = JacobiEigenBackend::default().eigh_upper(&m).unwrap();
        assert_abs_diff_eq!(out.eigenvalues[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.eigenvalues[1], 3.0, epsilon = 1e-12);
        assert_decomposition_reconstructs(&m, &out, 1e-12);
    }

    #[test]
    fn jacobi_reads_upper_triangle_only() {
        let upper = array![[4.0, 1.0, 0.5], [99.0, 3.0, 0.25], [99.0, 99.0, 2.0]];
        let full = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.25], [0.5, 0.25, 2.0]];
        let out = JacobiEigenBackend::default().eigh_upper(&upper).unwrap();
        assert_decomposition_reconstructs(&full, &out, 1e-10);
    }

    #[test]
    fn jacobi_diagonal_matrix_is_exact() {
        let m = Array2::<f64>::eye(4);
        let out = JacobiEigenBackend::default().eigh_upper(&m).unwrap();
        assert!(out.eigenvalues.iter().all(|&v| v == 1.0));
        assert_eq!(out.eigenvectors, Array2::<f64>::eye(4));
    }

    #[test]
    fn jacobi_rejects_non_square_and_non_finite() {
        let rect = Array2::<f64>::zeros((2, 3));
        assert!(JacobiEigenBackend::default().eigh_upper(&rect).is_err());
        let nan = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        assert!(JacobiEigenBackend::default().eigh_upper(&nan).is_err());
    }

    #[test]
    fn provider_matches_jacobi_eigenvalues() {
        let m = array![
            [1.0, 0.6, 0.3, -0.2],
            [0.6, 1.0, 0.1, 0.4],
            [0.3, 0.1, 1.0, 0.5],
            [-0.2, 0.4, 0.5, 1.0]
        ];
        let provided = LinAlgBackendProvider::new().eigh_upper(&m).unwrap();
        let jacobi = JacobiEigenBackend::default().eigh_upper(&m).unwrap();
        for (a, b) in provided.eigenvalues.iter().zip(jacobi.eigenvalues.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
        assert_decomposition_reconstructs(&m, &provided, 1e-10);
    }
}
