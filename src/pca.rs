// Principal component analysis (PCA) on the correlation matrix

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_NEAR_ZERO_EIGENVALUE_TOLERANCE;
use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, LinAlgBackendProvider};
use crate::standardize::StandardizedTable;

/// Result of a correlation-matrix PCA.
///
/// Components are ordered by descending eigenvalue. Every eigenvector has its
/// largest-magnitude entry positive, so identical input always yields identical
/// loadings and scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    /// Variable names, one per row of `eigenvectors` and `loadings`.
    pub variable_names: Vec<String>,
    /// Symmetrized Pearson correlation matrix, shape (p, p).
    pub correlation: Array2<f64>,
    /// Eigenvalues, descending, clamped to be non-negative. Shape (p).
    pub eigenvalues: Array1<f64>,
    /// Unit-norm eigenvectors as columns. Shape (p, p).
    pub eigenvectors: Array2<f64>,
    /// Percent of total variance per component; sums to 100. Shape (p).
    pub explained_variance_ratio: Array1<f64>,
    /// `eigenvectors[i, j] * sqrt(eigenvalues[j])`: correlation of variable i with component j.
    pub loadings: Array2<f64>,
    /// Observations in component space, shape (n, p).
    pub scores: Array2<f64>,
    /// Components whose eigenvalue is at or below the near-zero tolerance. These carry
    /// no signal; they appear when the data is rank-deficient (e.g. n = p, or perfectly
    /// collinear variables).
    pub near_zero_components: Vec<usize>,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_rank_deficient(&self) -> bool {
        !self.near_zero_components.is_empty()
    }
}

/// Correlation-matrix PCA engine.
///
/// The engine holds only settings and a backend handle; `fit` is a pure function of
/// its input.
///
/// # Examples
///
/// ```
/// use mixed_pca::{standardize, CorrelationPca, Table, ZeroVariancePolicy};
/// use ndarray::array;
///
/// let data = array![[1.0, 2.0], [2.0, 4.5], [3.0, 5.5], [4.0, 8.0]];
/// let table = Table::from_matrix(&["x", "y"], &data).unwrap();
/// let z = standardize(&table, ZeroVariancePolicy::Fail).unwrap();
/// let result = CorrelationPca::new().fit(&z).unwrap();
/// assert_eq!(result.n_components(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CorrelationPca<B = LinAlgBackendProvider> {
    backend: B,
    near_zero_tolerance: f64,
}

impl Default for CorrelationPca<LinAlgBackendProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationPca<LinAlgBackendProvider> {
    /// Creates an engine using the backend selected by cargo features.
    pub fn new() -> Self {
        Self::with_backend(LinAlgBackendProvider::new())
    }
}

impl<B: BackendEigh> CorrelationPca<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            near_zero_tolerance: DEFAULT_NEAR_ZERO_EIGENVALUE_TOLERANCE,
        }
    }

    /// Eigenvalues at or below `tolerance` are reported as near-zero.
    pub fn near_zero_tolerance(mut self, tolerance: f64) -> Self {
        self.near_zero_tolerance = tolerance;
        self
    }

    /// Fits PCA to a standardized table.
    ///
    /// # Errors
    /// - `DegenerateInput` if there are no variables or the correlation matrix has
    ///   non-finite entries.
    /// - `InsufficientRows` if there are fewer than 2 rows or fewer rows than variables.
    /// - `Decomposition` if the eigen backend fails.
    pub fn fit(&self, data: &StandardizedTable) -> Result<PcaResult> {
        let n_samples = data.n_rows();
        let n_features = data.n_variables();

        if n_features == 0 {
            return Err(PcaError::DegenerateInput(
                "no variables left to analyse after encoding and standardization".to_string(),
            ));
        }
        if n_samples < 2 || n_samples < n_features {
            return Err(PcaError::InsufficientRows {
                rows: n_samples,
                columns: n_features,
            });
        }

        let correlation = correlation_matrix(data.values.view());
        check_finite(&correlation, &data.variable_names)?;

        let eig = self
            .backend
            .eigh_upper(&correlation)
            .map_err(|e| PcaError::Decomposition(e.to_string()))?;
        if eig.eigenvalues.len() != n_features
            || eig.eigenvectors.dim() != (n_features, n_features)
        {
            return Err(PcaError::Decomposition(format!(
                "backend returned {} eigenvalues and a {:?} eigenvector matrix for a {}x{} input",
                eig.eigenvalues.len(),
                eig.eigenvectors.dim(),
                n_features,
                n_features
            )));
        }

        let (eigenvalues, eigenvectors) = sort_and_orient(&eig.eigenvalues, &eig.eigenvectors);

        let total: f64 = eigenvalues.sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(PcaError::DegenerateInput(format!(
                "sum of eigenvalues is {total}; the correlation matrix carries no variance"
            )));
        }
        let explained_variance_ratio = eigenvalues.mapv(|v| v / total * 100.0);
        let loadings = &eigenvectors * &eigenvalues.mapv(f64::sqrt);
        let scores = data.values.dot(&eigenvectors);

        let near_zero_components: Vec<usize> = eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, &v)| v <= self.near_zero_tolerance)
            .map(|(i, _)| i)
            .collect();
        if !near_zero_components.is_empty() {
            warn!(
                "Correlation matrix is near-singular: {} of {} eigenvalues are <= {:e} (components {:?}). \
                 These components carry no signal; {} rows for {} variables.",
                near_zero_components.len(),
                n_features,
                self.near_zero_tolerance,
                near_zero_components,
                n_samples,
                n_features
            );
        }

        debug!("Eigenvalues (descending): {:?}", eigenvalues.to_vec());
        info!(
            "PCA fitted on {} rows x {} variables; first component explains {:.2}% of variance.",
            n_samples, n_features, explained_variance_ratio[0]
        );

        Ok(PcaResult {
            variable_names: data.variable_names.clone(),
            correlation,
            eigenvalues,
            eigenvectors,
            explained_variance_ratio,
            loadings,
            scores,
            near_zero_components,
        })
    }
}

/// Pearson correlation of the columns of an already standardized matrix:
/// `(Zᵀ Z / n + (Zᵀ Z / n)ᵀ) / 2`. The symmetrization removes rounding asymmetry.
pub fn correlation_matrix(standardized: ArrayView2<f64>) -> Array2<f64> {
    let n_samples = standardized.nrows() as f64;
    let mut corr = standardized.t().dot(&standardized);
    corr /= n_samples;
    let transposed = corr.t().to_owned();
    corr += &transposed;
    corr /= 2.0;
    corr
}

fn check_finite(matrix: &Array2<f64>, names: &[String]) -> Result<()> {
    if let Some(((i, j), value)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PcaError::DegenerateInput(format!(
            "correlation between '{}' and '{}' is {}",
            names[i], names[j], value
        )));
    }
    Ok(())
}

/// Orders eigenpairs by descending eigenvalue and fixes each eigenvector's sign.
///
/// The sort is stable: equal eigenvalues keep the backend's order. Within a repeated
/// eigenvalue the eigenvectors are only defined up to a rotation of that eigenspace,
/// so their individual directions are not meaningful.
///
/// Each eigenvector is rescaled to unit norm and flipped so its largest-magnitude
/// entry is positive (the first such entry if several tie exactly). Negative
/// eigenvalues from rounding are clamped to zero.
pub fn sort_and_orient(
    eigenvalues: &Array1<f64>,
    eigenvectors: &Array2<f64>,
) -> (Array1<f64>, Array2<f64>) {
    let n = eigenvalues.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let sorted_values = Array1::from_iter(order.iter().map(|&i| eigenvalues[i].max(0.0)));
    let mut sorted_vectors = Array2::<f64>::zeros((eigenvectors.nrows(), n));
    for (dst, &src) in order.iter().enumerate() {
        let mut column = eigenvectors.column(src).to_owned();
        let norm = column.dot(&column).sqrt();
        if norm > 1e-12 {
            column /= norm;
        }
        let mut pivot = 0;
        for (i, v) in column.iter().enumerate() {
            if v.abs() > column[pivot].abs() {
                pivot = i;
            }
        }
        if !column.is_empty() && column[pivot] < 0.0 {
            column.mapv_inplace(|x| -x);
        }
        sorted_vectors.column_mut(dst).assign(&column);
    }
    (sorted_values, sorted_vectors)
}

/// Column-wise dot products of `eigenvectors`; the identity for an orthonormal basis.
pub fn eigenvector_gram(eigenvectors: &Array2<f64>) -> Array2<f64> {
    eigenvectors.t().dot(eigenvectors)
}

/// Per-variable variance reproduced by the first `k` components (the communality).
/// With all components retained this is 1 for every standardized variable.
pub fn communalities(loadings: &Array2<f64>, k: usize) -> Array1<f64> {
    let k = k.min(loadings.ncols());
    loadings
        .slice(ndarray::s![.., ..k])
        .mapv(|x| x * x)
        .sum_axis(Axis(1))
}
