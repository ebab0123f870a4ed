use crate::config::{PipelineConfig, ZeroVariancePolicy};
use crate::error::PcaError;
use crate::linalg_backends::JacobiEigenBackend;
use crate::pca::{communalities, correlation_matrix, eigenvector_gram, sort_and_orient, CorrelationPca};
use crate::pipeline::{run, run_with_backend};
use crate::standardize::{standardize, StandardizedTable};
use crate::table::{Column, Table};

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

const TOLERANCE: f64 = 1e-9;

/// Data driven by two latent factors plus noise, so the spectrum is spread out.
fn generate_factor_data(n_samples: usize, n_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let weights: Vec<(f64, f64)> = (0..n_features)
        .map(|j| (1.0 + j as f64 * 0.3, 2.0 - j as f64 * 0.5))
        .collect();
    let mut data = Array2::<f64>::zeros((n_samples, n_features));
    for i in 0..n_samples {
        let f1 = normal.sample(&mut rng);
        let f2 = normal.sample(&mut rng);
        for (j, &(w1, w2)) in weights.iter().enumerate() {
            data[[i, j]] = w1 * f1 + w2 * f2 + 0.5 * normal.sample(&mut rng);
        }
    }
    data
}

fn names(p: usize) -> Vec<String> {
    (0..p).map(|j| format!("v{j}")).collect()
}

fn standardized(data: &Array2<f64>) -> StandardizedTable {
    let table = Table::from_matrix(&names(data.ncols()), data).unwrap();
    standardize(&table, ZeroVariancePolicy::Fail).unwrap()
}

#[cfg(test)]
mod pca_tests {
    use super::*;

    #[test]
    fn test_explained_variance_sums_to_100() {
        for (n, p, seed) in [(50, 6, 1u64), (200, 3, 2), (12, 12, 3), (30, 2, 4)] {
            let z = standardized(&generate_factor_data(n, p, seed));
            let result = CorrelationPca::new().fit(&z).unwrap();
            assert_abs_diff_eq!(result.explained_variance_ratio.sum(), 100.0, epsilon = 1e-6);
            for w in result.eigenvalues.to_vec().windows(2) {
                assert!(w[0] >= w[1], "eigenvalues not descending: {:?}", result.eigenvalues);
            }
        }
    }

    #[test]
    fn test_eigenvectors_are_orthonormal() {
        let z = standardized(&generate_factor_data(80, 7, 11));
        let result = CorrelationPca::new().fit(&z).unwrap();
        let gram = eigenvector_gram(&result.eigenvectors);
        for i in 0..7 {
            for j in 0..7 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = TOLERANCE);
            }
        }
    }

    #[test]
    fn test_largest_magnitude_entry_is_positive() {
        let z = standardized(&generate_factor_data(60, 5, 21));
        let result = CorrelationPca::new().fit(&z).unwrap();
        for (j, column) in result.eigenvectors.axis_iter(Axis(1)).enumerate() {
            let pivot = column
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            assert!(pivot > 0.0, "component {j} has negative dominant entry: {column:?}");
        }
    }

    #[test]
    fn test_repeated_runs_are_bit_identical() {
        let data = generate_factor_data(40, 5, 7);
        let first = CorrelationPca::new().fit(&standardized(&data)).unwrap();
        let second = CorrelationPca::new().fit(&standardized(&data)).unwrap();
        assert_eq!(first.loadings, second.loadings);
        assert_eq!(first.scores, second.scores);
        assert_eq!(first.explained_variance_ratio, second.explained_variance_ratio);
    }

    #[test]
    fn test_loadings_are_variable_component_correlations() {
        let z = standardized(&generate_factor_data(120, 4, 5));
        let result = CorrelationPca::new().fit(&z).unwrap();
        let n = z.n_rows() as f64;
        for j in 0..4 {
            let score = result.scores.column(j);
            let score_std = score.std(0.0);
            for i in 0..4 {
                let corr = z.values.column(i).dot(&score) / n / score_std;
                assert_abs_diff_eq!(result.loadings[[i, j]], corr, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_score_variance_equals_eigenvalue() {
        let z = standardized(&generate_factor_data(90, 5, 9));
        let result = CorrelationPca::new().fit(&z).unwrap();
        let variances = result.scores.var_axis(Axis(0), 0.0);
        for j in 0..5 {
            assert_abs_diff_eq!(variances[j], result.eigenvalues[j], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_full_communalities_are_one() {
        let z = standardized(&generate_factor_data(70, 6, 13));
        let result = CorrelationPca::new().fit(&z).unwrap();
        let h = communalities(&result.loadings, 6);
        for v in h.iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-8);
        }
        let partial = communalities(&result.loadings, 1);
        assert!(partial.iter().all(|&v| v < 1.0 + 1e-12));
    }

    #[test]
    fn test_jacobi_backend_agrees_with_default() {
        let z = standardized(&generate_factor_data(100, 6, 17));
        let default = CorrelationPca::new().fit(&z).unwrap();
        let jacobi = CorrelationPca::with_backend(JacobiEigenBackend::default())
            .fit(&z)
            .unwrap();
        for j in 0..6 {
            assert_abs_diff_eq!(default.eigenvalues[j], jacobi.eigenvalues[j], epsilon = 1e-9);
        }
        // Same sign convention, distinct eigenvalues: loadings must agree entry-wise.
        for (a, b) in default.loadings.iter().zip(jacobi.loadings.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_perfectly_correlated_columns() {
        let x: Vec<f64> = (0..100).map(|i| (i as f64 * 0.37).sin() * 10.0 + i as f64).collect();
        let table = Table::new(vec![
            Column::numeric("x", x.clone()),
            Column::numeric("x_scaled", x.iter().map(|v| 2.0 * v + 1.0).collect::<Vec<_>>()),
            Column::numeric("x_shifted", x.iter().map(|v| 0.5 * v - 3.0).collect::<Vec<_>>()),
        ])
        .unwrap();
        let report = run(&table, &PipelineConfig::new()).unwrap();
        let pca = &report.pca;
        assert_abs_diff_eq!(pca.eigenvalues[0], 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pca.explained_variance_ratio[0], 100.0, epsilon = 1e-6);
        assert_eq!(report.diagnostics.kaiser_count, 1);
        assert_eq!(report.diagnostics.variance_threshold.components, 1);
        assert_eq!(pca.near_zero_components, vec![1, 2]);
        for i in 0..3 {
            assert_abs_diff_eq!(pca.eigenvectors[[i, 0]], 1.0 / 3f64.sqrt(), epsilon = 1e-9);
            assert_abs_diff_eq!(pca.loadings[[i, 0]], 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_uncorrelated_columns_give_flat_spectrum() {
        // Walsh functions: zero mean, unit variance, mutually orthogonal.
        let c1 = vec![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        let c2 = vec![1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0];
        let c3 = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let c4: Vec<f64> = (0..8).map(|i| c1[i] * c2[i] * c3[i]).collect();
        let table = Table::new(vec![
            Column::numeric("a", c1),
            Column::numeric("b", c2),
            Column::numeric("c", c3),
            Column::numeric("d", c4),
        ])
        .unwrap();
        let report = run(&table, &PipelineConfig::new()).unwrap();
        for j in 0..4 {
            assert_abs_diff_eq!(report.pca.eigenvalues[j], 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(report.pca.explained_variance_ratio[j], 25.0, epsilon = 1e-6);
        }
        assert_eq!(report.diagnostics.kaiser_count, 0);
        assert!(report.diagnostics.kaiser_retains_none());
        assert!(report.pca.near_zero_components.is_empty());
    }

    #[test]
    fn test_square_data_flags_near_zero_eigenvalues() {
        let z = standardized(&generate_factor_data(4, 4, 31));
        let result = CorrelationPca::new().fit(&z).expect("n = p must still succeed");
        assert!(result.is_rank_deficient());
        // Centering leaves rank <= n - 1 = 3, so the last eigenvalue is ~0.
        assert!(result.near_zero_components.contains(&3));
        assert!(result.eigenvalues[3] < 1e-8);
        assert_abs_diff_eq!(result.explained_variance_ratio.sum(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fewer_rows_than_variables_fails() {
        let z = standardized(&generate_factor_data(3, 5, 41));
        assert!(matches!(
            CorrelationPca::new().fit(&z),
            Err(PcaError::InsufficientRows { rows: 3, columns: 5 })
        ));
    }

    #[test]
    fn test_single_row_fails() {
        let z = StandardizedTable {
            variable_names: vec!["a".into()],
            values: array![[0.0]],
            means: array![1.0],
            std_devs: array![1.0],
            dropped: Vec::new(),
        };
        assert!(matches!(
            CorrelationPca::new().fit(&z),
            Err(PcaError::InsufficientRows { rows: 1, columns: 1 })
        ));
    }

    #[test]
    fn test_non_finite_correlation_is_degenerate() {
        let z = StandardizedTable {
            variable_names: vec!["a".into(), "b".into()],
            values: array![[1.0, f64::INFINITY], [-1.0, 0.0], [0.0, 0.0]],
            means: Array1::zeros(2),
            std_devs: Array1::ones(2),
            dropped: Vec::new(),
        };
        match CorrelationPca::new().fit(&z) {
            Err(PcaError::DegenerateInput(msg)) => assert!(msg.contains("'a'") || msg.contains("'b'"), "{msg}"),
            other => panic!("expected DegenerateInput, got {other:?}"),
        }
    }

    #[test]
    fn test_no_variables_is_degenerate() {
        let z = StandardizedTable {
            variable_names: Vec::new(),
            values: Array2::zeros((5, 0)),
            means: Array1::zeros(0),
            std_devs: Array1::zeros(0),
            dropped: Vec::new(),
        };
        assert!(matches!(CorrelationPca::new().fit(&z), Err(PcaError::DegenerateInput(_))));
    }

    #[test]
    fn test_correlation_matrix_is_exactly_symmetric() {
        let z = standardized(&generate_factor_data(33, 6, 3));
        let c = correlation_matrix(z.values.view());
        assert_eq!(c, c.t().to_owned());
        for i in 0..6 {
            assert_abs_diff_eq!(c[[i, i]], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sort_and_orient_tie_break_and_sign() {
        // Ascending as a backend would return them; two equal eigenvalues at 1 and 2.
        let values = array![0.5, 2.0, 2.0, -1e-17];
        let vectors = array![
            [1.0, 0.0, 0.0, 0.0],
            [0.0, -0.8, 0.0, 0.0],
            [0.0, 0.6, 0.0, 1.0],
            [0.0, 0.0, -1.0, 0.0]
        ];
        let (sorted, oriented) = sort_and_orient(&values, &vectors);
        assert_eq!(sorted.to_vec(), vec![2.0, 2.0, 0.5, 0.0]);
        // Stable: backend column 1 before column 2.
        let expected = array![
            [0.0, 0.0, 1.0, 0.0],
            [0.8, 0.0, 0.0, 0.0],
            [-0.6, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 0.0]
        ];
        for (a, b) in oriented.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pipeline_with_jacobi_backend_matches_default() {
        let data = generate_factor_data(45, 4, 77);
        let table = Table::from_matrix(&names(4), &data).unwrap();
        let config = PipelineConfig::new();
        let default = run(&table, &config).unwrap();
        let jacobi = run_with_backend(&table, &config, JacobiEigenBackend::default()).unwrap();
        assert_eq!(default.diagnostics.kaiser_count, jacobi.diagnostics.kaiser_count);
        assert_eq!(
            default.diagnostics.variance_threshold.components,
            jacobi.diagnostics.variance_threshold.components
        );
        let order = |r: &crate::pipeline::PcaReport| -> Vec<usize> {
            r.diagnostics.primary_contributors().unwrap().iter().map(|c| c.index).collect()
        };
        assert_eq!(order(&default), order(&jacobi));
    }
}
