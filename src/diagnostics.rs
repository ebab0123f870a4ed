// src/diagnostics.rs

//! Summary quantities derived from a [`PcaResult`] for the presentation layer:
//! Kaiser count, cumulative-variance threshold, contributor rankings and the
//! biplot scale. Everything here is a pure function of its inputs.

use float_cmp::approx_eq;
use ndarray::{s, Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::validate_threshold_percent;
use crate::error::{PcaError, Result};
use crate::pca::PcaResult;

/// Eigenvalues must exceed `1 + KAISER_TOLERANCE` to count; this keeps rounding
/// noise on an identity-like correlation matrix from being read as signal.
pub const KAISER_TOLERANCE: f64 = 1e-9;

/// Cumulative variance within this many percentage points of the threshold counts
/// as reaching it.
pub const THRESHOLD_TOLERANCE_PERCENT: f64 = 1e-9;

/// Components retained by the Kaiser criterion (eigenvalue > 1 on the correlation
/// scale). Zero means none qualify, which is distinct from retaining all of them.
pub fn kaiser_count(eigenvalues: ArrayView1<f64>) -> usize {
    eigenvalues
        .iter()
        .filter(|&&v| v > 1.0 + KAISER_TOLERANCE)
        .count()
}

/// Running sum of the explained variance ratios, in percent.
pub fn cumulative_variance(ratios: ArrayView1<f64>) -> Array1<f64> {
    let mut acc = 0.0;
    ratios
        .iter()
        .map(|r| {
            acc += r;
            acc
        })
        .collect()
}

/// Smallest number of leading components whose cumulative variance reaches a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceThreshold {
    pub threshold_percent: f64,
    pub components: usize,
    pub achieved_percent: f64,
}

/// Finds the smallest `m` with cumulative variance `>= threshold_percent`.
///
/// If rounding keeps every prefix just below the threshold, all components are
/// returned.
pub fn components_for_variance(
    ratios: ArrayView1<f64>,
    threshold_percent: f64,
) -> Result<VarianceThreshold> {
    validate_threshold_percent(threshold_percent)?;
    let cumulative = cumulative_variance(ratios);
    let reached = cumulative.iter().position(|&c| {
        c >= threshold_percent
            || approx_eq!(f64, c, threshold_percent, epsilon = THRESHOLD_TOLERANCE_PERCENT)
    });
    let components = reached.map_or(cumulative.len(), |i| i + 1);
    let achieved_percent = if components == 0 {
        0.0
    } else {
        cumulative[components - 1]
    };
    Ok(VarianceThreshold {
        threshold_percent,
        components,
        achieved_percent,
    })
}

/// A variable's loading on one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub variable: String,
    /// Position of the variable in the PCA input.
    pub index: usize,
    pub loading: f64,
}

impl Contributor {
    pub fn magnitude(&self) -> f64 {
        self.loading.abs()
    }
}

/// Ranks variables by absolute loading on `component`, largest first.
/// Equal magnitudes keep variable order.
pub fn rank_contributors(
    loadings: ArrayView2<f64>,
    variable_names: &[String],
    component: usize,
) -> Result<Vec<Contributor>> {
    if component >= loadings.ncols() {
        return Err(PcaError::ComponentOutOfRange {
            component,
            available: loadings.ncols(),
        });
    }
    if variable_names.len() != loadings.nrows() {
        return Err(PcaError::InvalidConfig(format!(
            "{} variable names for {} loading rows",
            variable_names.len(),
            loadings.nrows()
        )));
    }
    let mut ranked: Vec<Contributor> = loadings
        .column(component)
        .iter()
        .zip(variable_names)
        .enumerate()
        .map(|(index, (&loading, name))| Contributor {
            variable: name.clone(),
            index,
            loading,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.magnitude()
            .total_cmp(&a.magnitude())
            .then(a.index.cmp(&b.index))
    });
    Ok(ranked)
}

/// Factor mapping the loadings of the first two components into `[-1, 1]`, the way
/// a biplot overlays variable arrows on a score scatter. `None` with fewer than two
/// components or all-zero loadings.
pub fn biplot_scale(loadings: ArrayView2<f64>) -> Option<f64> {
    if loadings.ncols() < 2 || loadings.nrows() == 0 {
        return None;
    }
    let max = loadings
        .slice(s![.., ..2])
        .iter()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    (max > 0.0).then(|| 1.0 / max)
}

/// Everything the presentation layer needs besides the raw PCA matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub kaiser_count: usize,
    pub cumulative_variance_percent: Array1<f64>,
    pub variance_threshold: VarianceThreshold,
    /// Component whose ranking is reported by [`Diagnostics::primary_contributors`].
    pub contributor_component: usize,
    /// `contributors[j]` ranks all variables on component `j`.
    pub contributors: Vec<Vec<Contributor>>,
    pub biplot_scale: Option<f64>,
}

impl Diagnostics {
    /// Derives diagnostics from a PCA result.
    ///
    /// # Errors
    /// `InvalidConfig` for a threshold outside `(0, 100]`, `ComponentOutOfRange` if
    /// `contributor_component` does not exist.
    pub fn from_result(
        result: &PcaResult,
        threshold_percent: f64,
        contributor_component: usize,
    ) -> Result<Self> {
        let n_components = result.n_components();
        if contributor_component >= n_components {
            return Err(PcaError::ComponentOutOfRange {
                component: contributor_component,
                available: n_components,
            });
        }
        let contributors = (0..n_components)
            .map(|j| rank_contributors(result.loadings.view(), &result.variable_names, j))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            kaiser_count: kaiser_count(result.eigenvalues.view()),
            cumulative_variance_percent: cumulative_variance(
                result.explained_variance_ratio.view(),
            ),
            variance_threshold: components_for_variance(
                result.explained_variance_ratio.view(),
                threshold_percent,
            )?,
            contributor_component,
            contributors,
            biplot_scale: biplot_scale(result.loadings.view()),
        })
    }

    /// True when no eigenvalue exceeds 1, i.e. the Kaiser rule retains nothing.
    pub fn kaiser_retains_none(&self) -> bool {
        self.kaiser_count == 0
    }

    pub fn primary_contributors(&self) -> Result<&[Contributor]> {
        self.contributors_for(self.contributor_component)
    }

    pub fn contributors_for(&self, component: usize) -> Result<&[Contributor]> {
        self.contributors
            .get(component)
            .map(Vec::as_slice)
            .ok_or(PcaError::ComponentOutOfRange {
                component,
                available: self.contributors.len(),
            })
    }

    /// The `k` strongest contributors to `component` (fewer if there are fewer variables).
    pub fn top_contributors(&self, component: usize, k: usize) -> Result<&[Contributor]> {
        let ranked = self.contributors_for(component)?;
        Ok(&ranked[..k.min(ranked.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn kaiser_counts_strictly_greater_than_one() {
        assert_eq!(kaiser_count(array![2.5, 1.2, 1.0, 0.3].view()), 2);
        assert_eq!(kaiser_count(array![1.0, 1.0, 1.0, 1.0].view()), 0);
        assert_eq!(kaiser_count(array![1.0 + 1e-14, 1.0 - 1e-14].view()), 0);
        assert_eq!(kaiser_count(Array1::<f64>::zeros(0).view()), 0);
    }

    #[test]
    fn threshold_picks_smallest_prefix() {
        let ratios = array![50.0, 25.0, 15.0, 10.0];
        let t = components_for_variance(ratios.view(), 80.0).unwrap();
        assert_eq!(t.components, 3);
        assert_abs_diff_eq!(t.achieved_percent, 90.0, epsilon = 1e-12);

        let exact = components_for_variance(ratios.view(), 75.0).unwrap();
        assert_eq!(exact.components, 2);
    }

    #[test]
    fn threshold_at_100_survives_rounding() {
        // Cumulative sum lands a hair below 100.
        let ratios = array![33.333333333333336, 33.33333333333333, 33.33333333333332];
        let t = components_for_variance(ratios.view(), 100.0).unwrap();
        assert_eq!(t.components, 3);
    }

    #[test]
    fn threshold_falls_back_to_all_components() {
        let ratios = array![40.0, 30.0, 29.0];
        let t = components_for_variance(ratios.view(), 100.0).unwrap();
        assert_eq!(t.components, 3);
        assert_abs_diff_eq!(t.achieved_percent, 99.0, epsilon = 1e-12);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let ratios = array![60.0, 40.0];
        assert!(components_for_variance(ratios.view(), 0.0).is_err());
        assert!(components_for_variance(ratios.view(), 120.0).is_err());
    }

    #[test]
    fn contributors_sorted_by_magnitude_with_index_ties() {
        let loadings = array![[0.5, 0.1], [-0.9, 0.2], [0.5, -0.3], [-0.5, 0.0]];
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_contributors(loadings.view(), &names, 0).unwrap();
        let order: Vec<&str> = ranked.iter().map(|c| c.variable.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
        assert_eq!(ranked[0].loading, -0.9);

        let second = rank_contributors(loadings.view(), &names, 1).unwrap();
        assert_eq!(second[0].variable, "c");

        assert!(matches!(
            rank_contributors(loadings.view(), &names, 2),
            Err(PcaError::ComponentOutOfRange { component: 2, available: 2 })
        ));
    }

    #[test]
    fn biplot_scale_uses_first_two_components() {
        let loadings = array![[0.5, -0.8, 5.0], [0.25, 0.4, -7.0]];
        assert_abs_diff_eq!(biplot_scale(loadings.view()).unwrap(), 1.25, epsilon = 1e-12);
        assert_eq!(biplot_scale(array![[0.3], [0.4]].view()), None);
    }

    #[test]
    fn primary_contributors_checks_component() {
        let loadings = array![[0.9, 0.1], [0.2, -0.7]];
        let names: Vec<String> = vec!["a".into(), "b".into()];
        let mut diagnostics = Diagnostics {
            kaiser_count: 1,
            cumulative_variance_percent: array![60.0, 100.0],
            variance_threshold: components_for_variance(array![60.0, 40.0].view(), 80.0).unwrap(),
            contributor_component: 1,
            contributors: (0..2)
                .map(|j| rank_contributors(loadings.view(), &names, j).unwrap())
                .collect(),
            biplot_scale: biplot_scale(loadings.view()),
        };
        assert_eq!(diagnostics.primary_contributors().unwrap()[0].variable, "b");

        diagnostics.contributor_component = 7;
        assert!(matches!(
            diagnostics.primary_contributors(),
            Err(PcaError::ComponentOutOfRange { component: 7, available: 2 })
        ));
    }

    #[test]
    fn cumulative_curve_is_running_sum() {
        let c = cumulative_variance(array![70.0, 20.0, 10.0].view());
        assert_eq!(c.to_vec(), vec![70.0, 90.0, 100.0]);
    }
}
