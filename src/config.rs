// src/config.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PcaError, Result};

pub const DEFAULT_VARIANCE_THRESHOLD_PERCENT: f64 = 80.0;
pub const DEFAULT_NEAR_ZERO_EIGENVALUE_TOLERANCE: f64 = 1e-8;

/// How the dropped reference category of a nominal column is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCategoryRule {
    /// First label in byte-wise sorted order.
    #[default]
    FirstSorted,
    /// Label given per column in [`PipelineConfig::reference_categories`].
    Explicit,
}

/// What the standardizer does with a column whose standard deviation is ~0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Abort the run with `PcaError::ZeroVariance`.
    #[default]
    Fail,
    /// Drop the column, log a warning and record it in the standardization summary.
    DropWithWarning,
}

/// Run configuration for the whole pipeline.
///
/// All fields have defaults, so a partial JSON/TOML document deserializes into a
/// usable config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ordinal_columns: BTreeSet<String>,
    pub nominal_columns: BTreeSet<String>,
    /// Explicit rank order per ordinal column. Columns without an entry use
    /// lexicographic order of their observed labels.
    pub ordinal_category_order: BTreeMap<String, Vec<String>>,
    pub variance_threshold_percent: f64,
    pub reference_category_rule: ReferenceCategoryRule,
    pub reference_categories: BTreeMap<String, String>,
    pub zero_variance_policy: ZeroVariancePolicy,
    /// Component whose contributors are reported as the primary ranking.
    pub contributor_component: usize,
    pub near_zero_eigenvalue_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ordinal_columns: BTreeSet::new(),
            nominal_columns: BTreeSet::new(),
            ordinal_category_order: BTreeMap::new(),
            variance_threshold_percent: DEFAULT_VARIANCE_THRESHOLD_PERCENT,
            reference_category_rule: ReferenceCategoryRule::default(),
            reference_categories: BTreeMap::new(),
            zero_variance_policy: ZeroVariancePolicy::default(),
            contributor_component: 0,
            near_zero_eigenvalue_tolerance: DEFAULT_NEAR_ZERO_EIGENVALUE_TOLERANCE,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordinal<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.ordinal_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn nominal<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.nominal_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declares `column` ordinal with the given low-to-high category order.
    pub fn ordinal_order<S: Into<String>>(
        mut self,
        column: impl Into<String>,
        order: impl IntoIterator<Item = S>,
    ) -> Self {
        let column = column.into();
        self.ordinal_columns.insert(column.clone());
        self.ordinal_category_order
            .insert(column, order.into_iter().map(Into::into).collect());
        self
    }

    /// Switches to the explicit reference rule and sets the reference for `column`.
    pub fn reference_category(
        mut self,
        column: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        self.reference_category_rule = ReferenceCategoryRule::Explicit;
        self.reference_categories
            .insert(column.into(), category.into());
        self
    }

    pub fn variance_threshold(mut self, percent: f64) -> Self {
        self.variance_threshold_percent = percent;
        self
    }

    pub fn zero_variance_policy(mut self, policy: ZeroVariancePolicy) -> Self {
        self.zero_variance_policy = policy;
        self
    }

    pub fn contributor_component(mut self, component: usize) -> Self {
        self.contributor_component = component;
        self
    }

    pub fn near_zero_tolerance(mut self, tolerance: f64) -> Self {
        self.near_zero_eigenvalue_tolerance = tolerance;
        self
    }

    /// Checks the table-independent invariants of the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(column) = self.ordinal_columns.intersection(&self.nominal_columns).next() {
            return Err(PcaError::ConflictingColumnRole {
                column: column.clone(),
            });
        }
        validate_threshold_percent(self.variance_threshold_percent)?;
        let tol = self.near_zero_eigenvalue_tolerance;
        if !tol.is_finite() || tol < 0.0 {
            return Err(PcaError::InvalidConfig(format!(
                "near_zero_eigenvalue_tolerance must be finite and non-negative, got {tol}"
            )));
        }
        for column in self.ordinal_category_order.keys() {
            if !self.ordinal_columns.contains(column) {
                return Err(PcaError::InvalidConfig(format!(
                    "category order given for '{column}', which is not an ordinal column"
                )));
            }
        }
        for column in self.reference_categories.keys() {
            if !self.nominal_columns.contains(column) {
                return Err(PcaError::InvalidConfig(format!(
                    "reference category given for '{column}', which is not a nominal column"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_threshold_percent(percent: f64) -> Result<()> {
    if !(percent > 0.0 && percent <= 100.0) {
        return Err(PcaError::InvalidConfig(format!(
            "variance threshold must lie in (0, 100], got {percent}"
        )));
    }
    Ok(())
}
