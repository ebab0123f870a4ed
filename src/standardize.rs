// src/standardize.rs

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::config::ZeroVariancePolicy;
use crate::error::{PcaError, Result};
use crate::table::{ColumnData, Table};

/// A column is constant when all its values are equal, or when its standard deviation
/// is within rounding of zero: `std <= f64::EPSILON * sqrt(n) * max |x|`.
pub fn is_effectively_constant(values: ArrayView1<f64>, std_dev: f64) -> bool {
    let Some(&first) = values.first() else {
        return true;
    };
    if values.iter().all(|&v| v == first) {
        return true;
    }
    let max_abs = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    std_dev <= f64::EPSILON * (values.len() as f64).sqrt() * max_abs
}

/// A column removed under [`ZeroVariancePolicy::DropWithWarning`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedColumn {
    pub name: String,
    pub std_dev: f64,
}

/// Numeric matrix whose columns have mean 0 and population standard deviation 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedTable {
    /// Names of the retained columns, in matrix column order.
    pub variable_names: Vec<String>,
    /// Standardized values, shape (n_rows, n_variables).
    pub values: Array2<f64>,
    /// Column means of the input, per retained variable.
    pub means: Array1<f64>,
    /// Population standard deviations of the input, per retained variable.
    pub std_devs: Array1<f64>,
    pub dropped: Vec<DroppedColumn>,
}

/// Standardization parameters without the (n x p) data matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizationSummary {
    pub variable_names: Vec<String>,
    pub means: Array1<f64>,
    pub std_devs: Array1<f64>,
    pub dropped: Vec<DroppedColumn>,
}

impl StandardizedTable {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_variables(&self) -> usize {
        self.values.ncols()
    }

    pub fn summary(&self) -> StandardizationSummary {
        StandardizationSummary {
            variable_names: self.variable_names.clone(),
            means: self.means.clone(),
            std_devs: self.std_devs.clone(),
            dropped: self.dropped.clone(),
        }
    }
}

/// Rescales every column of an all-numeric table to zero mean and unit variance.
///
/// The population denominator (`n`) is used for both the standard deviation here and
/// the correlation matrix downstream, so `Zᵀ Z / n` is exactly the Pearson correlation.
pub fn standardize(table: &Table, policy: ZeroVariancePolicy) -> Result<StandardizedTable> {
    let n_rows = table.n_rows();
    if n_rows == 0 {
        return Err(PcaError::InsufficientRows {
            rows: 0,
            columns: table.n_columns(),
        });
    }

    let mut kept: Vec<(String, ArrayView1<f64>, f64, f64)> = Vec::with_capacity(table.n_columns());
    let mut dropped = Vec::new();

    for column in table.columns() {
        let values = match column.data() {
            ColumnData::Numeric(values) => values.view(),
            ColumnData::Categorical(_) => {
                return Err(PcaError::NonNumericColumn {
                    column: column.name().to_string(),
                })
            }
        };
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(PcaError::NonFiniteValue {
                column: column.name().to_string(),
                row,
            });
        }

        let mean = values.mean().unwrap_or(0.0);
        let std_dev = values.std(0.0);
        if is_effectively_constant(values, std_dev) {
            match policy {
                ZeroVariancePolicy::Fail => {
                    return Err(PcaError::ZeroVariance {
                        column: column.name().to_string(),
                        std_dev,
                    })
                }
                ZeroVariancePolicy::DropWithWarning => {
                    warn!(
                        "Dropping column '{}': standard deviation {:e} is effectively zero.",
                        column.name(),
                        std_dev
                    );
                    dropped.push(DroppedColumn {
                        name: column.name().to_string(),
                        std_dev,
                    });
                    continue;
                }
            }
        }
        debug!(
            "Column '{}': mean = {:.6}, std dev = {:.6}",
            column.name(),
            mean,
            std_dev
        );
        kept.push((column.name().to_string(), values, mean, std_dev));
    }

    let n_vars = kept.len();
    let mut standardized = Array2::<f64>::zeros((n_rows, n_vars));
    let mut means = Array1::<f64>::zeros(n_vars);
    let mut std_devs = Array1::<f64>::zeros(n_vars);
    let mut variable_names = Vec::with_capacity(n_vars);
    for (j, (name, values, mean, std_dev)) in kept.into_iter().enumerate() {
        standardized
            .column_mut(j)
            .assign(&values.mapv(|x| (x - mean) / std_dev));
        means[j] = mean;
        std_devs[j] = std_dev;
        variable_names.push(name);
    }

    info!(
        "Standardized {} columns over {} rows ({} dropped).",
        n_vars,
        n_rows,
        dropped.len()
    );
    Ok(StandardizedTable {
        variable_names,
        values: standardized,
        means,
        std_devs,
        dropped,
    })
}
