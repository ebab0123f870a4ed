// src/encoder.rs

//! Categorical-to-numeric encoding.
//!
//! Ordinal columns become integer ranks `0..k-1` in place. Nominal columns become
//! `k-1` indicator columns named `"{column}_{label}"`, inserted where the source
//! column was, one per non-reference category in sorted order.
//!
//! Orders are deterministic: without an explicit ordering, ordinal ranks follow the
//! byte-wise lexicographic order of the observed labels, and the nominal reference is
//! the first sorted label unless the explicit rule names one. Both choices change how
//! loadings read (a reversed ordinal order flips the sign of that variable's
//! loadings; a different nominal reference changes its indicator loadings) but not
//! the total explained variance.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, ReferenceCategoryRule};
use crate::error::{PcaError, Result};
use crate::table::{Column, ColumnData, Table};

/// Role of a column in the encoding pass, resolved once per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole<'a> {
    /// Ranked categories; `Some` carries an explicit low-to-high order.
    Ordinal(Option<&'a [String]>),
    /// Unordered categories; `Some` carries an explicit reference label.
    Nominal(Option<&'a str>),
    Passthrough,
}

/// How one source column was encoded. Kept so loadings can be labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEncoding {
    Ordinal {
        column: String,
        /// `categories[code]` is the label encoded as `code`.
        categories: Vec<String>,
    },
    Nominal {
        column: String,
        reference: String,
        /// `(indicator column name, category label)` in output order.
        indicators: Vec<(String, String)>,
    },
}

impl ColumnEncoding {
    pub fn source_column(&self) -> &str {
        match self {
            ColumnEncoding::Ordinal { column, .. } | ColumnEncoding::Nominal { column, .. } => {
                column
            }
        }
    }
}

/// Output of [`encode`]: the transformed table and the per-column encodings.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    pub table: Table,
    pub encodings: Vec<ColumnEncoding>,
}

/// Resolves the role of `name` under `config`.
pub fn column_role<'a>(config: &'a PipelineConfig, name: &str) -> ColumnRole<'a> {
    if config.ordinal_columns.contains(name) {
        ColumnRole::Ordinal(config.ordinal_category_order.get(name).map(Vec::as_slice))
    } else if config.nominal_columns.contains(name) {
        let reference = match config.reference_category_rule {
            ReferenceCategoryRule::FirstSorted => None,
            ReferenceCategoryRule::Explicit => {
                config.reference_categories.get(name).map(String::as_str)
            }
        };
        ColumnRole::Nominal(reference)
    } else {
        ColumnRole::Passthrough
    }
}

/// Encodes every ordinal and nominal column of `table` named in `config`.
///
/// Columns not named in either role set are passed through unchanged.
pub fn encode(table: &Table, config: &PipelineConfig) -> Result<EncodedTable> {
    config.validate()?;
    check_columns_exist(table, config)?;

    let mut columns: Vec<Column> = Vec::with_capacity(table.n_columns());
    let mut encodings = Vec::new();

    for column in table.columns() {
        match column_role(config, column.name()) {
            ColumnRole::Passthrough => columns.push(column.clone()),
            ColumnRole::Ordinal(order) => {
                let labels = categorical_labels(column)?;
                let (encoded, categories) = encode_ordinal(column.name(), labels, order)?;
                debug!(
                    "Ordinal column '{}' encoded with {} categories: {:?}",
                    column.name(),
                    categories.len(),
                    categories
                );
                columns.push(encoded);
                encodings.push(ColumnEncoding::Ordinal {
                    column: column.name().to_string(),
                    categories,
                });
            }
            ColumnRole::Nominal(reference) => {
                if config.reference_category_rule == ReferenceCategoryRule::Explicit
                    && reference.is_none()
                {
                    return Err(PcaError::InvalidConfig(format!(
                        "explicit reference rule selected but no reference category given for '{}'",
                        column.name()
                    )));
                }
                let labels = categorical_labels(column)?;
                let (dummies, encoding) = encode_nominal(column.name(), labels, reference)?;
                if dummies.is_empty() {
                    warn!(
                        "Nominal column '{}' has a single category and contributes no indicator columns.",
                        column.name()
                    );
                }
                debug!(
                    "Nominal column '{}' expanded into {} indicator columns.",
                    column.name(),
                    dummies.len()
                );
                columns.extend(dummies);
                encodings.push(encoding);
            }
        }
    }

    let table = Table::new(columns)?;
    info!(
        "Encoded {} categorical columns; table now has {} columns x {} rows.",
        encodings.len(),
        table.n_columns(),
        table.n_rows()
    );
    Ok(EncodedTable { table, encodings })
}

fn check_columns_exist(table: &Table, config: &PipelineConfig) -> Result<()> {
    let named = config
        .ordinal_columns
        .iter()
        .chain(config.nominal_columns.iter())
        .chain(config.ordinal_category_order.keys())
        .chain(config.reference_categories.keys());
    for name in named {
        if !table.contains(name) {
            return Err(PcaError::UnknownColumn {
                column: name.clone(),
            });
        }
    }
    Ok(())
}

fn categorical_labels(column: &Column) -> Result<&[String]> {
    match column.data() {
        ColumnData::Categorical(labels) => Ok(labels),
        ColumnData::Numeric(_) => Err(PcaError::NotCategorical {
            column: column.name().to_string(),
        }),
    }
}

/// Replaces labels with their rank. Returns the encoded column and the code -> label list.
fn encode_ordinal(
    name: &str,
    labels: &[String],
    explicit_order: Option<&[String]>,
) -> Result<(Column, Vec<String>)> {
    let categories: Vec<String> = match explicit_order {
        Some(order) => {
            let mut seen = BTreeSet::new();
            for label in order {
                if !seen.insert(label.as_str()) {
                    return Err(PcaError::InvalidConfig(format!(
                        "category '{label}' listed twice in the order for '{name}'"
                    )));
                }
            }
            order.to_vec()
        }
        None => sorted_distinct(labels),
    };

    let codes: BTreeMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(code, label)| (label.as_str(), code))
        .collect();

    let values = labels
        .iter()
        .map(|label| {
            codes
                .get(label.as_str())
                .map(|&code| code as f64)
                .ok_or_else(|| PcaError::UnknownCategory {
                    column: name.to_string(),
                    category: label.clone(),
                })
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok((Column::numeric(name, Array1::from(values)), categories))
}

/// Expands labels into `k-1` indicator columns, dropping `reference` (or the first sorted label).
fn encode_nominal(
    name: &str,
    labels: &[String],
    reference: Option<&str>,
) -> Result<(Vec<Column>, ColumnEncoding)> {
    let categories = sorted_distinct(labels);
    let reference = match reference {
        Some(label) => {
            if !categories.iter().any(|c| c == label) {
                return Err(PcaError::UnknownCategory {
                    column: name.to_string(),
                    category: label.to_string(),
                });
            }
            label.to_string()
        }
        // An empty column has no categories and therefore no reference.
        None => categories.first().cloned().unwrap_or_default(),
    };

    let mut dummies = Vec::with_capacity(categories.len().saturating_sub(1));
    let mut indicators = Vec::with_capacity(categories.len().saturating_sub(1));
    for category in categories.iter().filter(|c| **c != reference) {
        let indicator_name = format!("{name}_{category}");
        let values: Array1<f64> = labels
            .iter()
            .map(|label| if label == category { 1.0 } else { 0.0 })
            .collect();
        dummies.push(Column::numeric(indicator_name.clone(), values));
        indicators.push((indicator_name, category.clone()));
    }

    Ok((
        dummies,
        ColumnEncoding::Nominal {
            column: name.to_string(),
            reference,
            indicators,
        },
    ))
}

fn sorted_distinct(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
