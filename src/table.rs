// src/table.rs

use std::collections::HashSet;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PcaError, Result};

/// Values held by a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Array1<f64>),
    Categorical(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }
}

/// A named column of a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn numeric(name: impl Into<String>, values: impl Into<Array1<f64>>) -> Self {
        Self::new(name, ColumnData::Numeric(values.into()))
    }

    /// Builds a categorical column from anything string-like.
    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        labels: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            name,
            ColumnData::Categorical(labels.into_iter().map(Into::into).collect()),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory table of named columns sharing one row count.
///
/// Column names are unique and every column has the same length; both are
/// checked on construction, so any `Table` value upholds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Builds a table, rejecting duplicate names and ragged columns.
    ///
    /// An empty column list yields a table with zero rows.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        let mut seen: HashSet<&str> = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(PcaError::DuplicateColumn {
                    column: column.name().to_string(),
                });
            }
            if column.len() != n_rows {
                return Err(PcaError::RowCountMismatch {
                    column: column.name().to_string(),
                    expected: n_rows,
                    found: column.len(),
                });
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Builds an all-numeric table from a (rows x columns) matrix.
    pub fn from_matrix<S: AsRef<str>>(names: &[S], matrix: &Array2<f64>) -> Result<Self> {
        if names.len() != matrix.ncols() {
            return Err(PcaError::InvalidConfig(format!(
                "{} column names given for a matrix with {} columns",
                names.len(),
                matrix.ncols()
            )));
        }
        let columns = names
            .iter()
            .zip(matrix.columns())
            .map(|(name, values)| Column::numeric(name.as_ref(), values.to_owned()))
            .collect();
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn is_all_numeric(&self) -> bool {
        self.columns.iter().all(|c| c.data().is_numeric())
    }
}
