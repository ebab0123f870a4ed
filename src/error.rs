// src/error.rs

use thiserror::Error;

/// Errors raised anywhere in the encode -> standardize -> PCA -> diagnostics pipeline.
///
/// Every variant carries the column, index, or matrix property that caused it so the
/// caller can correct the input. Nothing in the pipeline retries.
#[derive(Error, Debug)]
pub enum PcaError {
    #[error("Column '{column}' is not present in the table.")]
    UnknownColumn { column: String },

    #[error("Column name '{column}' appears more than once.")]
    DuplicateColumn { column: String },

    #[error("Column '{column}' has {found} rows, but the table has {expected}.")]
    RowCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' is configured as both ordinal and nominal.")]
    ConflictingColumnRole { column: String },

    #[error("Column '{column}' is configured for categorical encoding but holds numeric values.")]
    NotCategorical { column: String },

    #[error("Column '{column}' has category '{category}', which is missing from its configured ordering or reference.")]
    UnknownCategory { column: String, category: String },

    #[error("Column '{column}' is still categorical; encode it before standardization.")]
    NonNumericColumn { column: String },

    #[error("Column '{column}' has a non-finite value at row {row}.")]
    NonFiniteValue { column: String, row: usize },

    #[error("Column '{column}' has (near-)zero variance (std dev = {std_dev:e}) and cannot be standardized.")]
    ZeroVariance { column: String, std_dev: f64 },

    #[error("PCA needs at least 2 rows and no fewer rows than variables; got {rows} rows for {columns} variables.")]
    InsufficientRows { rows: usize, columns: usize },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Component index {component} is out of range; only {available} components exist.")]
    ComponentOutOfRange { component: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Eigendecomposition of the correlation matrix failed: {0}")]
    Decomposition(String),

    #[error("Failed to read or write report file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize report: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, PcaError>;
