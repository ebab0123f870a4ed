// Principal component analysis (PCA) for mixed-type tables

#![doc = include_str!("../README.md")]

pub mod config;
pub mod diagnostics;
pub mod encoder;
pub mod error;
pub mod linalg_backends;
pub mod pca;
pub mod pipeline;
pub mod standardize;
pub mod table;

pub use config::{PipelineConfig, ReferenceCategoryRule, ZeroVariancePolicy};
pub use diagnostics::{Contributor, Diagnostics, VarianceThreshold};
pub use encoder::{encode, ColumnEncoding, EncodedTable};
pub use error::{PcaError, Result};
pub use pca::{CorrelationPca, PcaResult};
pub use pipeline::{run, run_with_backend, PcaReport};
pub use standardize::{standardize, StandardizedTable};
pub use table::{Column, ColumnData, Table};

#[cfg(test)]
mod pca_tests;
