// src/pipeline.rs

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::diagnostics::Diagnostics;
use crate::encoder::{encode, ColumnEncoding};
use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, LinAlgBackendProvider};
use crate::pca::{CorrelationPca, PcaResult};
use crate::standardize::{standardize, StandardizationSummary};
use crate::table::Table;

/// Everything one run produces, in plain data form for a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaReport {
    pub encodings: Vec<ColumnEncoding>,
    pub standardization: StandardizationSummary,
    pub pca: PcaResult,
    pub diagnostics: Diagnostics,
}

/// Runs encode -> standardize -> PCA -> diagnostics with the feature-selected backend.
pub fn run(table: &Table, config: &PipelineConfig) -> Result<PcaReport> {
    run_with_backend(table, config, LinAlgBackendProvider::new())
}

/// Same as [`run`] with an explicit eigen backend.
pub fn run_with_backend<B: BackendEigh>(
    table: &Table,
    config: &PipelineConfig,
    backend: B,
) -> Result<PcaReport> {
    info!(
        "Starting PCA run on {} columns x {} rows.",
        table.n_columns(),
        table.n_rows()
    );
    let encoded = encode(table, config)?;
    let standardized = standardize(&encoded.table, config.zero_variance_policy)?;
    let pca = CorrelationPca::with_backend(backend)
        .near_zero_tolerance(config.near_zero_eigenvalue_tolerance)
        .fit(&standardized)?;
    let diagnostics = Diagnostics::from_result(
        &pca,
        config.variance_threshold_percent,
        config.contributor_component,
    )?;
    info!(
        "Kaiser criterion retains {} components; {} components reach {:.1}% of variance ({:.2}%).",
        diagnostics.kaiser_count,
        diagnostics.variance_threshold.components,
        diagnostics.variance_threshold.threshold_percent,
        diagnostics.variance_threshold.achieved_percent
    );
    Ok(PcaReport {
        encodings: encoded.encodings,
        standardization: standardized.summary(),
        pca,
        diagnostics,
    })
}

impl PcaReport {
    /// Saves the report to a file using bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| PcaError::Serialization(format!("Failed to serialize PCA report: {e}")))?;
        Ok(())
    }

    /// Loads a report previously written by [`PcaReport::save`] and checks that its
    /// matrices agree on dimensions.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let report: PcaReport =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| {
                    PcaError::Serialization(format!("Failed to deserialize PCA report: {e}"))
                })?;

        let p = report.pca.variable_names.len();
        let consistent = report.pca.eigenvalues.len() == p
            && report.pca.explained_variance_ratio.len() == p
            && report.pca.eigenvectors.dim() == (p, p)
            && report.pca.loadings.dim() == (p, p)
            && report.pca.scores.ncols() == p
            && report.diagnostics.contributors.len() == p
            && report.diagnostics.contributor_component < p;
        if !consistent {
            return Err(PcaError::Serialization(format!(
                "Loaded PCA report has inconsistent dimensions for {p} variables."
            )));
        }
        Ok(report)
    }
}
