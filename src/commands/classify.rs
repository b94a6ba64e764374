use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use rayon::prelude::*;
use std::path::PathBuf;

use intron_cutter::{
    metrics::ConfusionMatrix,
    oracle::{resolve_oracle, Oracle, OracleRecord, OracleRole},
    output::{create_table_file, write_intron_table, write_site_results},
    tables::{label_is_positive, read_rows, IntronRow, IntronSequenceRow, SitePositionRow, SiteRow},
    types::IntronCutError,
};

use super::{validate_input_files, OracleArgs};

/// Classify a site or intron dataset and write the positives
#[derive(Parser)]
pub struct ClassifyCommand {
    /// Input dataset (`scaffold;position;sequence` or `scaffold;start;end;sequence`)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: PathBuf,

    /// Output results table of positive records
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Classifier role: donor, acceptor or intron
    #[arg(short = 'r', long = "role", value_name = "ROLE")]
    role: String,

    /// Motif length, used to report site extents to the classifier
    #[arg(long = "motif-length", value_name = "N", default_value = "2")]
    motif_length: usize,

    /// Positive:negative class ratio of real data, for adjusted precision
    #[arg(long = "imbalance-ratio", value_name = "RATIO")]
    imbalance_ratio: Option<f64>,

    /// Records sent to the classifier per call
    #[arg(long = "batch-size", value_name = "N", default_value = "10000")]
    batch_size: usize,

    #[command(flatten)]
    oracle: OracleArgs,
}

/// Classify `records` in parallel batches, keeping record order
fn classify_batches(
    oracle: &dyn Oracle,
    role: OracleRole,
    records: &[OracleRecord<'_>],
    batch_size: usize,
) -> Result<Vec<bool>> {
    let batches: Vec<Vec<bool>> = records
        .par_chunks(batch_size)
        .map(|batch| oracle.classify(role, batch))
        .collect::<intron_cutter::Result<_>>()?;
    Ok(batches.into_iter().flatten().collect())
}

fn report_metrics(labels: &[Option<i8>], predicted: &[bool], imbalance_ratio: Option<f64>) {
    if labels.is_empty() || labels.iter().any(Option::is_none) {
        return;
    }

    let matrix = ConfusionMatrix::from_labels(
        predicted
            .iter()
            .zip(labels)
            .map(|(&predicted, actual)| (predicted, actual.is_some_and(label_is_positive))),
    );
    info!("Classification metrics: {}", matrix);

    if let Some(real_ratio) = imbalance_ratio {
        match matrix.adjusted_precision(real_ratio) {
            Some(adjusted) => info!(
                "Adjusted precision: {:.4} (imbalance ratio {})",
                adjusted, real_ratio
            ),
            None => warn!(
                "Adjusted precision is undefined for imbalance ratio {}",
                real_ratio
            ),
        }
    }
}

impl ClassifyCommand {
    pub fn run(self) -> Result<()> {
        info!("Starting intron-cutter classify v{}", env!("CARGO_PKG_VERSION"));
        info!("Input dataset: {}", self.input.display());
        info!("Output results: {}", self.output.display());

        validate_input_files(&[self.input.as_path()])?;
        if self.batch_size == 0 {
            return Err(
                IntronCutError::InvalidConfig("Batch size must be positive".to_string()).into(),
            );
        }

        let role: OracleRole = self.role.parse()?;
        let oracle = resolve_oracle(role, &self.oracle.spec())?;

        let positives = match role {
            OracleRole::Donor | OracleRole::Acceptor => self.classify_sites(oracle.as_ref(), role)?,
            OracleRole::Intron => self.classify_introns(oracle.as_ref())?,
        };

        info!(
            "Classification complete: {} positive records written to {}",
            positives,
            self.output.display()
        );
        Ok(())
    }

    fn classify_sites(&self, oracle: &dyn Oracle, role: OracleRole) -> Result<usize> {
        let table = read_rows::<SiteRow, _>(&self.input)?;
        if table.rows.is_empty() {
            warn!("Dataset {} has no site records", self.input.display());
        }

        let records: Vec<OracleRecord<'_>> = table
            .rows
            .iter()
            .map(|row| OracleRecord {
                scaffold_id: &row.scaffold,
                start: row.position,
                end: row.position + self.motif_length,
                sequence: row.sequence.as_bytes(),
            })
            .collect();
        let predicted = classify_batches(oracle, role, &records, self.batch_size)?;

        let labels: Vec<Option<i8>> = table.rows.iter().map(|row| row.label).collect();
        report_metrics(&labels, &predicted, self.imbalance_ratio);

        let positives: Vec<SitePositionRow> = table
            .rows
            .into_iter()
            .zip(&predicted)
            .filter(|(_, &positive)| positive)
            .map(|(row, _)| SitePositionRow {
                scaffold: row.scaffold,
                position: row.position,
            })
            .collect();

        Ok(write_site_results(create_table_file(&self.output)?, &positives)?)
    }

    fn classify_introns(&self, oracle: &dyn Oracle) -> Result<usize> {
        let table = read_rows::<IntronSequenceRow, _>(&self.input)?;
        if table.rows.is_empty() {
            warn!("Dataset {} has no intron records", self.input.display());
        }

        let records: Vec<OracleRecord<'_>> = table
            .rows
            .iter()
            .map(|row| OracleRecord {
                scaffold_id: &row.scaffold,
                start: row.start,
                end: row.end,
                sequence: row.sequence.as_bytes(),
            })
            .collect();
        let predicted =
            classify_batches(oracle, OracleRole::Intron, &records, self.batch_size)?;

        let labels: Vec<Option<i8>> = table.rows.iter().map(|row| row.label).collect();
        report_metrics(&labels, &predicted, self.imbalance_ratio);

        let positives: Vec<IntronRow> = table
            .rows
            .into_iter()
            .zip(&predicted)
            .filter(|(_, &positive)| positive)
            .map(|(row, _)| IntronRow {
                scaffold: row.scaffold,
                start: row.start,
                end: row.end,
            })
            .collect();

        Ok(write_intron_table(create_table_file(&self.output)?, &positives)?)
    }
}
